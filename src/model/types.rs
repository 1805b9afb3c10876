use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPERATURE: f64 = 0.5;
pub const DEFAULT_SAMPLES: usize = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_samples")]
    pub n: usize,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            n: DEFAULT_SAMPLES,
        }
    }
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_samples() -> usize {
    DEFAULT_SAMPLES
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResponse {
    pub results: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    pub name: String,
    pub vocab_size: usize,
    pub rnn_layers: i64,
    pub rnn_size: i64,
    pub max_length: usize,
    pub weights_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_uses_defaults() {
        let request: GenerationRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.prefix, "");
        assert_eq!(request.temperature, 0.5);
        assert_eq!(request.n, 1);
    }

    #[test]
    fn integer_temperature_is_coerced() {
        let request: GenerationRequest =
            serde_json::from_str(r#"{"prefix": "G'day", "temperature": 1, "n": 3}"#).unwrap();
        assert_eq!(request.prefix, "G'day");
        assert_eq!(request.temperature, 1.0);
        assert_eq!(request.n, 3);
    }

    #[test]
    fn negative_count_is_rejected() {
        assert!(serde_json::from_str::<GenerationRequest>(r#"{"n": -1}"#).is_err());
    }
}
