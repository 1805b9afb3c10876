use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub rnn_layers: i64,
    pub rnn_size: i64,
    pub rnn_bidirectional: bool,
    pub max_length: usize,
    pub max_words: usize,
    pub dim_embeddings: i64,
    pub word_level: bool,
    pub single_text: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            rnn_layers: 2,
            rnn_size: 128,
            rnn_bidirectional: false,
            max_length: 40,
            max_words: 10_000,
            dim_embeddings: 100,
            word_level: false,
            single_text: false,
        }
    }
}

impl ModelConfig {
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            ServiceError::Artifact(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: ModelConfig = serde_json::from_str(&raw).map_err(|e| {
            ServiceError::Artifact(format!("invalid config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ServiceError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.word_level {
            return Err(ServiceError::Artifact(
                "word-level models are not supported".into(),
            ));
        }
        if self.rnn_layers < 1 || self.rnn_size < 1 || self.dim_embeddings < 1 {
            return Err(ServiceError::Artifact(
                "rnn_layers, rnn_size and dim_embeddings must be positive".into(),
            ));
        }
        if self.max_length == 0 {
            return Err(ServiceError::Artifact("max_length must be positive".into()));
        }
        Ok(())
    }
}
