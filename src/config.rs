use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use anyhow::Context;

#[cfg(feature = "tch-backend")]
use tch::Device;

use crate::model::ModelConfig;

pub const DEFAULT_VOCAB_PATH: &str = "./model_weights/textgenrnn_vocab.json";
pub const DEFAULT_CONFIG_PATH: &str = "./model_weights/textgenrnn_config.json";

pub const OUTPUT_DIR: &str = "model_weights";
pub const WEIGHTS_FILE: &str = "ausztraliabamentem.hdf5";
pub const VOCAB_FILE: &str = "textgenrnn_vocab.json";
pub const CONFIG_FILE: &str = "textgenrnn_config.json";

pub const NUM_EPOCHS: usize = 10;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub weights_path: PathBuf,
    pub vocab_path: PathBuf,
    pub config_path: PathBuf,
    pub max_gen_length: usize,
    pub max_samples: usize,
    #[cfg(feature = "tch-backend")]
    pub device: Device,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("SERVER_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8000".into())
            .parse()
            .unwrap_or_else(|_| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000));

        let weights_path = lookup("WEIGHTS_PATH")
            .map(PathBuf::from)
            .context("WEIGHTS_PATH must point at a trained weights file")?;
        let vocab_path =
            PathBuf::from(lookup("VOCAB_PATH").unwrap_or_else(|| DEFAULT_VOCAB_PATH.to_string()));
        let config_path = PathBuf::from(
            lookup("CONFIG_PATH").unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string()),
        );

        let max_gen_length = lookup("MAX_GEN_LENGTH")
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);
        let max_samples = lookup("MAX_SAMPLES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);

        #[cfg(feature = "tch-backend")]
        let device = {
            let raw = lookup("DEVICE").unwrap_or_else(|| "cpu".into());
            parse_device(&raw)
        };

        Ok(Self {
            listen_addr,
            weights_path,
            vocab_path,
            config_path,
            max_gen_length,
            max_samples,
            #[cfg(feature = "tch-backend")]
            device,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub samples_path: PathBuf,
    pub skip_header: bool,
    pub output_dir: PathBuf,
    pub num_epochs: usize,
    pub batch_size: usize,
    pub base_lr: f64,
    pub max_gen_length: usize,
    pub seed: Option<i64>,
    pub model: ModelConfig,
    #[cfg(feature = "tch-backend")]
    pub device: Device,
}

impl TrainConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let samples_path = lookup("SAMPLES_PATH")
            .map(PathBuf::from)
            .context("SAMPLES_PATH must point at a training samples file")?;
        let skip_header = lookup("SAMPLES_HEADER")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);
        let seed = lookup("SEED").and_then(|v| v.parse().ok());

        #[cfg(feature = "tch-backend")]
        let device = {
            let raw = lookup("DEVICE").unwrap_or_else(|| "cpu".into());
            parse_device(&raw)
        };

        Ok(Self {
            samples_path,
            skip_header,
            output_dir: PathBuf::from(OUTPUT_DIR),
            num_epochs: NUM_EPOCHS,
            batch_size: 128,
            base_lr: 4e-3,
            max_gen_length: 300,
            seed,
            model: ModelConfig::default(),
            #[cfg(feature = "tch-backend")]
            device,
        })
    }

    pub fn weights_path(&self) -> PathBuf {
        self.output_dir.join(WEIGHTS_FILE)
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.output_dir.join(VOCAB_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.output_dir.join(CONFIG_FILE)
    }
}

fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(feature = "tch-backend")]
fn parse_device(raw: &str) -> Device {
    let lower = raw.to_lowercase();
    if lower == "cpu" {
        Device::Cpu
    } else if lower.starts_with("cuda") {
        let idx = lower
            .split(':')
            .nth(1)
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        if tch::Cuda::is_available() {
            Device::Cuda(idx)
        } else {
            tracing::warn!(requested = %raw, "CUDA unavailable, falling back to CPU");
            Device::Cpu
        }
    } else {
        Device::Cpu
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_weights_path_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("WEIGHTS_PATH"));
    }

    #[test]
    fn service_defaults_apply() {
        let config = AppConfig::from_lookup(lookup_from(&[("WEIGHTS_PATH", "w.hdf5")])).unwrap();
        assert_eq!(config.weights_path, PathBuf::from("w.hdf5"));
        assert_eq!(config.vocab_path, PathBuf::from(DEFAULT_VOCAB_PATH));
        assert_eq!(config.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(config.listen_addr.port(), 8000);
        assert_eq!(config.max_gen_length, 300);
        assert_eq!(config.max_samples, 100);
    }

    #[test]
    fn service_overrides_apply() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("WEIGHTS_PATH", "w.hdf5"),
            ("VOCAB_PATH", "v.json"),
            ("CONFIG_PATH", "c.json"),
            ("SERVER_ADDR", "0.0.0.0:9000"),
            ("MAX_SAMPLES", "5"),
            ("MAX_GEN_LENGTH", "not-a-number"),
        ]))
        .unwrap();
        assert_eq!(config.vocab_path, PathBuf::from("v.json"));
        assert_eq!(config.config_path, PathBuf::from("c.json"));
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.max_samples, 5);
        assert_eq!(config.max_gen_length, 300);
    }

    #[test]
    fn missing_samples_path_is_an_error() {
        assert!(TrainConfig::from_lookup(lookup_from(&[])).is_err());
    }

    #[test]
    fn training_writes_to_fixed_paths() {
        let config =
            TrainConfig::from_lookup(lookup_from(&[("SAMPLES_PATH", "samples.txt")])).unwrap();
        assert_eq!(
            config.weights_path(),
            PathBuf::from("model_weights/ausztraliabamentem.hdf5")
        );
        assert_eq!(
            config.vocab_path(),
            PathBuf::from("model_weights/textgenrnn_vocab.json")
        );
        assert_eq!(config.num_epochs, 10);
        assert!(config.skip_header);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn header_flag_accepts_common_spellings() {
        let config = TrainConfig::from_lookup(lookup_from(&[
            ("SAMPLES_PATH", "samples.txt"),
            ("SAMPLES_HEADER", "False"),
            ("SEED", "7"),
        ]))
        .unwrap();
        assert!(!config.skip_header);
        assert_eq!(config.seed, Some(7));
    }
}
