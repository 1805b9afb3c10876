use std::{fs, path::Path};

use parking_lot::Mutex;
use tch::{Device, Kind, Tensor, nn, no_grad};

use crate::{
    error::ServiceError,
    model::{
        GenerationRequest, ModelConfig, ModelMetadata, TextGenerator,
        network::CharRnn,
        vocab::{PAD_INDEX, Vocabulary, pad_window},
    },
};

pub struct CharGenerator {
    name: String,
    var_store: nn::VarStore,
    network: Mutex<CharRnn>,
    vocab: Vocabulary,
    config: ModelConfig,
    device: Device,
    max_gen_length: usize,
    weights_size_bytes: u64,
}

impl CharGenerator {
    pub fn fresh(
        config: ModelConfig,
        vocab: Vocabulary,
        device: Device,
        max_gen_length: usize,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        if vocab.is_empty() {
            return Err(ServiceError::Vocabulary("vocabulary is empty".into()));
        }
        let var_store = nn::VarStore::new(device);
        let network = CharRnn::new(&var_store.root(), &config, vocab.num_classes());
        Ok(Self {
            name: "textgenrnn".to_string(),
            var_store,
            network: Mutex::new(network),
            vocab,
            config,
            device,
            max_gen_length,
            weights_size_bytes: 0,
        })
    }

    // the config and vocabulary fix the network shape the weights load into
    pub fn load(
        weights_path: &Path,
        vocab_path: &Path,
        config_path: &Path,
        device: Device,
        max_gen_length: usize,
    ) -> Result<Self, ServiceError> {
        let config = ModelConfig::load(config_path)?;
        let vocab = Vocabulary::load(vocab_path)?;
        let mut generator = Self::fresh(config, vocab, device, max_gen_length)?;

        if !weights_path.exists() {
            return Err(ServiceError::Artifact(format!(
                "model artifact missing: {}",
                weights_path.display()
            )));
        }
        generator.weights_size_bytes = fs::metadata(weights_path)?.len();
        generator.var_store.load(weights_path).map_err(|e| {
            ServiceError::Artifact(format!(
                "cannot load weights {}: {e}",
                weights_path.display()
            ))
        })?;
        generator.var_store.freeze();
        if let Some(stem) = weights_path.file_stem().and_then(|s| s.to_str()) {
            generator.name = stem.to_string();
        }

        tracing::info!(
            weights = %weights_path.display(),
            vocab_size = generator.vocab.len(),
            rnn_layers = generator.config.rnn_layers,
            rnn_size = generator.config.rnn_size,
            "model loaded"
        );
        Ok(generator)
    }

    pub fn save(&self, weights_path: &Path) -> Result<(), ServiceError> {
        self.var_store.save(weights_path)?;
        Ok(())
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.var_store
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn forward(&self, xs: &Tensor) -> Tensor {
        self.network.lock().forward(xs)
    }

    /// Draws one text, seeded with `prefix`, until the model emits the meta
    /// token or the length cap is hit. The returned text starts with `prefix`.
    pub fn sample(&self, prefix: &str, temperature: f64) -> Result<String, ServiceError> {
        let mut tokens: Vec<i64> = Vec::with_capacity(self.config.max_length + prefix.len());
        tokens.extend(self.vocab.meta_index());
        tokens.extend(self.vocab.encode(prefix));

        let mut text = prefix.to_string();
        // the leading meta token counts towards the cap
        let mut length = 1 + prefix.chars().count();

        let network = self.network.lock();
        no_grad(|| {
            while length < self.max_gen_length {
                let window = pad_window(&tokens, self.config.max_length);
                let xs = Tensor::from_slice(&window)
                    .reshape([1, self.config.max_length as i64])
                    .to(self.device);
                let logits = network.forward(&xs).squeeze_dim(0);
                let next = sample_index(&logits, temperature)?;

                if Some(next) == self.vocab.meta_index() {
                    break;
                }
                let token = self.vocab.token(next).ok_or_else(|| {
                    ServiceError::Inference(format!("sampled index {next} outside vocabulary"))
                })?;
                text.push_str(token);
                tokens.push(next);
                length += 1;
            }
            Ok::<(), ServiceError>(())
        })?;

        Ok(text)
    }
}

/// Draws the next index from `logits`, never the padding index. A zero
/// temperature picks the most likely index instead of sampling.
fn sample_index(logits: &Tensor, temperature: f64) -> Result<i64, ServiceError> {
    let masked = logits.to_kind(Kind::Float).copy();
    let _ = masked.get(PAD_INDEX).fill_(f64::NEG_INFINITY);

    if temperature == 0.0 {
        return Ok(masked.f_argmax(0, false)?.int64_value(&[]));
    }

    // masking before the softmax keeps the distribution non-empty even when
    // padding held all the probability mass
    let probs = (masked / temperature).f_softmax(-1, Kind::Float)?;
    let drawn = probs.f_multinomial(1, false)?;
    Ok(drawn.int64_value(&[0]))
}

impl TextGenerator for CharGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>, ServiceError> {
        (0..request.n)
            .map(|_| self.sample(&request.prefix, request.temperature))
            .collect()
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            name: self.name.clone(),
            vocab_size: self.vocab.len(),
            rnn_layers: self.config.rnn_layers,
            rnn_size: self.config.rnn_size,
            max_length: self.config.max_length,
            weights_size_bytes: self.weights_size_bytes,
        }
    }
}
