use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, bail};
use tch::{
    Device, Kind, Tensor,
    nn::{self, OptimizerConfig},
};
use tracing::info;

use crate::{
    config::TrainConfig,
    model::{CharGenerator, Vocabulary, vocab::pad_window},
};

const EPOCH_SAMPLE_TEMPERATURES: [f64; 3] = [0.2, 0.5, 1.0];

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub texts: usize,
    pub examples: usize,
    pub vocab_size: usize,
    pub epochs: usize,
    pub final_loss: f64,
    pub weights_path: PathBuf,
    pub vocab_path: PathBuf,
    pub config_path: PathBuf,
}

pub fn read_samples(path: &Path, skip_header: bool) -> anyhow::Result<Vec<String>> {
    let raw = fs::read(path)
        .with_context(|| format!("cannot read training samples {}", path.display()))?;
    let content = String::from_utf8_lossy(&raw);
    let texts = content
        .lines()
        .skip(usize::from(skip_header))
        .map(str::to_string)
        .collect();
    Ok(texts)
}

/// Next-character examples over encoded `<s> text <s>` sequences. Only
/// `(sequence, position)` pairs are kept; padded windows are built per batch.
pub struct Examples {
    sequences: Vec<Vec<i64>>,
    positions: Vec<(usize, usize)>,
    max_length: usize,
}

impl Examples {
    pub fn new(texts: &[String], vocab: &Vocabulary, max_length: usize) -> Self {
        let sequences: Vec<Vec<i64>> = texts.iter().map(|t| vocab.encode_wrapped(t)).collect();
        let positions = sequences
            .iter()
            .enumerate()
            .flat_map(|(seq, tokens)| (1..tokens.len()).map(move |end| (seq, end)))
            .collect();
        Self {
            sequences,
            positions,
            max_length,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn batch(&self, order: &[i64]) -> (Tensor, Tensor) {
        let mut inputs = Vec::with_capacity(order.len() * self.max_length);
        let mut targets = Vec::with_capacity(order.len());
        for &example in order {
            let (seq, end) = self.positions[example as usize];
            let tokens = &self.sequences[seq];
            inputs.extend(pad_window(&tokens[..end], self.max_length));
            targets.push(tokens[end]);
        }
        let xs = Tensor::from_slice(&inputs).reshape([order.len() as i64, self.max_length as i64]);
        (xs, Tensor::from_slice(&targets))
    }

    fn shuffled_order(&self) -> anyhow::Result<Vec<i64>> {
        let perm = Tensor::randperm(self.len() as i64, (Kind::Int64, Device::Cpu));
        Ok(Vec::<i64>::try_from(&perm)?)
    }
}

pub struct TrainedModel {
    pub generator: CharGenerator,
    pub examples: usize,
    pub final_loss: f64,
}

pub fn train(config: &TrainConfig, texts: &[String]) -> anyhow::Result<TrainedModel> {
    let model_config = config.model.clone();
    let vocab = Vocabulary::from_texts(texts, model_config.max_words, model_config.single_text);

    let examples = Examples::new(texts, &vocab, model_config.max_length);
    if examples.is_empty() {
        bail!("training samples contain no characters to learn from");
    }
    info!(
        texts = texts.len(),
        examples = examples.len(),
        vocab_size = vocab.len(),
        "training a new model"
    );

    let generator = CharGenerator::fresh(model_config, vocab, config.device, config.max_gen_length)?;
    let mut optimizer = nn::RmsProp {
        alpha: 0.99,
        ..Default::default()
    }
    .build(generator.var_store(), config.base_lr)?;

    let mut final_loss = f64::NAN;
    for epoch in 0..config.num_epochs {
        let lr = config.base_lr * (1.0 - epoch as f64 / config.num_epochs as f64);
        optimizer.set_lr(lr);

        let started = Instant::now();
        let mut total_loss = 0.0;
        let mut batches = 0usize;
        let order = examples.shuffled_order()?;
        for chunk in order.chunks(config.batch_size.max(1)) {
            let (batch_xs, batch_ys) = examples.batch(chunk);
            let loss = generator
                .forward(&batch_xs.to(generator.device()))
                .cross_entropy_for_logits(&batch_ys.to(generator.device()));
            optimizer.backward_step(&loss);
            total_loss += loss.double_value(&[]);
            batches += 1;
        }
        final_loss = total_loss / batches.max(1) as f64;

        info!(
            epoch = epoch + 1,
            epochs = config.num_epochs,
            loss = final_loss,
            lr,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "epoch finished"
        );
        for temperature in EPOCH_SAMPLE_TEMPERATURES {
            let sample = generator.sample("", temperature)?;
            info!(temperature, %sample, "epoch sample");
        }
    }

    Ok(TrainedModel {
        examples: examples.len(),
        generator,
        final_loss,
    })
}

// nothing is written until training has finished
pub fn run(config: &TrainConfig) -> anyhow::Result<TrainingSummary> {
    if let Some(seed) = config.seed {
        tch::manual_seed(seed);
    }

    let texts = read_samples(&config.samples_path, config.skip_header)?;
    info!(
        path = %config.samples_path.display(),
        texts = texts.len(),
        "texts collected"
    );

    let TrainedModel {
        generator,
        examples,
        final_loss,
    } = train(config, &texts)?;

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("cannot create {}", config.output_dir.display()))?;
    let weights_path = config.weights_path();
    let vocab_path = config.vocab_path();
    let config_path = config.config_path();
    generator
        .save(&weights_path)
        .with_context(|| format!("cannot write weights {}", weights_path.display()))?;
    generator.vocab().save(&vocab_path)?;
    generator.config().save(&config_path)?;
    info!(weights = %weights_path.display(), "model saved");

    Ok(TrainingSummary {
        texts: texts.len(),
        examples,
        vocab_size: generator.vocab().len(),
        epochs: config.num_epochs,
        final_loss,
        weights_path,
        vocab_path,
        config_path,
    })
}
