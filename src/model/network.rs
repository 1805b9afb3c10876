use tch::{
    Kind, Tensor,
    nn::{self, Module, RNN},
};

use crate::model::ModelConfig;

#[derive(Debug)]
pub struct CharRnn {
    embedding: nn::Embedding,
    layers: Vec<nn::LSTM>,
    attention: Tensor,
    output: nn::Linear,
}

impl CharRnn {
    pub fn new(vs: &nn::Path, config: &ModelConfig, num_classes: i64) -> Self {
        let embedding = nn::embedding(
            vs / "embedding",
            num_classes,
            config.dim_embeddings,
            Default::default(),
        );

        let directions = if config.rnn_bidirectional { 2 } else { 1 };
        let mut layers = Vec::with_capacity(config.rnn_layers as usize);
        let mut input_dim = config.dim_embeddings;
        let mut features = config.dim_embeddings;
        for idx in 0..config.rnn_layers {
            let rnn_config = nn::RNNConfig {
                batch_first: true,
                bidirectional: config.rnn_bidirectional,
                ..Default::default()
            };
            layers.push(nn::lstm(
                vs / format!("rnn_{}", idx + 1),
                input_dim,
                config.rnn_size,
                rnn_config,
            ));
            input_dim = config.rnn_size * directions;
            features += input_dim;
        }

        let attention = vs.var(
            "attention",
            &[features, 1],
            nn::Init::Uniform {
                lo: -0.05,
                up: 0.05,
            },
        );
        let output = nn::linear(vs / "output", features, num_classes, Default::default());

        Self {
            embedding,
            layers,
            attention,
            output,
        }
    }

    /// `xs` is `[batch, max_length]` token ids, returns `[batch, num_classes]`
    /// unnormalised logits.
    pub fn forward(&self, xs: &Tensor) -> Tensor {
        let embedded = self.embedding.forward(xs);
        let mut outputs = Vec::with_capacity(self.layers.len() + 1);
        let mut hidden = embedded.shallow_clone();
        outputs.push(embedded);
        for layer in &self.layers {
            let (out, _) = layer.seq(&hidden);
            hidden = out.shallow_clone();
            outputs.push(out);
        }

        // [batch, time, features]
        let seq = Tensor::cat(&outputs, 2);
        let scores = seq.matmul(&self.attention).squeeze_dim(-1).tanh();
        let weights = scores.softmax(-1, Kind::Float);
        let pooled = weights.unsqueeze(1).bmm(&seq).squeeze_dim(1);
        self.output.forward(&pooled)
    }
}
