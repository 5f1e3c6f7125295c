//! Canvas encoder
//!
//! The objective only needs per-position hidden states for a canvas, token
//! embeddings for the word that was just placed, and the word projection.
//! `CanvasEncoder` captures that seam; `TransformerCanvasEncoder` is the
//! bidirectional transformer used for training.

use burn::{
    module::Module,
    nn::{
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig,
    },
    tensor::{backend::Backend, Bool, Int, Tensor},
};

use super::config::LblmConfig;
use crate::helpers::int_tensor;

/// Interface shared by canvas encoders.
pub trait CanvasEncoder<B: Backend> {
    /// `[batch, len]` canvas -> `[batch, len, d_model]` hidden states.
    /// `pad_mask` is true on padding positions.
    fn encode(&self, canvas: Tensor<B, 2, Int>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3>;

    /// Raw token embeddings, `[batch, len] -> [batch, len, d_model]`.
    fn embed(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3>;

    /// Word logits for hidden states, `[batch, len, d_model] -> [batch, len, vocab]`.
    fn word_logits(&self, hidden: Tensor<B, 3>) -> Tensor<B, 3>;

    fn d_model(&self) -> usize;
}

#[derive(Module, Debug)]
pub struct TransformerCanvasEncoder<B: Backend> {
    embedding: Embedding<B>,
    position: Embedding<B>,
    transformer: TransformerEncoder<B>,
    ln_out: LayerNorm<B>,
    head: Option<Linear<B>>,
    #[module(skip)]
    vocab_size: usize,
    #[module(skip)]
    d_model: usize,
    #[module(skip)]
    use_weight_tying: bool,
}

impl<B: Backend> TransformerCanvasEncoder<B> {
    pub fn new(config: &LblmConfig, device: &B::Device) -> Self {
        let embedding = EmbeddingConfig::new(config.vocab_size, config.d_model).init(device);
        let position = EmbeddingConfig::new(config.max_seq_len, config.d_model).init(device);

        let transformer =
            TransformerEncoderConfig::new(config.d_model, config.d_ff, config.n_heads, config.n_layers)
                .with_dropout(config.dropout)
                .with_norm_first(true)
                .init(device);

        let ln_out = LayerNormConfig::new(config.d_model)
            .with_epsilon(config.layer_norm_eps)
            .init(device);

        let head = if config.weight_tying {
            None
        } else {
            Some(
                LinearConfig::new(config.d_model, config.vocab_size)
                    .with_bias(false)
                    .init(device),
            )
        };

        Self {
            embedding,
            position,
            transformer,
            ln_out,
            head,
            vocab_size: config.vocab_size,
            d_model: config.d_model,
            use_weight_tying: config.weight_tying,
        }
    }
}

impl<B: Backend> CanvasEncoder<B> for TransformerCanvasEncoder<B> {
    fn encode(&self, canvas: Tensor<B, 2, Int>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let [b, t] = canvas.dims();
        let positions: Vec<i64> = (0..b).flat_map(|_| 0..t as i64).collect();
        let positions = int_tensor::<B, 2>(positions, [b, t], &canvas.device());

        let x = self.embedding.forward(canvas) + self.position.forward(positions);
        let x = self
            .transformer
            .forward(TransformerEncoderInput::new(x).mask_pad(pad_mask));
        self.ln_out.forward(x)
    }

    fn embed(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.embedding.forward(tokens)
    }

    fn word_logits(&self, hidden: Tensor<B, 3>) -> Tensor<B, 3> {
        let logits = match &self.head {
            Some(head) if !self.use_weight_tying => head.forward(hidden),
            _ => {
                let [b, t, d] = hidden.dims();
                let emb_weight = self.embedding.weight.val();
                let logits_flat = hidden.reshape([b * t, d]).matmul(emb_weight.transpose());
                logits_flat.reshape([b, t, self.vocab_size])
            }
        };

        // Both heads share the 1/sqrt(d_model) scale
        logits / (self.d_model as f32).sqrt()
    }

    fn d_model(&self) -> usize {
        self.d_model
    }
}
