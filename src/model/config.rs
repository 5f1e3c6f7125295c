// src/model/config.rs
//! Model and training configuration

use burn::config::Config;

#[derive(Config, Debug)]
pub struct LblmConfig {
    #[config(default = "32000")]
    pub vocab_size: usize,

    #[config(default = "512")]
    pub d_model: usize,

    #[config(default = "6")]
    pub n_layers: usize,

    #[config(default = "8")]
    pub n_heads: usize,

    #[config(default = "2048")]
    pub d_ff: usize,

    /// Longest sequence (and canvas) the encoder accepts.
    #[config(default = "256")]
    pub max_seq_len: usize,

    /// Longest blank run; also the number of LRB classes.
    #[config(default = "256")]
    pub max_len: usize,

    #[config(default = "0.1")]
    pub dropout: f64,

    #[config(default = "1e-5")]
    pub layer_norm_eps: f64,

    /// Word head shares the input embedding matrix.
    #[config(default = "true")]
    pub weight_tying: bool,
}

impl LblmConfig {
    /// Tiny model for smoke tests and debugging
    pub fn lblm_tiny(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            d_model: 64,
            n_layers: 2,
            n_heads: 4,
            d_ff: 128,
            max_seq_len: 64,
            max_len: 64,
            dropout: 0.0,
            layer_norm_eps: 1e-5,
            weight_tying: true,
        }
    }

    /// 6 layers x 512, the usual sentence-level setup
    pub fn lblm_small(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            d_model: 512,
            n_layers: 6,
            n_heads: 8,
            d_ff: 2048,
            max_seq_len: 256,
            max_len: 256,
            dropout: 0.1,
            layer_norm_eps: 1e-5,
            weight_tying: true,
        }
    }

    /// 12 layers x 768
    pub fn lblm_base(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            d_model: 768,
            n_layers: 12,
            n_heads: 12,
            d_ff: 3072,
            max_seq_len: 512,
            max_len: 512,
            dropout: 0.1,
            layer_norm_eps: 1e-5,
            weight_tying: true,
        }
    }

    pub fn num_parameters(&self) -> usize {
        let d = self.d_model;

        // Token + position embeddings
        let embed = self.vocab_size * d + self.max_seq_len * d;

        // Per layer: attention (q,k,v,o with bias), FFN (2 linears with bias), 2 LayerNorms
        let per_layer = 4 * (d * d + d) + (d * self.d_ff + self.d_ff) + (self.d_ff * d + d) + 4 * d;

        // Heads: loc (d -> 1), word (tied or not), lrb MLP (2d -> 2d -> max_len)
        let loc = d + 1;
        let word = if self.weight_tying { 0 } else { d * self.vocab_size };
        let lrb = (2 * d * 2 * d + 2 * d) + (2 * d * self.max_len + self.max_len);

        embed + self.n_layers * per_layer + loc + word + lrb
    }
}

#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = "5e-4")]
    pub learning_rate: f64,

    #[config(default = "32")]
    pub batch_size: usize,

    #[config(default = "1")]
    pub gradient_accumulation_steps: usize,

    #[config(default = "4000")]
    pub warmup_steps: usize,

    #[config(default = "100000")]
    pub max_steps: usize,

    #[config(default = "0.01")]
    pub weight_decay: f64,

    #[config(default = "1.0")]
    pub gradient_clip: f64,

    #[config(default = "5000")]
    pub save_every: usize,

    #[config(default = "100")]
    pub log_every: usize,

    #[config(default = "1000")]
    pub eval_every: usize,

    /// Orders sampled per sentence by the Monte Carlo evaluator.
    #[config(default = "10")]
    pub mc_samples: usize,

    #[config(default = "0.1")]
    pub min_lr_ratio: f64,

    #[config(default = "1")]
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 5e-4,
            batch_size: 32,
            gradient_accumulation_steps: 1,
            warmup_steps: 4000,
            max_steps: 100_000,
            weight_decay: 0.01,
            gradient_clip: 1.0,
            save_every: 5000,
            log_every: 100,
            eval_every: 1000,
            mc_samples: 10,
            min_lr_ratio: 0.1,
            seed: 1,
        }
    }
}
