use burn::{
    grad_clipping::GradientClippingConfig,
    module::{AutodiffModule, Module},
    optim::{adaptor::OptimizerAdaptor, AdamW, AdamWConfig, GradientsAccumulator, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::backend::AutodiffBackend,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use tracing::{info, warn};

use super::config::{LblmConfig, TrainingConfig};
use super::lblm::{strip_record_ext, Lblm};
use crate::data::SequenceBatch;
use crate::error::{LblmError, Result};
use crate::utils::format_params;
use crate::vocab::SpecialIds;

/// Averages over the micro-batches of one optimizer step.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainStats {
    pub loss: f32,
    pub loc: f32,
    pub word: f32,
    pub lrb: f32,
    pub lr: f64,
}

pub struct Trainer<B: AutodiffBackend> {
    pub model: Lblm<B>,
    optimizer: OptimizerAdaptor<AdamW<B::InnerBackend>, Lblm<B>, B>,
    accumulator: GradientsAccumulator<Lblm<B>>,
    config: TrainingConfig,
    special: SpecialIds,
    rng: ChaCha8Rng,

    // training state
    step: usize,
    micro_step: usize,
    accumulated: TrainStats,

    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(
        model_config: &LblmConfig,
        train_config: TrainingConfig,
        special: SpecialIds,
        device: B::Device,
    ) -> Self {
        B::seed(train_config.seed);
        let model = Lblm::new(model_config, &device);

        let mut optim = AdamWConfig::new().with_weight_decay(train_config.weight_decay as f32);
        if train_config.gradient_clip > 0.0 {
            optim = optim.with_grad_clipping(Some(GradientClippingConfig::Norm(
                train_config.gradient_clip as f32,
            )));
        }

        info!("model initialised: {} parameters", format_params(model_config.num_parameters()));

        Self {
            model,
            optimizer: optim.init(),
            accumulator: GradientsAccumulator::new(),
            rng: ChaCha8Rng::seed_from_u64(train_config.seed),
            config: train_config,
            special,
            step: 0,
            micro_step: 0,
            accumulated: TrainStats::default(),
            device,
        }
    }

    /// One micro-batch. Returns `Some` once `gradient_accumulation_steps`
    /// micro-batches have been accumulated and the weights updated.
    pub fn train_step(&mut self, batch: &SequenceBatch) -> Result<Option<TrainStats>> {
        let losses = self.model.losses(batch, &self.special, &mut self.rng)?;
        let metrics = losses.metrics();
        let loss_value = metrics["loss"];

        if !loss_value.is_finite() {
            panic!("loss diverged (NaN/Inf) at step {}", self.step);
        }

        self.accumulated.loss += loss_value;
        self.accumulated.loc += metrics["loc"];
        self.accumulated.word += metrics["word"];
        self.accumulated.lrb += metrics["lrb"];
        self.micro_step += 1;

        let accum = self.config.gradient_accumulation_steps.max(1);
        let grads = (losses.loss / accum as f32).backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.accumulator.accumulate(&self.model, grads);

        if self.micro_step < accum {
            return Ok(None);
        }

        let lr = self.get_learning_rate();
        let grads = self.accumulator.grads();
        self.model = self.optimizer.step(lr, self.model.clone(), grads);

        let n = self.micro_step as f32;
        let stats = TrainStats {
            loss: self.accumulated.loss / n,
            loc: self.accumulated.loc / n,
            word: self.accumulated.word / n,
            lrb: self.accumulated.lrb / n,
            lr,
        };

        self.accumulated = TrainStats::default();
        self.micro_step = 0;
        self.step += 1;

        Ok(Some(stats))
    }

    /// Linear warmup, then cosine decay to `min_lr_ratio * learning_rate`.
    fn get_learning_rate(&self) -> f64 {
        let warmup = self.config.warmup_steps as f64;
        let max_steps = self.config.max_steps as f64;
        let step = self.step as f64;
        let base = self.config.learning_rate;
        let min_lr = base * self.config.min_lr_ratio;

        if step < warmup {
            base * (step + 1.0) / warmup
        } else {
            let progress = ((step - warmup) / (max_steps - warmup).max(1.0)).min(1.0);
            let cosine = 0.5 * (1.0 + (std::f64::consts::PI * progress).cos());
            min_lr + (base - min_lr) * cosine
        }
    }

    /// Inference copy of the current weights.
    pub fn valid_model(&self) -> Lblm<B::InnerBackend> {
        self.model.valid()
    }

    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        let path = strip_record_ext(path);
        self.model
            .clone()
            .save_file(&path, &CompactRecorder::new())
            .map_err(|e| LblmError::FileWrite {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            })?;

        let meta = format!("step={}\nlr={:.2e}\n", self.step, self.get_learning_rate());
        let meta_path = path.with_extension("meta");
        std::fs::write(&meta_path, meta).map_err(|source| LblmError::FileWrite {
            path: meta_path,
            source,
        })?;
        Ok(())
    }

    pub fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        let path = strip_record_ext(path);
        self.model = self
            .model
            .clone()
            .load_file(&path, &CompactRecorder::new(), &self.device)
            .map_err(|e| LblmError::CheckpointLoad(format!("{:?}: {}", path, e)))?;

        let meta_path = path.with_extension("meta");
        match std::fs::read_to_string(&meta_path) {
            Ok(meta) => self.step = parse_meta_step(&meta, &meta_path)?,
            Err(e) => warn!(
                "no step sidecar at {:?} ({}); LR schedule restarts from step 0",
                meta_path, e
            ),
        }

        info!("checkpoint loaded: step {}", self.step);
        Ok(())
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn micro_step(&self) -> usize {
        self.micro_step
    }

    pub fn current_lr(&self) -> f64 {
        self.get_learning_rate()
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn special(&self) -> &SpecialIds {
        &self.special
    }
}

/// Reads `step=` from a checkpoint sidecar.
fn parse_meta_step(meta: &str, meta_path: &Path) -> Result<usize> {
    let value = meta
        .lines()
        .find_map(|line| line.strip_prefix("step="))
        .ok_or_else(|| LblmError::CheckpointLoad(format!("{:?}: missing step=", meta_path)))?;
    value.trim().parse().map_err(|e| {
        LblmError::CheckpointLoad(format!("{:?}: bad step {:?}: {}", meta_path, value, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meta_step() {
        let path = Path::new("ckpt/model.meta");
        assert_eq!(parse_meta_step("step=42\nlr=1.00e-4\n", path).unwrap(), 42);
        assert!(matches!(
            parse_meta_step("step=abc\n", path),
            Err(LblmError::CheckpointLoad(_))
        ));
        assert!(matches!(
            parse_meta_step("lr=1.00e-4\n", path),
            Err(LblmError::CheckpointLoad(_))
        ));
    }

    #[test]
    fn test_strip_record_ext() {
        assert_eq!(strip_record_ext(Path::new("ckpt/model.mpk")), Path::new("ckpt/model"));
        assert_eq!(strip_record_ext(Path::new("ckpt/model")), Path::new("ckpt/model"));
    }
}
