pub mod canvas;
mod config;
mod encoder;
mod evaluator;
mod lblm;
pub mod monte_carlo;
pub mod permutation;
mod trainer;

pub use canvas::{build_canvas, get_known_length_canvas, Canvas, CanvasBatch};
pub use config::{LblmConfig, TrainingConfig};
pub use encoder::{CanvasEncoder, TransformerCanvasEncoder};
pub use evaluator::{EvalMetrics, Evaluator};
pub use lblm::{Lblm, LblmLosses, StepLogProbs, StepLosses};
pub use monte_carlo::{nll_mc, trajectory_log_prob};
pub use permutation::{keep_mask, sample_cutoff, sample_permutation, sample_ranks};
pub use trainer::{TrainStats, Trainer};
