//! LBLM: Length-aware Blank Language Model
//!
//! Fills blanks of known length in a sentence, one word per step, choosing
//! which blank to fill, the word, and how the blank's remaining length splits
//! around it.

pub mod backend;
pub mod data;
pub mod error;
pub mod helpers;
pub mod logger;
pub mod model;
pub mod utils;
pub mod vocab;

pub use backend::backend_name;
pub use data::{BlankConfig, DataLoader, SentenceDataset, SequenceBatch};
pub use error::{LblmError, Result};
pub use model::{
    CanvasBatch, EvalMetrics, Evaluator, Lblm, LblmConfig, LblmLosses, TrainStats, Trainer,
    TrainingConfig,
};
pub use vocab::{SpecialIds, Vocab};
