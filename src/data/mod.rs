// src/data/mod.rs

pub mod blank_gen;
mod dataset;

pub use blank_gen::{BlankConfig, BLANK_COUNTS, MASK_RATIOS};
pub use dataset::{load_sentences, write_sentences, DataLoader, SentenceDataset, SequenceBatch};
