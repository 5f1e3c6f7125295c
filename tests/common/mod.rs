//! Common test utilities and helpers
//!
//! Shared helpers for integration tests.

#![allow(dead_code)]

use burn::backend::ndarray::{NdArray, NdArrayDevice};
use lblm::{LblmConfig, SequenceBatch, SpecialIds, Vocab};
use std::path::{Path, PathBuf};

pub type TestBackend = NdArray;

pub fn test_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}

pub const CORPUS: &[&str] = &[
    "the cat sat on the mat",
    "a dog ran in the park",
    "the bird sang",
    "we like the small cat",
    "it was a long day",
];

pub fn corpus() -> Vec<Vec<String>> {
    CORPUS
        .iter()
        .map(|s| s.split_whitespace().map(String::from).collect())
        .collect()
}

/// Vocabulary over `CORPUS` with blank runs of up to 8 tokens
pub fn test_vocab() -> Vocab {
    Vocab::build(&corpus(), 8, 1)
}

pub fn special() -> SpecialIds {
    test_vocab().special_ids()
}

/// Minimal model configuration for fast tests
pub fn test_model_config(vocab: &Vocab) -> LblmConfig {
    LblmConfig::new()
        .with_vocab_size(vocab.size())
        .with_d_model(32)
        .with_n_layers(1)
        .with_n_heads(2)
        .with_d_ff(64)
        .with_max_seq_len(16)
        .with_max_len(vocab.max_len())
        .with_dropout(0.0)
        .with_weight_tying(true)
}

pub fn encode_batch(vocab: &Vocab, sents: &[&str]) -> SequenceBatch {
    let encoded: Vec<Vec<i64>> = sents
        .iter()
        .map(|s| vocab.encode(&s.split_whitespace().collect::<Vec<_>>()))
        .collect();
    let rows: Vec<&[i64]> = encoded.iter().map(Vec::as_slice).collect();
    SequenceBatch::from_sequences(&rows, vocab.special_ids().pad)
}

/// Writes one sentence per line and returns the path
pub fn write_corpus(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, lines.join("\n") + "\n").expect("Failed to write corpus");
    path
}
