//! Eval Command
//!
//! Monte Carlo NLL of a trained checkpoint on a held-out corpus.

use burn::config::Config;
use std::path::Path;
use std::time::Instant;

use lblm::backend::{get_device, MyBackend};
use lblm::helpers::get_model_config;
use lblm::utils::format_duration;
use lblm::{Evaluator, Lblm, LblmConfig, LblmError, Result, SentenceDataset, Vocab};

pub fn execute(
    model_path: &Path,
    vocab_path: &Path,
    data: &Path,
    model_size: &str,
    samples: usize,
    batch_size: usize,
    seed: u64,
) -> Result<()> {
    println!("═══════════════════════════════════════════════════════════");
    println!("  🧪 Evaluating");
    println!("═══════════════════════════════════════════════════════════");
    println!("  Model: {:?}", model_path);
    println!("  Data: {:?}", data);
    println!("  Samples per sentence: {}", samples);

    let device = get_device();
    let vocab = Vocab::from_file(vocab_path)?;
    let special = vocab.special_ids();

    // Prefer the config written by `train` next to the checkpoint
    let saved = model_path.parent().map(|dir| dir.join("config.json"));
    let config = match saved.filter(|p| p.exists()) {
        Some(path) => LblmConfig::load(&path)
            .map_err(|e| LblmError::ConfigError(format!("{:?}: {}", path, e)))?,
        None => {
            let mut config = get_model_config(model_size, vocab.size());
            config.max_len = vocab.max_len();
            config
        }
    };

    let model: Lblm<MyBackend> = Lblm::load(&config, model_path, &device)?;

    let dataset = SentenceDataset::from_file(data, &vocab, config.max_seq_len.min(vocab.max_len()))?;

    let start = Instant::now();
    let metrics = Evaluator::new(samples, batch_size, seed).evaluate(&model, &dataset, &special)?;

    println!("  {}", metrics);
    println!("  Time: {}", format_duration(start.elapsed().as_secs()));
    println!("═══════════════════════════════════════════════════════════");
    Ok(())
}
