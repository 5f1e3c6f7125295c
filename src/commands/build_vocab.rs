//! Build Vocab Command

use std::path::Path;

use lblm::data::load_sentences;
use lblm::utils::format_number;
use lblm::{Result, Vocab};

pub fn execute(input: &Path, output: &Path, max_len: usize, min_count: usize) -> Result<()> {
    println!("═══════════════════════════════════════════════════════════");
    println!("  📖 Building vocabulary");
    println!("═══════════════════════════════════════════════════════════");
    println!("  Input: {:?}", input);
    println!("  max_len: {} | min_count: {}", max_len, min_count);

    let sentences = load_sentences(input)?;
    let words: usize = sentences.iter().map(Vec::len).sum();
    println!("  {} sentences, {} words", format_number(sentences.len()), format_number(words));

    let vocab = Vocab::build(&sentences, max_len, min_count);
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    vocab.save(output)?;

    println!("  ✅ {} entries -> {:?}", vocab.size(), output);
    println!("═══════════════════════════════════════════════════════════");
    Ok(())
}
