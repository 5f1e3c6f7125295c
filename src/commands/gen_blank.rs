//! Gen Blank Command
//!
//! Writes the infilling evaluation files for every grid cell.

use std::path::Path;

use lblm::data::blank_gen;
use lblm::Result;

pub fn execute(stem: &Path, seed: u64) -> Result<()> {
    println!("═══════════════════════════════════════════════════════════");
    println!("  ✂️  Generating blanked data");
    println!("═══════════════════════════════════════════════════════════");
    println!("  Input: {:?}.txt | seed: {}", stem, seed);

    for (config, pairs) in blank_gen::generate(stem, seed)? {
        println!("  {:<22} {:>7} pairs", config.suffix(), pairs);
        println!("    {}", config.output_path(stem, "blank").display());
        println!("    {}", config.output_path(stem, "fill").display());
    }
    println!("═══════════════════════════════════════════════════════════");
    Ok(())
}
