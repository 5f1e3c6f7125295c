//! Info Command
//!
//! Shows a model configuration.

use lblm::backend_name;
use lblm::helpers::get_model_config;
use lblm::utils::format_params;

pub fn execute(model_size: &str, vocab_size: usize) {
    let config = get_model_config(model_size, vocab_size);

    println!("═══════════════════════════════════════════════════════════");
    println!("  📊 Model: {}", model_size);
    println!("═══════════════════════════════════════════════════════════");
    println!("  Backend: {}", backend_name());
    println!("  Parameters: {}", format_params(config.num_parameters()));
    println!("  vocab_size: {}", config.vocab_size);
    println!("  d_model: {}", config.d_model);
    println!("  n_layers: {} | n_heads: {}", config.n_layers, config.n_heads);
    println!("  d_ff: {}", config.d_ff);
    println!("  max_seq_len: {}", config.max_seq_len);
    println!("  max_len (LRB classes): {}", config.max_len);
    println!("  weight_tying: {}", config.weight_tying);
    println!("═══════════════════════════════════════════════════════════");
}
