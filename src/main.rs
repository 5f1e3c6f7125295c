mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lblm")]
#[command(version)]
#[command(about = "Length-aware Blank Language Model for text infilling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Builds a word vocabulary from a whitespace-tokenized corpus
    BuildVocab {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Longest blank run; one <blank_t> token per length
        #[arg(long, default_value = "256")]
        max_len: usize,
        #[arg(long, default_value = "1")]
        min_count: usize,
    },

    /// Trains an LBLM on one sentence per line
    Train {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        val_data: Option<PathBuf>,
        #[arg(short, long)]
        vocab: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "small")]
        model_size: String,
        /// Checkpoint to continue from
        #[arg(long)]
        resume: Option<PathBuf>,
        #[arg(long, default_value = "100000")]
        max_steps: usize,
        #[arg(long, default_value = "5000")]
        save_every: usize,
        #[arg(long, default_value = "1000")]
        eval_every: usize,
        #[arg(long, default_value = "100")]
        log_every: usize,
        #[arg(long, default_value = "32")]
        batch_size: usize,
        #[arg(long, default_value = "1")]
        grad_accum: usize,
        #[arg(long, default_value = "5e-4")]
        learning_rate: f64,
        #[arg(long, default_value = "4000")]
        warmup_steps: usize,
        #[arg(long, default_value = "1.0")]
        gradient_clip: f64,
        #[arg(long, default_value = "10")]
        mc_samples: usize,
        #[arg(long, default_value = "1")]
        seed: u64,
    },

    /// Estimates held-out NLL per word by sampling generation orders
    Eval {
        #[arg(short, long)]
        model: PathBuf,
        #[arg(short, long)]
        vocab: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long, default_value = "small")]
        model_size: String,
        #[arg(long, default_value = "100")]
        samples: usize,
        #[arg(long, default_value = "16")]
        batch_size: usize,
        #[arg(long, default_value = "1")]
        seed: u64,
    },

    /// Writes the blank/fill infilling files for every blank count and mask ratio
    GenBlank {
        /// Corpus stem: reads {input}.txt
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long, default_value = "1")]
        seed: u64,
    },

    /// Shows a model configuration
    Info {
        #[arg(long, default_value = "small")]
        model_size: String,
        #[arg(long, default_value = "10000")]
        vocab_size: usize,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::BuildVocab { input, output, max_len, min_count } => {
            commands::build_vocab::execute(&input, &output, max_len, min_count)
        }
        Commands::Train {
            data,
            val_data,
            vocab,
            output,
            model_size,
            resume,
            max_steps,
            save_every,
            eval_every,
            log_every,
            batch_size,
            grad_accum,
            learning_rate,
            warmup_steps,
            gradient_clip,
            mc_samples,
            seed,
        } => commands::train::execute(commands::train::TrainArgs {
            data,
            val_data,
            vocab,
            output,
            model_size,
            resume,
            max_steps,
            save_every,
            eval_every,
            log_every,
            batch_size,
            grad_accum,
            learning_rate,
            warmup_steps,
            gradient_clip,
            mc_samples,
            seed,
        }),
        Commands::Eval { model, vocab, data, model_size, samples, batch_size, seed } => {
            commands::evaluate::execute(&model, &vocab, &data, &model_size, samples, batch_size, seed)
        }
        Commands::GenBlank { input, seed } => commands::gen_blank::execute(&input, seed),
        Commands::Info { model_size, vocab_size } => {
            commands::info::execute(&model_size, vocab_size);
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
