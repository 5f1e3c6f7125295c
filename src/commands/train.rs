//! Train Command
//!
//! Main training loop: epochs over a shuffled corpus, periodic Monte Carlo
//! evaluation and checkpoints.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use lblm::backend::{get_device, TrainBackend};
use burn::config::Config;

use lblm::helpers::get_model_config;
use lblm::logger::{MetricsCSV, TrainLogger};
use lblm::utils::{format_duration, format_number, format_params};
use lblm::{DataLoader, Evaluator, Result, SentenceDataset, Trainer, TrainingConfig, Vocab};

pub struct TrainArgs {
    pub data: PathBuf,
    pub val_data: Option<PathBuf>,
    pub vocab: PathBuf,
    pub output: PathBuf,
    pub model_size: String,
    pub resume: Option<PathBuf>,
    pub max_steps: usize,
    pub save_every: usize,
    pub eval_every: usize,
    pub log_every: usize,
    pub batch_size: usize,
    pub grad_accum: usize,
    pub learning_rate: f64,
    pub warmup_steps: usize,
    pub gradient_clip: f64,
    pub mc_samples: usize,
    pub seed: u64,
}

pub fn execute(args: TrainArgs) -> Result<()> {
    println!("═══════════════════════════════════════════════════════════");
    println!("  🚀 Training LBLM ({})", lblm::backend_name());
    println!("═══════════════════════════════════════════════════════════");

    let device = get_device();
    let vocab = Vocab::from_file(&args.vocab)?;
    let special = vocab.special_ids();

    let mut model_config = get_model_config(&args.model_size, vocab.size());
    model_config.max_len = vocab.max_len();
    let max_sentence = model_config.max_seq_len.min(vocab.max_len());

    let mut dataset = SentenceDataset::from_file(&args.data, &vocab, max_sentence)?;
    let val_dataset = args
        .val_data
        .as_deref()
        .map(|path| SentenceDataset::from_file(path, &vocab, max_sentence))
        .transpose()?;

    println!("  Model: {} ({} parameters)", args.model_size, format_params(model_config.num_parameters()));
    println!("  Vocab: {} entries | max_len: {}", vocab.size(), vocab.max_len());
    println!(
        "  Train: {} sentences, {} words",
        format_number(dataset.len()),
        format_number(dataset.num_tokens())
    );
    if let Some(val) = &val_dataset {
        println!("  Val: {} sentences", format_number(val.len()));
    }
    println!(
        "  Batch: {} x {} accum | LR: {:.1e} | warmup: {}",
        args.batch_size, args.grad_accum, args.learning_rate, args.warmup_steps
    );
    println!();

    let train_config = TrainingConfig {
        learning_rate: args.learning_rate,
        batch_size: args.batch_size,
        gradient_accumulation_steps: args.grad_accum,
        warmup_steps: args.warmup_steps,
        max_steps: args.max_steps,
        gradient_clip: args.gradient_clip,
        save_every: args.save_every,
        log_every: args.log_every,
        eval_every: args.eval_every,
        mc_samples: args.mc_samples,
        seed: args.seed,
        ..Default::default()
    };

    std::fs::create_dir_all(&args.output)?;
    model_config.save(args.output.join("config.json"))?;
    let mut trainer: Trainer<TrainBackend> =
        Trainer::new(&model_config, train_config, special, device);

    let mut metrics = if let Some(checkpoint) = &args.resume {
        trainer.load_checkpoint(checkpoint)?;
        println!("  🔄 Resuming from step {}", trainer.step());
        MetricsCSV::open_append(&args.output)?
    } else {
        MetricsCSV::new(&args.output)?
    };
    let mut logger = TrainLogger::new(&args.output, args.log_every)?;
    logger.log_message(&format!("start at step {}", trainer.step()));

    run_training_loop(
        &mut trainer,
        &mut dataset,
        val_dataset.as_ref(),
        &args,
        &mut logger,
        &mut metrics,
    )?;

    let final_path = args.output.join("model_final");
    trainer.save_checkpoint(&final_path)?;
    logger.log_checkpoint(trainer.step(), &final_path);
    println!("  ✅ Final model: {:?}", final_path);
    println!("═══════════════════════════════════════════════════════════");
    Ok(())
}

fn run_training_loop(
    trainer: &mut Trainer<TrainBackend>,
    dataset: &mut SentenceDataset,
    val_dataset: Option<&SentenceDataset>,
    args: &TrainArgs,
    logger: &mut TrainLogger,
    metrics: &mut MetricsCSV,
) -> Result<()> {
    let start = Instant::now();
    let initial_step = trainer.step();
    let special = *trainer.special();
    let evaluator = Evaluator::new(args.mc_samples, args.batch_size, args.seed);
    let mut epoch = 0usize;

    if initial_step >= args.max_steps {
        println!("  Already at step {} (max_steps {})", initial_step, args.max_steps);
        return Ok(());
    }

    'training: loop {
        dataset.shuffle(args.seed + epoch as u64);
        let loader = DataLoader::new(dataset, args.batch_size, special.pad);

        if epoch == 0 && trainer.step() == initial_step {
            println!("  📦 {} batches per epoch", loader.total_batches());
            let _ = std::io::stdout().flush();
        }

        for batch in loader {
            let Some(stats) = trainer.train_step(&batch)? else {
                continue;
            };
            let step = trainer.step();

            logger.log_step(step, &stats);
            if step % args.log_every.max(1) == 0 || step == 1 {
                metrics.record_train(step, &stats, epoch);
                let steps_done = step - initial_step;
                let elapsed = start.elapsed().as_secs_f64();
                let remaining = args.max_steps.saturating_sub(step);
                let eta = remaining as f64 * elapsed / steps_done.max(1) as f64;
                println!(
                    "  Step {:>6} | Loss: {:.4} | Loc: {:.3} | Word: {:.3} | LRB: {:.3} | LR: {:.2e} | ETA: {}",
                    step,
                    stats.loss,
                    stats.loc,
                    stats.word,
                    stats.lrb,
                    stats.lr,
                    format_duration(eta as u64)
                );
            }

            if let Some(val) = val_dataset {
                if args.eval_every > 0 && step % args.eval_every == 0 {
                    let result = evaluator.evaluate(&trainer.valid_model(), val, &special)?;
                    println!("  📈 EVAL step {} | {}", step, result);
                    logger.log_eval(step, &result);
                    metrics.record_eval(step, &result, epoch);
                }
            }

            if args.save_every > 0 && step % args.save_every == 0 {
                let path = args.output.join(format!("checkpoint_{}", step));
                save(trainer, &path, logger)?;
            }

            if step >= args.max_steps {
                break 'training;
            }
        }

        epoch += 1;
        logger.log_message(&format!("epoch {} done", epoch));
    }

    println!(
        "  ⏱️  {} steps in {}",
        format_number(trainer.step() - initial_step),
        format_duration(start.elapsed().as_secs())
    );
    Ok(())
}

fn save(trainer: &Trainer<TrainBackend>, path: &Path, logger: &mut TrainLogger) -> Result<()> {
    trainer.save_checkpoint(path)?;
    logger.log_checkpoint(trainer.step(), path);
    println!("  💾 Checkpoint: {:?}", path);
    Ok(())
}
