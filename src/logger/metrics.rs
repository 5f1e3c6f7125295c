// src/logger/metrics.rs
//! Training log file and metrics CSV, written next to the checkpoints

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use crate::model::{EvalMetrics, TrainStats};

/// Appends human-readable lines to `training.log`
pub struct TrainLogger {
    file: File,
    start_time: Instant,
    log_every: usize,
}

impl TrainLogger {
    pub fn new(output_dir: &Path, log_every: usize) -> std::io::Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_dir.join("training.log"))?;

        Ok(Self {
            file,
            start_time: Instant::now(),
            log_every: log_every.max(1),
        })
    }

    /// Only every `log_every`-th step is written.
    pub fn log_step(&mut self, step: usize, stats: &TrainStats) {
        if step % self.log_every != 0 {
            return;
        }
        let line = format!(
            "Step {:>6} | Loss: {:.4} | Loc: {:.4} | Word: {:.4} | LRB: {:.4} | LR: {:.2e}",
            step, stats.loss, stats.loc, stats.word, stats.lrb, stats.lr
        );
        self.write_line(&line);
    }

    pub fn log_eval(&mut self, step: usize, metrics: &EvalMetrics) {
        self.write_line(&format!("EVAL Step {:>6} | {}", step, metrics));
    }

    pub fn log_checkpoint(&mut self, step: usize, path: &Path) {
        self.write_line(&format!("CHECKPOINT Step {} -> {}", step, path.display()));
    }

    pub fn log_message(&mut self, msg: &str) {
        self.write_line(msg);
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn write_line(&mut self, msg: &str) {
        let line = format!("[{:>6}s] {}\n", self.elapsed_secs(), msg);
        let _ = self.file.write_all(line.as_bytes());
        let _ = self.file.flush();
    }
}

const CSV_HEADER: &str = "step,loss,loc,word,lrb,lr,eval_nll,eval_ppl,epoch";

/// One row per logged step or evaluation in `metrics.csv`
pub struct MetricsCSV {
    file: File,
}

impl MetricsCSV {
    /// Truncates any previous file.
    pub fn new(output_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        let mut file = File::create(output_dir.join("metrics.csv"))?;
        writeln!(file, "{}", CSV_HEADER)?;
        Ok(Self { file })
    }

    /// Appends to an existing file, writing the header if it is new.
    pub fn open_append(output_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join("metrics.csv");
        let fresh = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if fresh {
            writeln!(file, "{}", CSV_HEADER)?;
        }
        Ok(Self { file })
    }

    pub fn record_train(&mut self, step: usize, stats: &TrainStats, epoch: usize) {
        let _ = writeln!(
            self.file,
            "{},{:.6},{:.6},{:.6},{:.6},{:.2e},,,{}",
            step, stats.loss, stats.loc, stats.word, stats.lrb, stats.lr, epoch
        );
        let _ = self.file.flush();
    }

    pub fn record_eval(&mut self, step: usize, metrics: &EvalMetrics, epoch: usize) {
        let _ = writeln!(
            self.file,
            "{},,,,,,{:.6},{:.2},{}",
            step, metrics.nll, metrics.perplexity, epoch
        );
        let _ = self.file.flush();
    }
}
