//! Held-out evaluation with the Monte Carlo likelihood estimate

use burn::tensor::backend::Backend;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::lblm::Lblm;
use super::monte_carlo::nll_mc;
use crate::data::SentenceDataset;
use crate::error::{LblmError, Result};
use crate::vocab::SpecialIds;

/// Corpus-level likelihood, normalised per word.
#[derive(Debug, Clone, Default)]
pub struct EvalMetrics {
    pub nll: f64,
    pub perplexity: f64,
    pub sentences: usize,
    pub words: usize,
}

impl std::fmt::Display for EvalMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NLL/word: {:.4} | PPL: {:.2} | Sentences: {} | Words: {}",
            self.nll, self.perplexity, self.sentences, self.words
        )
    }
}

pub struct Evaluator {
    samples: usize,
    batch_size: usize,
    seed: u64,
}

impl Evaluator {
    pub fn new(samples: usize, batch_size: usize, seed: u64) -> Self {
        Self {
            samples,
            batch_size: batch_size.max(1),
            seed,
        }
    }

    /// Sums the per-sentence estimates and divides by the number of words.
    /// Sentences are bucketed by length, which the estimator requires.
    pub fn evaluate<B: Backend>(
        &self,
        model: &Lblm<B>,
        dataset: &SentenceDataset,
        special: &SpecialIds,
    ) -> Result<EvalMetrics> {
        if dataset.is_empty() {
            return Err(LblmError::ConfigError("evaluation set is empty".to_string()));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut total_nll = 0f64;
        let mut sentences = 0usize;
        let mut words = 0usize;

        for batch in dataset.length_buckets(special, self.batch_size) {
            let nll = nll_mc(model, &batch, special, self.samples, &mut rng)?;
            debug!("bucket n={} rows={} nll={:.3}", batch.lengths[0], batch.len(), nll.iter().sum::<f64>());

            total_nll += nll.iter().sum::<f64>();
            sentences += batch.len();
            words += batch.n_real.iter().sum::<usize>();
        }

        let nll = total_nll / words.max(1) as f64;
        Ok(EvalMetrics {
            nll,
            perplexity: nll.exp(),
            sentences,
            words,
        })
    }
}
