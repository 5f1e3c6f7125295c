//! Monte Carlo estimate of the marginal log-likelihood
//!
//! The training loss only bounds `-ln p(x)`. The marginal sums over every
//! generation order:
//!
//! ```text
//! p(x) = Σ_σ p(x, σ) = (n - m)! · E_σ[p(x, σ)]
//!      ≈ (n - m)! / S · Σ_s p(x, σ_s)
//! ```
//!
//! so `-ln p(x) ≈ ln S - ln Γ(n - m + 1) - logsumexp_s ln p(x, σ_s)`.
//! Each `ln p(x, σ)` walks the whole trajectory, scoring at step `k` exactly
//! the token of rank `k`.

use burn::tensor::backend::Backend;
use rand::Rng;

use super::canvas::get_known_length_canvas;
use super::lblm::Lblm;
use super::permutation::{keep_mask, sample_permutation};
use crate::data::SequenceBatch;
use crate::error::{LblmError, Result};
use crate::helpers::{log_factorial, log_sum_exp};
use crate::vocab::SpecialIds;

/// Shared `(n, m)` of the batch; the estimator walks all rows in lock-step.
pub fn uniform_lengths(batch: &SequenceBatch, special: &SpecialIds) -> Result<(usize, usize)> {
    let n = *batch.lengths.first().ok_or_else(|| LblmError::ShapeMismatch {
        expected: "non-empty batch".to_string(),
        got: "0 rows".to_string(),
    })?;
    if let Some(row) = batch.lengths.iter().position(|&len| len != n) {
        return Err(LblmError::LengthMismatch {
            expected: n,
            got: batch.lengths[row],
            row,
        });
    }

    let missing = batch.missing_counts(special);
    let m = missing[0];
    if let Some(row) = missing.iter().position(|&c| c != m) {
        return Err(LblmError::LengthMismatch {
            expected: n - m,
            got: n - missing[row],
            row,
        });
    }
    Ok((n, m))
}

/// `ln p(x, σ)` per row for the orders given by `ranks`.
pub fn trajectory_log_prob<B: Backend>(
    model: &Lblm<B>,
    batch: &SequenceBatch,
    special: &SpecialIds,
    ranks: &[Vec<usize>],
) -> Result<Vec<f64>> {
    let (n, m) = uniform_lengths(batch, special)?;
    let mut logp = vec![0f64; batch.len()];

    for k in m..n {
        let keep: Vec<Vec<bool>> = ranks.iter().map(|rank| keep_mask(rank, k)).collect();
        let canvas = get_known_length_canvas(&batch.tokens, &keep, &batch.lengths, special)?;

        let revealed = ranks
            .iter()
            .enumerate()
            .map(|(row, rank)| {
                rank.iter()
                    .position(|&r| r == k)
                    .ok_or(LblmError::TargetNotFound { row, position: k })
            })
            .collect::<Result<Vec<_>>>()?;

        let step = model.get_loss(&canvas.restrict_to(&revealed)?)?;
        for (acc, loss) in logp.iter_mut().zip(step.total().into_data().iter::<f32>()) {
            *acc -= loss as f64;
        }
    }
    Ok(logp)
}

/// Monte Carlo negative log-likelihood per row, from `samples` random orders.
pub fn nll_mc<B: Backend, R: Rng + ?Sized>(
    model: &Lblm<B>,
    batch: &SequenceBatch,
    special: &SpecialIds,
    samples: usize,
    rng: &mut R,
) -> Result<Vec<f64>> {
    if samples == 0 {
        return Err(LblmError::ConfigError("Monte Carlo needs at least one sample".to_string()));
    }
    let (n, m) = uniform_lengths(batch, special)?;

    let mut trajectories: Vec<Vec<f64>> = vec![Vec::with_capacity(samples); batch.len()];
    for _ in 0..samples {
        let ranks = sample_permutation(batch, special, rng);
        let logp = trajectory_log_prob(model, batch, special, &ranks)?;
        for (row, lp) in trajectories.iter_mut().zip(logp) {
            row.push(lp);
        }
    }

    let offset = (samples as f64).ln() - log_factorial(n - m);
    Ok(trajectories
        .iter()
        .map(|logps| offset - log_sum_exp(logps))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::Vocab;

    #[test]
    fn test_uniform_lengths_rejects_mixed_batch() {
        let special = Vocab::with_max_len(4).special_ids();
        let a: &[i64] = &[10, 11, 12];
        let b: &[i64] = &[10, 11];
        let batch = SequenceBatch::from_sequences(&[a, b], special.pad);
        assert!(matches!(
            uniform_lengths(&batch, &special),
            Err(LblmError::LengthMismatch { expected: 3, got: 2, row: 1 })
        ));
    }

    #[test]
    fn test_uniform_lengths_rejects_mixed_missing() {
        let special = Vocab::with_max_len(4).special_ids();
        let a: &[i64] = &[10, special.missing];
        let b: &[i64] = &[10, 11];
        let batch = SequenceBatch::from_sequences(&[a, b], special.pad);
        assert!(matches!(
            uniform_lengths(&batch, &special),
            Err(LblmError::LengthMismatch { row: 1, .. })
        ));
    }

    #[test]
    fn test_uniform_lengths_ok() {
        let special = Vocab::with_max_len(4).special_ids();
        let a: &[i64] = &[10, special.missing, 12];
        let b: &[i64] = &[special.missing, 11, 12];
        let batch = SequenceBatch::from_sequences(&[a, b], special.pad);
        assert_eq!(uniform_lengths(&batch, &special).unwrap(), (3, 1));
    }
}
