//! Random generation orders
//!
//! A rank vector assigns every position the step at which it is revealed.
//! `<missing>` positions are known up front and always come first, padding
//! always comes last (ranks `>= n`), the remaining real tokens are shuffled
//! uniformly. All randomness flows through the caller's RNG.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::SequenceBatch;
use crate::error::{LblmError, Result};
use crate::vocab::SpecialIds;

/// Ranks for a single sequence whose first `n` positions are real.
pub fn sample_ranks<R: Rng + ?Sized>(
    seq: &[i64],
    n: usize,
    special: &SpecialIds,
    rng: &mut R,
) -> Vec<usize> {
    let (mut missing, mut real): (Vec<usize>, Vec<usize>) =
        (0..n).partition(|&i| seq[i] == special.missing);
    missing.shuffle(rng);
    real.shuffle(rng);

    let mut rank = vec![0usize; seq.len()];
    for (r, &pos) in missing.iter().chain(real.iter()).enumerate() {
        rank[pos] = r;
    }
    for (pos, r) in rank.iter_mut().enumerate().skip(n) {
        *r = pos;
    }
    rank
}

/// One independent rank vector per row of the batch.
pub fn sample_permutation<R: Rng + ?Sized>(
    batch: &SequenceBatch,
    special: &SpecialIds,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    batch
        .tokens
        .iter()
        .zip(&batch.lengths)
        .map(|(seq, &n)| sample_ranks(seq, n, special, rng))
        .collect()
}

/// Cutoff `k` drawn uniformly from `m..=n-1`, so at least one real token stays hidden.
pub fn sample_cutoff<R: Rng + ?Sized>(row: usize, m: usize, n: usize, rng: &mut R) -> Result<usize> {
    if m >= n {
        return Err(LblmError::NoPendingBlank { row });
    }
    Ok(rng.gen_range(m..n))
}

pub fn keep_mask(rank: &[usize], k: usize) -> Vec<bool> {
    rank.iter().map(|&r| r < k).collect()
}
