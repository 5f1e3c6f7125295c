//! Blank-infilling data generation
//!
//! For every sentence and every (blank count, mask ratio) cell of a fixed
//! grid, removes `k` contiguous spans covering `floor(n * r)` tokens and emits
//! a parallel pair:
//!
//! - blank: kept tokens, each removed span collapsed into one `<blank>`
//! - fill:  removed tokens, spans separated by `<sep>`
//!
//! Each cell draws from its own ChaCha stream of the given seed, so cells are
//! generated in parallel and the output does not depend on scheduling.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

use super::dataset::{load_sentences, write_sentences};
use crate::error::{LblmError, Result};
use crate::vocab::{BLANK_TOKEN, SEP_TOKEN};

pub const BLANK_COUNTS: [usize; 3] = [1, 2, 3];
pub const MASK_RATIOS: [f64; 3] = [0.25, 0.50, 0.75];

/// One cell of the generation grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlankConfig {
    pub blanks: usize,
    pub ratio: f64,
}

impl BlankConfig {
    /// All 9 cells, blank count major.
    pub fn grid() -> Vec<BlankConfig> {
        BLANK_COUNTS
            .iter()
            .flat_map(|&blanks| MASK_RATIOS.iter().map(move |&ratio| BlankConfig { blanks, ratio }))
            .collect()
    }

    /// `blank{k}.maskratio{r:.2}`
    pub fn suffix(&self) -> String {
        format!("blank{}.maskratio{:.2}", self.blanks, self.ratio)
    }

    /// `{stem}.{suffix}.{kind}`
    pub fn output_path(&self, stem: &Path, kind: &str) -> PathBuf {
        with_suffix(stem, &format!(".{}.{}", self.suffix(), kind))
    }
}

/// Output of one grid cell.
#[derive(Debug, Clone, Default)]
pub struct BlankedCorpus {
    pub blank: Vec<Vec<String>>,
    pub fill: Vec<Vec<String>>,
}

/// `k` positive integers summing to `m`, uniformly over all compositions.
pub fn split<R: Rng + ?Sized>(m: usize, k: usize, rng: &mut R) -> Result<Vec<usize>> {
    if k == 0 || m < k {
        return Err(LblmError::InvalidSplit { m, k });
    }
    // k-1 distinct cut points in 1..m
    let mut cuts: Vec<usize> = index::sample(rng, m - 1, k - 1)
        .into_iter()
        .map(|c| c + 1)
        .collect();
    cuts.sort_unstable();

    let mut bounds = Vec::with_capacity(k + 1);
    bounds.push(0);
    bounds.extend(cuts);
    bounds.push(m);
    Ok(bounds.windows(2).map(|w| w[1] - w[0]).collect())
}

/// Keep-mask with `k` removed runs covering `floor(n * ratio)` tokens, at
/// least one kept token between consecutive runs. `None` when the sentence is
/// too short for this cell.
pub fn place_blanks<R: Rng + ?Sized>(n: usize, config: BlankConfig, rng: &mut R) -> Option<Vec<bool>> {
    let k = config.blanks;
    let m = (n as f64 * config.ratio) as usize;
    if m < k || m + k - 1 > n {
        return None;
    }

    let lens = split(m, k, rng).ok()?;
    // Tokens still to remove from run j onwards
    let mut remaining: Vec<usize> = lens
        .iter()
        .rev()
        .scan(0, |acc, &l| {
            *acc += l;
            Some(*acc)
        })
        .collect();
    remaining.reverse();

    let mut keep = vec![true; n];
    let mut start = 0;
    for j in 0..k {
        // Latest start leaving room for the later runs and their gaps
        let last = n - remaining[j] - (k - j - 1);
        let p = rng.gen_range(start..=last);
        for slot in &mut keep[p..p + lens[j]] {
            *slot = false;
        }
        start = p + lens[j] + 1;
    }
    Some(keep)
}

/// Splits a sentence into its blank and fill sides.
pub fn process<S: AsRef<str>>(sent: &[S], keep: &[bool]) -> (Vec<String>, Vec<String>) {
    let mut blank: Vec<String> = Vec::new();
    let mut fill: Vec<String> = Vec::new();

    for (w, &k) in sent.iter().zip(keep) {
        if k {
            blank.push(w.as_ref().to_string());
            if fill.last().map(String::as_str) != Some(SEP_TOKEN) {
                fill.push(SEP_TOKEN.to_string());
            }
        } else {
            if blank.last().map(String::as_str) != Some(BLANK_TOKEN) {
                blank.push(BLANK_TOKEN.to_string());
            }
            fill.push(w.as_ref().to_string());
        }
    }

    if fill.first().map(String::as_str) == Some(SEP_TOKEN) {
        fill.remove(0);
    }
    if fill.last().map(String::as_str) == Some(SEP_TOKEN) {
        fill.pop();
    }
    (blank, fill)
}

/// Runs one grid cell over the whole corpus, skipping sentences too short for it.
pub fn blank_corpus<R: Rng + ?Sized>(
    sents: &[Vec<String>],
    config: BlankConfig,
    rng: &mut R,
) -> BlankedCorpus {
    let mut out = BlankedCorpus::default();
    for sent in sents {
        if let Some(keep) = place_blanks(sent.len(), config, rng) {
            let (b, f) = process(sent, &keep);
            out.blank.push(b);
            out.fill.push(f);
        }
    }
    out
}

/// Reads `{stem}.txt` and writes the 18 `{stem}.blank{k}.maskratio{r}.{blank|fill}` files.
/// Returns the number of pairs written per cell, in grid order.
pub fn generate(stem: &Path, seed: u64) -> Result<Vec<(BlankConfig, usize)>> {
    let sents = load_sentences(&with_suffix(stem, ".txt"))?;
    info!("{} sentences loaded from {:?}", sents.len(), stem);

    BlankConfig::grid()
        .into_par_iter()
        .enumerate()
        .map(|(cell, config)| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(cell as u64);

            let corpus = blank_corpus(&sents, config, &mut rng);
            write_sentences(&corpus.blank, &config.output_path(stem, "blank"))?;
            write_sentences(&corpus.fill, &config.output_path(stem, "fill"))?;
            info!("{}: {} pairs", config.suffix(), corpus.blank.len());
            Ok((config, corpus.blank.len()))
        })
        .collect()
}

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = stem.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_split_sums_and_positive() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for m in 1..12 {
            for k in 1..=m {
                let parts = split(m, k, &mut rng).unwrap();
                assert_eq!(parts.len(), k);
                assert!(parts.iter().all(|&p| p >= 1));
                assert_eq!(parts.iter().sum::<usize>(), m);
            }
        }
    }

    #[test]
    fn test_split_rejects_impossible() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(split(2, 3, &mut rng), Err(LblmError::InvalidSplit { m: 2, k: 3 })));
        assert!(split(2, 0, &mut rng).is_err());
    }

    #[test]
    fn test_process_collapses_runs() {
        let sent = words("a b c d e f");
        let keep = [true, false, false, true, false, true];
        let (blank, fill) = process(&sent, &keep);
        assert_eq!(blank, words("a <blank> d <blank> f"));
        assert_eq!(fill, words("b c <sep> e"));
    }

    #[test]
    fn test_process_trims_separators() {
        let sent = words("a b c");
        let (blank, fill) = process(&sent, &[false, true, false]);
        assert_eq!(blank, words("<blank> b <blank>"));
        assert_eq!(fill, words("a <sep> c"));

        let (_, fill) = process(&sent, &[true, true, true]);
        assert!(fill.is_empty());
    }

    #[test]
    fn test_place_blanks_respects_gaps() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let config = BlankConfig { blanks: 3, ratio: 0.5 };
        for _ in 0..200 {
            let keep = place_blanks(12, config, &mut rng).unwrap();
            assert_eq!(keep.iter().filter(|&&k| !k).count(), 6);
            let runs = keep.windows(2).filter(|w| w[0] && !w[1]).count() + usize::from(!keep[0]);
            assert_eq!(runs, 3);
        }
    }

    #[test]
    fn test_place_blanks_skips_short_sentences() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        // m = floor(3 * 0.25) = 0 < k
        assert!(place_blanks(3, BlankConfig { blanks: 1, ratio: 0.25 }, &mut rng).is_none());
        // m = 3, k = 3 needs 3 + 2 positions, only 4 available
        assert!(place_blanks(4, BlankConfig { blanks: 3, ratio: 0.75 }, &mut rng).is_none());
    }

    #[test]
    fn test_suffix_format() {
        let config = BlankConfig { blanks: 2, ratio: 0.5 };
        assert_eq!(config.suffix(), "blank2.maskratio0.50");
        assert_eq!(
            config.output_path(Path::new("data/test"), "fill"),
            PathBuf::from("data/test.blank2.maskratio0.50.fill")
        );
        assert_eq!(BlankConfig::grid().len(), 9);
    }
}
