// src/data/dataset.rs

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{LblmError, Result};
use crate::vocab::{SpecialIds, Vocab};

/// Padded batch of token sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceBatch {
    /// Rows of equal width, padded with `<pad>`.
    pub tokens: Vec<Vec<i64>>,
    /// Real length `n` of each row.
    pub lengths: Vec<usize>,
    /// Words per row, used to normalise the reported loss. Defaults to the
    /// row length; `count_real_words` excludes `<missing>` tokens.
    pub n_real: Vec<usize>,
}

impl SequenceBatch {
    pub fn from_sequences(seqs: &[&[i64]], pad: i64) -> Self {
        let width = seqs.iter().map(|s| s.len()).max().unwrap_or(0);
        let tokens = seqs
            .iter()
            .map(|s| {
                let mut row = s.to_vec();
                row.resize(width, pad);
                row
            })
            .collect();
        let lengths: Vec<usize> = seqs.iter().map(|s| s.len()).collect();
        Self {
            tokens,
            n_real: lengths.clone(),
            lengths,
        }
    }

    pub fn with_n_real(mut self, n_real: Vec<usize>) -> Self {
        self.n_real = n_real;
        self
    }

    /// Sets `n_real` to the tokens of each row that are not `<missing>`.
    pub fn count_real_words(self, special: &SpecialIds) -> Self {
        let n_real = self
            .lengths
            .iter()
            .zip(self.missing_counts(special))
            .map(|(&n, m)| n - m)
            .collect();
        self.with_n_real(n_real)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn width(&self) -> usize {
        self.tokens.first().map(Vec::len).unwrap_or(0)
    }

    /// `<missing>` tokens among the real positions of each row.
    pub fn missing_counts(&self, special: &SpecialIds) -> Vec<usize> {
        self.tokens
            .iter()
            .zip(&self.lengths)
            .map(|(row, &n)| row[..n].iter().filter(|&&t| t == special.missing).count())
            .collect()
    }
}

/// One whitespace-tokenized sentence per line.
pub fn load_sentences(path: &Path) -> Result<Vec<Vec<String>>> {
    let file = File::open(path).map_err(|source| LblmError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    BufReader::new(file)
        .lines()
        .map(|line| -> Result<Vec<String>> {
            Ok(line?.split_whitespace().map(String::from).collect())
        })
        .collect()
}

pub fn write_sentences(sents: &[Vec<String>], path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|source| LblmError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    for sent in sents {
        writeln!(writer, "{}", sent.join(" "))?;
    }
    writer.flush()?;
    Ok(())
}

/// Encoded sentences held in memory
pub struct SentenceDataset {
    sentences: Vec<Vec<i64>>,
    indices: Vec<usize>,
}

impl SentenceDataset {
    /// Loads and encodes a corpus. Empty lines and sentences longer than
    /// `max_len` (they could not be blanked in one run) are dropped.
    pub fn from_file(path: &Path, vocab: &Vocab, max_len: usize) -> Result<Self> {
        let sents = load_sentences(path)?;
        let total = sents.len();
        let sentences: Vec<Vec<i64>> = sents
            .iter()
            .filter(|s| !s.is_empty() && s.len() <= max_len)
            .map(|s| vocab.encode(s))
            .collect();

        if sentences.is_empty() {
            return Err(LblmError::DatasetEmpty {
                path: path.to_path_buf(),
            });
        }
        let dropped = total - sentences.len();
        if dropped > 0 {
            warn!("{:?}: dropped {} empty or over-long sentences", path, dropped);
        }
        info!("{:?}: {} sentences", path, sentences.len());

        Ok(Self::from_sentences(sentences))
    }

    pub fn from_sentences(sentences: Vec<Vec<i64>>) -> Self {
        let indices = (0..sentences.len()).collect();
        Self { sentences, indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn num_tokens(&self) -> usize {
        self.sentences.iter().map(Vec::len).sum()
    }

    pub fn get(&self, idx: usize) -> Option<&[i64]> {
        self.indices
            .get(idx)
            .map(|&i| self.sentences[i].as_slice())
    }

    pub fn shuffle(&mut self, seed: u64) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.indices.shuffle(&mut rng);
    }

    /// Groups sentences with the same length and `<missing>` count, in
    /// batches of at most `batch_size`, as the Monte Carlo estimator needs.
    pub fn length_buckets(&self, special: &SpecialIds, batch_size: usize) -> Vec<SequenceBatch> {
        let mut buckets: BTreeMap<(usize, usize), Vec<&[i64]>> = BTreeMap::new();
        for idx in 0..self.len() {
            if let Some(seq) = self.get(idx) {
                let missing = seq.iter().filter(|&&t| t == special.missing).count();
                buckets.entry((seq.len(), missing)).or_default().push(seq);
            }
        }

        buckets
            .values()
            .flat_map(|seqs| seqs.chunks(batch_size.max(1)))
            .map(|chunk| {
                SequenceBatch::from_sequences(chunk, special.pad).count_real_words(special)
            })
            .collect()
    }
}

/// Batched iterator in dataset order
#[derive(Clone)]
pub struct DataLoader<'a> {
    dataset: &'a SentenceDataset,
    batch_size: usize,
    pad: i64,
    current_idx: usize,
}

impl<'a> DataLoader<'a> {
    pub fn new(dataset: &'a SentenceDataset, batch_size: usize, pad: i64) -> Self {
        Self {
            dataset,
            batch_size: batch_size.max(1),
            pad,
            current_idx: 0,
        }
    }

    pub fn total_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }
}

impl<'a> Iterator for DataLoader<'a> {
    type Item = SequenceBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_idx >= self.dataset.len() {
            return None;
        }

        let end_idx = (self.current_idx + self.batch_size).min(self.dataset.len());
        let seqs: Vec<&[i64]> = (self.current_idx..end_idx)
            .filter_map(|idx| self.dataset.get(idx))
            .collect();
        self.current_idx = end_idx;

        if seqs.is_empty() {
            None
        } else {
            Some(SequenceBatch::from_sequences(&seqs, self.pad))
        }
    }
}
