//! Word-level vocabulary with the special tokens used by the blank model.
//!
//! Layout of the id space:
//!
//! | ids                         | tokens                               |
//! |-----------------------------|--------------------------------------|
//! | 0..5                        | `<pad> <unk> <missing> <blank> <sep>`|
//! | 5..=5+max_len               | `<blank_0> .. <blank_{max_len}>`     |
//! | 6+max_len..                 | corpus words, most frequent first    |
//!
//! `<blank_j>` stands for a run of `j` unrevealed tokens on a canvas.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{LblmError, Result};

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const MISSING_TOKEN: &str = "<missing>";
pub const BLANK_TOKEN: &str = "<blank>";
pub const SEP_TOKEN: &str = "<sep>";

const NUM_FIXED_SPECIALS: usize = 5;

/// Ids of the special tokens, passed by value into every canvas/loss routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialIds {
    pub pad: i64,
    pub unk: i64,
    pub missing: i64,
    pub blank: i64,
    pub sep: i64,
    /// Base id: `blank_0 + j` marks a run of `j` unrevealed tokens.
    pub blank_0: i64,
    /// Longest run a single blank marker may carry.
    pub max_len: usize,
}

impl SpecialIds {
    pub fn blank_id(&self, run: usize) -> i64 {
        self.blank_0 + run as i64
    }

    /// Run length carried by `id` if it is a `<blank_j>` marker with `j >= 1`.
    pub fn blank_len(&self, id: i64) -> Option<usize> {
        let j = id - self.blank_0;
        if j >= 1 && j as usize <= self.max_len {
            Some(j as usize)
        } else {
            None
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Vocab {
    id_to_word: Vec<String>,
    max_len: usize,
    #[serde(skip)]
    word_to_id: HashMap<String, i64>,
}

impl Vocab {
    /// Vocabulary with only the special tokens.
    pub fn with_max_len(max_len: usize) -> Self {
        let mut id_to_word: Vec<String> = [PAD_TOKEN, UNK_TOKEN, MISSING_TOKEN, BLANK_TOKEN, SEP_TOKEN]
            .iter()
            .map(|s| s.to_string())
            .collect();
        id_to_word.extend((0..=max_len).map(|j| format!("<blank_{}>", j)));
        Self::from_words(id_to_word, max_len)
    }

    /// Builds a vocabulary from tokenized sentences, keeping words seen at least `min_count` times.
    pub fn build(sentences: &[Vec<String>], max_len: usize, min_count: usize) -> Self {
        let counts = sentences
            .par_iter()
            .fold(HashMap::new, |mut acc: HashMap<&str, usize>, sent| {
                for w in sent {
                    *acc.entry(w.as_str()).or_insert(0) += 1;
                }
                acc
            })
            .reduce(HashMap::new, |mut a, b| {
                for (w, c) in b {
                    *a.entry(w).or_insert(0) += c;
                }
                a
            });

        let mut words: Vec<(&str, usize)> = counts
            .into_iter()
            .filter(|(w, c)| *c >= min_count && !w.starts_with("<blank") && !is_fixed_special(w))
            .collect();
        // Frequency desc, then lexicographic for a stable layout
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut vocab = Self::with_max_len(max_len);
        let mut id_to_word = std::mem::take(&mut vocab.id_to_word);
        id_to_word.extend(words.into_iter().map(|(w, _)| w.to_string()));
        Self::from_words(id_to_word, max_len)
    }

    fn from_words(id_to_word: Vec<String>, max_len: usize) -> Self {
        let word_to_id = build_index(&id_to_word);
        Self {
            id_to_word,
            max_len,
            word_to_id,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| LblmError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut vocab: Vocab = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| LblmError::VocabLoad(e.to_string()))?;
        if vocab.id_to_word.len() < NUM_FIXED_SPECIALS + vocab.max_len + 1 {
            return Err(LblmError::VocabLoad(format!(
                "{} entries cannot hold the special tokens for max_len {}",
                vocab.id_to_word.len(),
                vocab.max_len
            )));
        }
        vocab.word_to_id = build_index(&vocab.id_to_word);
        Ok(vocab)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|source| LblmError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), self)
            .map_err(|e| LblmError::VocabLoad(e.to_string()))?;
        Ok(())
    }

    pub fn special_ids(&self) -> SpecialIds {
        SpecialIds {
            pad: 0,
            unk: 1,
            missing: 2,
            blank: 3,
            sep: 4,
            blank_0: NUM_FIXED_SPECIALS as i64,
            max_len: self.max_len,
        }
    }

    pub fn size(&self) -> usize {
        self.id_to_word.len()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn id(&self, word: &str) -> i64 {
        self.word_to_id.get(word).copied().unwrap_or(1)
    }

    pub fn word(&self, id: i64) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.id_to_word.get(i))
            .map(String::as_str)
    }

    pub fn encode<S: AsRef<str>>(&self, words: &[S]) -> Vec<i64> {
        words.iter().map(|w| self.id(w.as_ref())).collect()
    }

    pub fn decode(&self, ids: &[i64]) -> Vec<String> {
        ids.iter()
            .map(|&id| self.word(id).unwrap_or(UNK_TOKEN).to_string())
            .collect()
    }
}

fn is_fixed_special(w: &str) -> bool {
    matches!(w, PAD_TOKEN | UNK_TOKEN | MISSING_TOKEN | BLANK_TOKEN | SEP_TOKEN)
}

fn build_index(id_to_word: &[String]) -> HashMap<String, i64> {
    id_to_word
        .iter()
        .enumerate()
        .map(|(i, w)| (w.clone(), i as i64))
        .collect()
}
