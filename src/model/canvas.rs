//! Known-length canvas construction
//!
//! Turns a full sequence plus a keep-mask into the partially revealed canvas
//! the encoder sees, and into one supervision entry per hidden token:
//!
//! ```text
//! seq   :  the  cat  sat  on   the  mat
//! keep  :  T    F    F    T    F    T
//! canvas:  the  <blank_2>  on  <blank_1>  mat
//! rest  :  [1, 2, 4]          (hidden positions, left to right)
//! loc   :  [0, 0, 1]          (which blank covers each of them)
//! lb    :  [0, 1, 0]          (hidden tokens of that blank left of it)
//! ```
//!
//! Placing `rest[i]` into blank `loc[i]` splits its span into `lb[i]` blanks on
//! the left and `span - 1 - lb[i]` on the right.

use crate::error::{LblmError, Result};
use crate::vocab::SpecialIds;

/// Canvas and targets for one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    /// Kept tokens and `<blank_j>` markers.
    pub tokens: Vec<i64>,
    /// Canvas positions holding a blank marker.
    pub blanks: Vec<usize>,
    /// Run length covered by each blank.
    pub spans: Vec<usize>,
    /// Original index of every hidden token.
    pub rest: Vec<usize>,
    /// Token id at `rest[i]` (the word to predict).
    pub words: Vec<i64>,
    /// Index into `blanks` of the blank covering `rest[i]`.
    pub loc: Vec<usize>,
    /// Hidden tokens of the same blank strictly left of `rest[i]`.
    pub lb: Vec<usize>,
}

impl Canvas {
    /// Number of pending targets; equals the sum of all spans.
    pub fn count(&self) -> usize {
        self.rest.len()
    }

    /// Span length of the blank covering target entry `i`.
    pub fn span_of(&self, i: usize) -> usize {
        self.spans[self.loc[i]]
    }

    /// Re-expands every blank into `j` wildcards (`None`).
    pub fn expand(&self, special: &SpecialIds) -> Vec<Option<i64>> {
        let mut out = Vec::new();
        for &tok in &self.tokens {
            match special.blank_len(tok) {
                Some(j) => out.extend(std::iter::repeat(None).take(j)),
                None => out.push(Some(tok)),
            }
        }
        out
    }

    /// Same canvas, supervised only on the hidden token at `position`.
    pub fn restrict_to(&self, position: usize) -> Option<Canvas> {
        let i = self.rest.iter().position(|&p| p == position)?;
        Some(Canvas {
            tokens: self.tokens.clone(),
            blanks: self.blanks.clone(),
            spans: self.spans.clone(),
            rest: vec![self.rest[i]],
            words: vec![self.words[i]],
            loc: vec![self.loc[i]],
            lb: vec![self.lb[i]],
        })
    }
}

/// Builds the canvas for the first `n` positions of `seq`.
pub fn build_canvas(seq: &[i64], keep: &[bool], n: usize, special: &SpecialIds) -> Result<Canvas> {
    if keep.len() != seq.len() {
        return Err(LblmError::ShapeMismatch {
            expected: format!("keep of length {}", seq.len()),
            got: format!("keep of length {}", keep.len()),
        });
    }
    if n > seq.len() {
        return Err(LblmError::ShapeMismatch {
            expected: format!("n <= {}", seq.len()),
            got: format!("n = {}", n),
        });
    }

    let mut canvas = Canvas {
        tokens: Vec::with_capacity(n),
        blanks: Vec::new(),
        spans: Vec::new(),
        rest: Vec::new(),
        words: Vec::new(),
        loc: Vec::new(),
        lb: Vec::new(),
    };
    let mut run = 0usize;

    for i in 0..n {
        if keep[i] {
            flush_run(&mut canvas, &mut run, special)?;
            canvas.tokens.push(seq[i]);
        } else {
            canvas.rest.push(i);
            canvas.words.push(seq[i]);
            canvas.loc.push(canvas.blanks.len());
            canvas.lb.push(run);
            run += 1;
        }
    }
    flush_run(&mut canvas, &mut run, special)?;

    Ok(canvas)
}

fn flush_run(canvas: &mut Canvas, run: &mut usize, special: &SpecialIds) -> Result<()> {
    if *run == 0 {
        return Ok(());
    }
    if *run > special.max_len {
        return Err(LblmError::BlankRunTooLong {
            run: *run,
            max_len: special.max_len,
        });
    }
    canvas.blanks.push(canvas.tokens.len());
    canvas.spans.push(*run);
    canvas.tokens.push(special.blank_id(*run));
    *run = 0;
    Ok(())
}

/// Canvases for a whole batch, padded to rectangular shapes on demand.
#[derive(Debug, Clone)]
pub struct CanvasBatch {
    pub rows: Vec<Canvas>,
    pad: i64,
}

impl CanvasBatch {
    pub fn new(rows: Vec<Canvas>, special: &SpecialIds) -> Self {
        Self {
            rows,
            pad: special.pad,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.rows.len()
    }

    pub fn pad(&self) -> i64 {
        self.pad
    }

    pub fn canvas_width(&self) -> usize {
        self.rows.iter().map(|c| c.tokens.len()).max().unwrap_or(0)
    }

    pub fn blank_width(&self) -> usize {
        self.rows.iter().map(|c| c.blanks.len()).max().unwrap_or(0)
    }

    pub fn target_width(&self) -> usize {
        self.rows.iter().map(|c| c.count()).max().unwrap_or(0)
    }

    pub fn counts(&self) -> Vec<usize> {
        self.rows.iter().map(Canvas::count).collect()
    }

    /// Fails on the first row with nothing left to predict.
    pub fn ensure_pending(&self) -> Result<()> {
        match self.rows.iter().position(|c| c.count() == 0 || c.blanks.is_empty()) {
            Some(row) => Err(LblmError::NoPendingBlank { row }),
            None => Ok(()),
        }
    }

    /// `[batch, canvas_width]` tokens padded with `<pad>`.
    pub fn canvas_tokens(&self) -> Vec<i64> {
        let width = self.canvas_width();
        pad_rows(self.rows.iter().map(|c| c.tokens.as_slice()), width, self.pad)
    }

    /// `[batch, blank_width]` blank positions (0 where padded) and padding mask.
    pub fn blank_positions(&self) -> (Vec<i64>, Vec<bool>) {
        let width = self.blank_width();
        let positions: Vec<Vec<i64>> = self
            .rows
            .iter()
            .map(|c| c.blanks.iter().map(|&p| p as i64).collect())
            .collect();
        (
            pad_rows(positions.iter().map(Vec::as_slice), width, 0),
            padding_mask(self.rows.iter().map(|c| c.blanks.len()), width),
        )
    }

    /// `[batch, target_width]` blank index per target entry (0 where padded).
    pub fn target_locs(&self) -> Vec<i64> {
        self.padded_targets(|c| c.loc.iter().map(|&l| l as i64).collect(), 0)
    }

    /// `[batch, target_width]` word ids per target entry (`<pad>` where padded).
    pub fn target_words(&self) -> Vec<i64> {
        self.padded_targets(|c| c.words.clone(), self.pad)
    }

    /// `[batch, target_width]` left-blank class per target entry (0 where padded).
    pub fn target_lb(&self) -> Vec<i64> {
        self.padded_targets(|c| c.lb.iter().map(|&l| l as i64).collect(), 0)
    }

    /// `[batch, target_width]`, true on padding entries.
    pub fn target_padding(&self) -> Vec<bool> {
        padding_mask(self.rows.iter().map(Canvas::count), self.target_width())
    }

    /// `[batch, target_width, max_len]`, true on LRB classes that cannot fit
    /// in the entry's span. Padding entries are left fully legal so their
    /// (discarded) log-softmax stays finite.
    pub fn lrb_illegal(&self, max_len: usize) -> Vec<bool> {
        let width = self.target_width();
        let mut mask = vec![false; self.rows.len() * width * max_len];
        for (b, canvas) in self.rows.iter().enumerate() {
            for i in 0..canvas.count() {
                let span = canvas.span_of(i);
                let base = (b * width + i) * max_len;
                for class in span.min(max_len)..max_len {
                    mask[base + class] = true;
                }
            }
        }
        mask
    }

    /// Keeps, per row, only the target entry at `positions[row]`.
    pub fn restrict_to(&self, positions: &[usize]) -> Result<CanvasBatch> {
        if positions.len() != self.rows.len() {
            return Err(LblmError::ShapeMismatch {
                expected: format!("{} positions", self.rows.len()),
                got: format!("{} positions", positions.len()),
            });
        }
        let rows = self
            .rows
            .iter()
            .zip(positions)
            .enumerate()
            .map(|(row, (canvas, &position))| {
                canvas
                    .restrict_to(position)
                    .ok_or(LblmError::TargetNotFound { row, position })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CanvasBatch { rows, pad: self.pad })
    }

    fn padded_targets<F: Fn(&Canvas) -> Vec<i64>>(&self, f: F, fill: i64) -> Vec<i64> {
        let width = self.target_width();
        let rows: Vec<Vec<i64>> = self.rows.iter().map(f).collect();
        pad_rows(rows.iter().map(Vec::as_slice), width, fill)
    }
}

/// Builds canvases for every row of a batch.
pub fn get_known_length_canvas(
    seqs: &[Vec<i64>],
    keep: &[Vec<bool>],
    n: &[usize],
    special: &SpecialIds,
) -> Result<CanvasBatch> {
    if keep.len() != seqs.len() || n.len() != seqs.len() {
        return Err(LblmError::ShapeMismatch {
            expected: format!("{} rows", seqs.len()),
            got: format!("{} keep rows, {} lengths", keep.len(), n.len()),
        });
    }
    let rows = seqs
        .iter()
        .zip(keep)
        .zip(n)
        .map(|((seq, keep), &n)| build_canvas(seq, keep, n, special))
        .collect::<Result<Vec<_>>>()?;
    Ok(CanvasBatch::new(rows, special))
}

fn pad_rows<'a, I: Iterator<Item = &'a [i64]>>(rows: I, width: usize, fill: i64) -> Vec<i64> {
    let mut flat = Vec::new();
    for row in rows {
        flat.extend_from_slice(row);
        flat.extend(std::iter::repeat(fill).take(width - row.len()));
    }
    flat
}

fn padding_mask<I: Iterator<Item = usize>>(lens: I, width: usize) -> Vec<bool> {
    let mut mask = Vec::new();
    for len in lens {
        mask.extend(std::iter::repeat(false).take(len));
        mask.extend(std::iter::repeat(true).take(width - len));
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::Vocab;

    fn special() -> SpecialIds {
        Vocab::with_max_len(4).special_ids()
    }

    #[test]
    fn test_docs_example() {
        let sp = special();
        let seq = vec![30, 31, 32, 33, 30, 34];
        let keep = vec![true, false, false, true, false, true];
        let canvas = build_canvas(&seq, &keep, 6, &sp).unwrap();

        assert_eq!(canvas.tokens, vec![30, sp.blank_id(2), 33, sp.blank_id(1), 34]);
        assert_eq!(canvas.blanks, vec![1, 3]);
        assert_eq!(canvas.spans, vec![2, 1]);
        assert_eq!(canvas.rest, vec![1, 2, 4]);
        assert_eq!(canvas.words, vec![31, 32, 30]);
        assert_eq!(canvas.loc, vec![0, 0, 1]);
        assert_eq!(canvas.lb, vec![0, 1, 0]);
    }

    #[test]
    fn test_nothing_kept_is_single_blank() {
        let sp = special();
        let canvas = build_canvas(&[30, 31, 32], &[false; 3], 3, &sp).unwrap();
        assert_eq!(canvas.tokens, vec![sp.blank_id(3)]);
        assert_eq!(canvas.lb, vec![0, 1, 2]);
        assert_eq!(canvas.count(), 3);
    }

    #[test]
    fn test_padding_ignored_beyond_n() {
        let sp = special();
        let seq = vec![30, 31, sp.pad, sp.pad];
        let keep = vec![false, true, false, false];
        let canvas = build_canvas(&seq, &keep, 2, &sp).unwrap();
        assert_eq!(canvas.tokens, vec![sp.blank_id(1), 31]);
        assert_eq!(canvas.rest, vec![0]);
    }

    #[test]
    fn test_run_longer_than_max_len_rejected() {
        let sp = special();
        let err = build_canvas(&[30; 5], &[false; 5], 5, &sp).unwrap_err();
        assert!(matches!(err, LblmError::BlankRunTooLong { run: 5, max_len: 4 }));
    }

    #[test]
    fn test_keep_length_mismatch_rejected() {
        let sp = special();
        assert!(matches!(
            build_canvas(&[30, 31], &[true], 2, &sp),
            Err(LblmError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_batch_padding_and_lrb_mask() {
        let sp = special();
        let seqs = vec![vec![30, 31, 32], vec![30, 31, sp.pad]];
        let keep = vec![vec![false, false, true], vec![true, false, false]];
        let batch = get_known_length_canvas(&seqs, &keep, &[3, 2], &sp).unwrap();

        assert_eq!(batch.canvas_width(), 2);
        assert_eq!(batch.target_width(), 2);
        assert_eq!(batch.counts(), vec![2, 1]);
        assert_eq!(batch.target_padding(), vec![false, false, false, true]);
        assert_eq!(batch.target_words(), vec![30, 31, 31, sp.pad]);

        let mask = batch.lrb_illegal(4);
        // row 0 entries sit in a span of 2: classes 2 and 3 illegal
        assert_eq!(&mask[0..4], &[false, false, true, true]);
        assert_eq!(&mask[4..8], &[false, false, true, true]);
        // row 1 entry 0 sits in a span of 1
        assert_eq!(&mask[8..12], &[false, true, true, true]);
        // padding entry stays legal
        assert_eq!(&mask[12..16], &[false, false, false, false]);
    }

    #[test]
    fn test_restrict_to_position() {
        let sp = special();
        let seqs = vec![vec![30, 31, 32]];
        let keep = vec![vec![false, true, false]];
        let batch = get_known_length_canvas(&seqs, &keep, &[3], &sp).unwrap();

        let single = batch.restrict_to(&[2]).unwrap();
        assert_eq!(single.rows[0].rest, vec![2]);
        assert_eq!(single.rows[0].loc, vec![1]);
        assert!(matches!(
            batch.restrict_to(&[1]),
            Err(LblmError::TargetNotFound { row: 0, position: 1 })
        ));
    }

    #[test]
    fn test_ensure_pending() {
        let sp = special();
        let seqs = vec![vec![30, 31]];
        let batch = get_known_length_canvas(&seqs, &[vec![true, true]], &[2], &sp).unwrap();
        assert!(matches!(batch.ensure_pending(), Err(LblmError::NoPendingBlank { row: 0 })));
    }
}
