//! Length-aware Blank Language Model
//!
//! One generation step picks a blank, writes a word into it and decides how
//! many of the blank's hidden tokens end up on each side of the word. The
//! training loss is the expected negative log-likelihood of that step under a
//! uniformly random generation order, extrapolated to the whole sequence:
//!
//! ```text
//! nll(x) <= (n - m) * E_step[loc + word + lrb] - ln Γ(n - m + 1)
//! ```
//!
//! where `m` tokens are known up front and `ln Γ` accounts for the `(n - m)!`
//! orders that produce the same sentence.

use burn::{
    module::Module,
    nn::{Linear, LinearConfig, Relu},
    record::CompactRecorder,
    tensor::{activation, backend::Backend, Bool, ElementConversion, Int, Tensor},
};
use rand::Rng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::canvas::{get_known_length_canvas, CanvasBatch};
use super::config::LblmConfig;
use super::encoder::{CanvasEncoder, TransformerCanvasEncoder};
use super::permutation::{keep_mask, sample_cutoff, sample_permutation};
use crate::data::SequenceBatch;
use crate::error::{LblmError, Result};
use crate::helpers::{bool_tensor, float_tensor, int_tensor, log_factorial};
use crate::vocab::SpecialIds;

/// Expected per-step losses, each `[batch]`.
#[derive(Debug, Clone)]
pub struct StepLosses<B: Backend> {
    pub loc: Tensor<B, 1>,
    pub word: Tensor<B, 1>,
    pub lrb: Tensor<B, 1>,
}

impl<B: Backend> StepLosses<B> {
    pub fn total(&self) -> Tensor<B, 1> {
        self.loc.clone() + self.word.clone() + self.lrb.clone()
    }
}

/// Log-probabilities of one step: `loc` is `[batch, blanks]`, `word` is
/// `[batch, targets, vocab]` and `lrb` is `[batch, targets, max_len]`.
#[derive(Debug, Clone)]
pub struct StepLogProbs<B: Backend> {
    pub loc: Tensor<B, 2>,
    pub word: Tensor<B, 3>,
    pub lrb: Tensor<B, 3>,
}

/// Batch losses handed to the training loop.
#[derive(Debug, Clone)]
pub struct LblmLosses<B: Backend> {
    /// Sequence NLL bound summed over the batch, per real word.
    pub loss: Tensor<B, 1>,
    pub loc: Tensor<B, 1>,
    pub word: Tensor<B, 1>,
    pub lrb: Tensor<B, 1>,
}

impl<B: Backend> LblmLosses<B> {
    pub fn metrics(&self) -> BTreeMap<&'static str, f32> {
        [
            ("loss", &self.loss),
            ("loc", &self.loc),
            ("word", &self.word),
            ("lrb", &self.lrb),
        ]
        .into_iter()
        .map(|(name, t)| (name, t.clone().into_scalar().elem::<f32>()))
        .collect()
    }
}

#[derive(Module, Debug)]
pub struct Lblm<B: Backend> {
    encoder: TransformerCanvasEncoder<B>,
    loc: Linear<B>,
    lrb_hidden: Linear<B>,
    lrb_act: Relu,
    lrb_out: Linear<B>,
    #[module(skip)]
    max_len: usize,
    #[module(skip)]
    max_seq_len: usize,
}

impl<B: Backend> Lblm<B> {
    pub fn new(config: &LblmConfig, device: &B::Device) -> Self {
        let d = config.d_model;
        Self {
            encoder: TransformerCanvasEncoder::new(config, device),
            loc: LinearConfig::new(d, 1).init(device),
            lrb_hidden: LinearConfig::new(2 * d, 2 * d).init(device),
            lrb_act: Relu::new(),
            lrb_out: LinearConfig::new(2 * d, config.max_len).init(device),
            max_len: config.max_len,
            max_seq_len: config.max_seq_len,
        }
    }

    /// Fresh model with the weights of a `CompactRecorder` checkpoint.
    pub fn load(config: &LblmConfig, path: &Path, device: &B::Device) -> Result<Self> {
        let path = strip_record_ext(path);
        Self::new(config, device)
            .load_file(&path, &CompactRecorder::new(), device)
            .map_err(|e| LblmError::CheckpointLoad(format!("{:?}: {}", path, e)))
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    pub fn d_model(&self) -> usize {
        self.encoder.d_model()
    }

    fn device(&self) -> B::Device {
        self.loc.weight.val().device()
    }

    /// Rejects canvases the embeddings and LRB head cannot represent.
    fn check_limits(&self, canvas: &CanvasBatch) -> Result<()> {
        if canvas.batch_size() == 0 {
            return Err(LblmError::ShapeMismatch {
                expected: "at least one canvas row".to_string(),
                got: "0 rows".to_string(),
            });
        }
        let width = canvas.canvas_width();
        if width > self.max_seq_len {
            return Err(LblmError::ShapeMismatch {
                expected: format!("canvas width <= {}", self.max_seq_len),
                got: width.to_string(),
            });
        }
        match canvas.rows.iter().flat_map(|c| c.spans.iter().copied()).max() {
            Some(run) if run > self.max_len => Err(LblmError::BlankRunTooLong {
                run,
                max_len: self.max_len,
            }),
            _ => Ok(()),
        }
    }

    /// Log-distributions of one generation step for every target entry.
    pub fn log_probs(&self, canvas: &CanvasBatch) -> Result<StepLogProbs<B>> {
        self.check_limits(canvas)?;
        canvas.ensure_pending()?;
        let device = self.device();
        let b = canvas.batch_size();
        let (width, n_blanks, n_targets) =
            (canvas.canvas_width(), canvas.blank_width(), canvas.target_width());

        let tokens = int_tensor::<B, 2>(canvas.canvas_tokens(), [b, width], &device);
        let pad_mask = tokens.clone().equal_elem(canvas.pad());
        let output = self.encoder.encode(tokens, pad_mask);

        let (blank_pos, blank_pad) = canvas.blank_positions();
        let output_blank = collect(output, &blank_pos, [b, n_blanks]);

        // Location: which blank gets the next word
        let logits_loc = self.loc.forward(output_blank.clone()).reshape([b, n_blanks]);
        let logits_loc = logits_loc.mask_fill(
            bool_tensor::<B, 2>(blank_pad, [b, n_blanks], &device),
            f32::NEG_INFINITY,
        );

        // Word written into that blank
        let output_loc = collect(output_blank, &canvas.target_locs(), [b, n_targets]);
        let logits_word = self.encoder.word_logits(output_loc.clone());

        // How the blank's span splits around the word
        let words = int_tensor::<B, 2>(canvas.target_words(), [b, n_targets], &device);
        let output_word = Tensor::cat(vec![output_loc, self.encoder.embed(words)], 2);
        let logits_lrb = self
            .lrb_out
            .forward(self.lrb_act.forward(self.lrb_hidden.forward(output_word)));
        let logits_lrb = logits_lrb.mask_fill(
            bool_tensor::<B, 3>(
                canvas.lrb_illegal(self.max_len),
                [b, n_targets, self.max_len],
                &device,
            ),
            f32::NEG_INFINITY,
        );

        Ok(StepLogProbs {
            loc: activation::log_softmax(logits_loc, 1),
            word: activation::log_softmax(logits_word, 2),
            lrb: activation::log_softmax(logits_lrb, 2),
        })
    }

    /// Expected step losses for a batch of canvases, every pending target
    /// weighted equally and normalised by the row's target count.
    pub fn get_loss(&self, canvas: &CanvasBatch) -> Result<StepLosses<B>> {
        let log_probs = self.log_probs(canvas)?;
        let device = self.device();
        let b = canvas.batch_size();
        let n_targets = canvas.target_width();

        let target_pad = bool_tensor::<B, 2>(canvas.target_padding(), [b, n_targets], &device);
        let locs = int_tensor::<B, 2>(canvas.target_locs(), [b, n_targets], &device);
        let words = int_tensor::<B, 2>(canvas.target_words(), [b, n_targets], &device);
        let lb = int_tensor::<B, 2>(canvas.target_lb(), [b, n_targets], &device);

        let loss_loc = log_probs
            .loc
            .gather(1, locs)
            .neg()
            .mask_fill(target_pad.clone(), 0.0);
        let loss_word = pick(log_probs.word, words, target_pad.clone());
        let loss_lrb = pick(log_probs.lrb, lb, target_pad);

        let count = float_tensor::<B>(
            canvas.counts().into_iter().map(|c| c as f32).collect(),
            &device,
        );
        let per_row = |loss: Tensor<B, 2>| loss.sum_dim(1).reshape([b]) / count.clone();

        Ok(StepLosses {
            loc: per_row(loss_loc),
            word: per_row(loss_word),
            lrb: per_row(loss_lrb),
        })
    }

    /// Training losses for a batch under one random step of a random order.
    pub fn losses<R: Rng + ?Sized>(
        &self,
        batch: &SequenceBatch,
        special: &SpecialIds,
        rng: &mut R,
    ) -> Result<LblmLosses<B>> {
        let n_real: usize = batch.n_real.iter().sum();
        if batch.is_empty() || n_real == 0 {
            return Err(LblmError::ShapeMismatch {
                expected: "at least one real word in the batch".to_string(),
                got: format!("{} rows, {} words", batch.len(), n_real),
            });
        }

        let device = self.device();
        let missing = batch.missing_counts(special);
        let ranks = sample_permutation(batch, special, rng);

        let keep = ranks
            .iter()
            .zip(missing.iter().zip(&batch.lengths))
            .enumerate()
            .map(|(row, (rank, (&m, &n)))| -> Result<Vec<bool>> {
                Ok(keep_mask(rank, sample_cutoff(row, m, n, &mut *rng)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let canvas = get_known_length_canvas(&batch.tokens, &keep, &batch.lengths, special)?;
        let step = self.get_loss(&canvas)?;

        let to_place: Vec<usize> = batch.lengths.iter().zip(&missing).map(|(&n, &m)| n - m).collect();
        let scale = float_tensor::<B>(to_place.iter().map(|&r| r as f32).collect(), &device);
        let correction = float_tensor::<B>(
            to_place.iter().map(|&r| log_factorial(r) as f32).collect(),
            &device,
        );
        let nll_lb = step.total() * scale - correction;

        Ok(LblmLosses {
            loss: nll_lb.sum() / n_real as f32,
            loc: step.loc.mean(),
            word: step.word.mean(),
            lrb: step.lrb.mean(),
        })
    }
}

/// Burn appends the recorder's extension itself.
pub(crate) fn strip_record_ext(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mpk") | Some("bin") => path.with_extension(""),
        _ => path.to_path_buf(),
    }
}

/// Per-row gather of hidden vectors: `x[b, index[b, i], :]`.
fn collect<B: Backend>(x: Tensor<B, 3>, index: &[i64], shape: [usize; 2]) -> Tensor<B, 3> {
    let [_, _, d] = x.dims();
    let expanded: Vec<i64> = index
        .iter()
        .flat_map(|&i| std::iter::repeat(i).take(d))
        .collect();
    let index = int_tensor::<B, 3>(expanded, [shape[0], shape[1], d], &x.device());
    x.gather(1, index)
}

/// Token-level NLL `[batch, len]` from log-probabilities, zero where `ignore` is set.
fn pick<B: Backend>(
    log_probs: Tensor<B, 3>,
    target: Tensor<B, 2, Int>,
    ignore: Tensor<B, 2, Bool>,
) -> Tensor<B, 2> {
    let [b, t, _] = log_probs.dims();
    log_probs
        .gather(2, target.reshape([b, t, 1]))
        .reshape([b, t])
        .neg()
        .mask_fill(ignore, 0.0)
}
