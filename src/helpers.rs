//! Common Helper Functions
//!
//! Shared utilities used by the model, the evaluator and the commands.

use burn::tensor::{backend::Backend, Bool, Int, Tensor, TensorData};
use tracing::warn;

use crate::model::LblmConfig;

/// Returns model configuration based on size string
pub fn get_model_config(model_size: &str, vocab_size: usize) -> LblmConfig {
    match model_size {
        "tiny" => LblmConfig::lblm_tiny(vocab_size),
        "small" => LblmConfig::lblm_small(vocab_size),
        "base" => LblmConfig::lblm_base(vocab_size),
        _ => {
            warn!("model size '{}' not recognized, using small", model_size);
            LblmConfig::lblm_small(vocab_size)
        }
    }
}

pub fn int_tensor<B: Backend, const D: usize>(
    data: Vec<i64>,
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D, Int> {
    Tensor::from_data(TensorData::new(data, shape), device)
}

pub fn bool_tensor<B: Backend, const D: usize>(
    data: Vec<bool>,
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D, Bool> {
    Tensor::from_data(TensorData::new(data, shape), device)
}

pub fn float_tensor<B: Backend>(data: Vec<f32>, device: &B::Device) -> Tensor<B, 1> {
    let len = data.len();
    Tensor::from_data(TensorData::new(data, [len]), device)
}

/// ln(n!) = ln Γ(n + 1), exact summation for the integer arguments used here
pub fn log_factorial(n: usize) -> f64 {
    (2..=n).map(|i| (i as f64).ln()).sum()
}

/// Numerically stable ln Σ exp(x)
pub fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + xs.iter().map(|x| (x - max).exp()).sum::<f64>().ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_factorial() {
        assert_eq!(log_factorial(0), 0.0);
        assert_eq!(log_factorial(1), 0.0);
        assert!((log_factorial(5) - 120f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_log_sum_exp() {
        let xs = [1000.0, 1000.0];
        assert!((log_sum_exp(&xs) - (1000.0 + 2f64.ln())).abs() < 1e-9);
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
    }
}
