//! Backend Selector
//!
//! Picks the Burn backend from the enabled feature. CPU wins when several
//! are enabled, so `--features gpu` must come with `--no-default-features`.

use burn::backend::Autodiff;

// ============ CUDA BACKEND ============
#[cfg(all(feature = "cuda", not(feature = "cpu"), not(feature = "gpu")))]
mod backend_impl {
    pub use burn::backend::cuda_jit::{Cuda, CudaDevice};
    pub type MyBackend = Cuda;

    pub fn get_device() -> CudaDevice {
        CudaDevice::new(0)
    }
}

// ============ WGPU BACKEND ============
#[cfg(all(feature = "gpu", not(feature = "cuda"), not(feature = "cpu")))]
mod backend_impl {
    pub use burn::backend::wgpu::{Wgpu, WgpuDevice};
    pub type MyBackend = Wgpu;

    pub fn get_device() -> WgpuDevice {
        WgpuDevice::BestAvailable
    }
}

// ============ CPU (NDARRAY) BACKEND ============
#[cfg(not(any(
    all(feature = "cuda", not(feature = "cpu"), not(feature = "gpu")),
    all(feature = "gpu", not(feature = "cuda"), not(feature = "cpu"))
)))]
mod backend_impl {
    pub use burn::backend::ndarray::{NdArray, NdArrayDevice};
    pub type MyBackend = NdArray;

    pub fn get_device() -> NdArrayDevice {
        NdArrayDevice::Cpu
    }
}

pub use backend_impl::{get_device, MyBackend};

/// Backend with autodiff for training
pub type TrainBackend = Autodiff<MyBackend>;

/// Name of the backend selected at compile time
pub fn backend_name() -> &'static str {
    if cfg!(all(feature = "cuda", not(feature = "cpu"), not(feature = "gpu"))) {
        "CUDA"
    } else if cfg!(all(feature = "gpu", not(feature = "cuda"), not(feature = "cpu"))) {
        "WGPU"
    } else {
        "CPU (NdArray)"
    }
}
