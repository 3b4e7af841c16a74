//! Concrete burn backends used across the workspace.
//!
//! Model code is generic over `B: Backend`; these aliases pick the backend
//! for tests, examples and training runs.

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};

/// CPU inference backend (evaluation mode).
pub type CpuBackend = NdArray<f32>;

/// CPU training backend. Modules on this backend run in training mode.
pub type TrainBackend = Autodiff<CpuBackend>;

pub fn init_cpu_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}

#[cfg(feature = "gpu")]
pub type WgpuBackend = burn::backend::Wgpu;

#[cfg(feature = "gpu")]
pub type WgpuTrainBackend = Autodiff<WgpuBackend>;

#[cfg(feature = "gpu")]
pub fn init_gpu_device() -> burn::backend::wgpu::WgpuDevice {
    // Burn picks Metal/Vulkan/DX12 from the default device
    burn::backend::wgpu::WgpuDevice::default()
}
