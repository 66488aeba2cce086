//! Error types for triad.
//!
//! Initialization is the only fallible phase: adapter/device acquisition and
//! per-technique resource creation. Per-frame command submission is assumed
//! infallible at this layer.

use std::fmt;

/// Errors that can occur while acquiring the GPU or building a technique.
#[derive(Debug)]
pub enum GpuError {
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// The adapter does not support the execution model a technique needs
    /// (compute shaders, vertex-stage storage writes).
    UnsupportedExecutionModel(&'static str),
    /// The particle count does not fit into the largest allocatable state
    /// texture of the image technique.
    ParticleCountTooLarge { count: u32, max_texels: u64 },
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with Vulkan/Metal/DX12 support."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::UnsupportedExecutionModel(model) => write!(f, "Execution model not supported by this adapter: {}", model),
            GpuError::ParticleCountTooLarge { count, max_texels } => write!(f, "Particle count {} exceeds the state texture capacity of {} texels", count, max_texels),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors that can occur when building a particle system.
///
/// A single technique failing to build is recoverable (the technique is
/// omitted from the available set); the system as a whole fails only when
/// no technique can be constructed.
#[derive(Debug)]
pub enum SystemError {
    /// GPU initialization failed.
    Gpu(GpuError),
    /// Every technique failed to initialize; there is no safe default left.
    NoTechniqueAvailable,
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemError::Gpu(e) => write!(f, "GPU error: {}", e),
            SystemError::NoTechniqueAvailable => write!(f, "No particle technique could be initialized on this adapter"),
        }
    }
}

impl std::error::Error for SystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SystemError::Gpu(e) => Some(e),
            SystemError::NoTechniqueAvailable => None,
        }
    }
}

impl From<GpuError> for SystemError {
    fn from(e: GpuError) -> Self {
        SystemError::Gpu(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_model_message_names_model() {
        let e = GpuError::UnsupportedExecutionModel("compute shaders");
        assert!(e.to_string().contains("compute shaders"));
    }

    #[test]
    fn test_system_error_wraps_gpu_error() {
        let e = SystemError::from(GpuError::NoAdapter);
        assert!(matches!(e, SystemError::Gpu(GpuError::NoAdapter)));
        assert!(std::error::Error::source(&e).is_some());
    }
}
