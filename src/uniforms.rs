//! GPU uniform blocks shared by the technique pipelines.
//!
//! Layouts match the WGSL structs emitted by [`crate::shaders`]; every block
//! is padded to a 16-byte multiple as uniform buffers require.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Per-draw uniforms for the point-sprite render pipelines.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub(crate) struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub alpha: f32,
    pub _pad: [f32; 3],
}

impl FrameUniforms {
    pub fn new(view_proj: Mat4, alpha: f32) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            alpha,
            _pad: [0.0; 3],
        }
    }
}

/// Per-substep uniforms for the simulation passes.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub(crate) struct StepUniforms {
    pub delta: f32,
    pub count: u32,
    pub _pad: [u32; 2],
}

impl StepUniforms {
    pub fn new(delta: f32, count: u32) -> Self {
        Self {
            delta,
            count,
            _pad: [0; 2],
        }
    }
}

/// Uniforms for the accumulation fade pass.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub(crate) struct FadeUniforms {
    pub strength: f32,
    pub _pad: [f32; 3],
}

impl FadeUniforms {
    pub fn new(strength: f32) -> Self {
        Self {
            strength,
            _pad: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 80);
        assert_eq!(std::mem::size_of::<StepUniforms>(), 16);
        assert_eq!(std::mem::size_of::<FadeUniforms>(), 16);
    }

    #[test]
    fn test_step_uniforms_layout() {
        let u = StepUniforms::new(0.25, 7);
        let bytes = bytemuck::bytes_of(&u);
        assert_eq!(&bytes[0..4], &0.25f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &7u32.to_le_bytes());
    }
}
