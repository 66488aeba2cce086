//! # Triad
//!
//! A GPU particle simulation with three interchangeable execution
//! strategies, all integrating the same seeded force field:
//!
//! - **Compute**: one compute dispatch per step, in-place storage buffers.
//! - **Stream**: the simulation runs in a vertex pass that writes a
//!   double-buffered destination set through vertex-stage storage writes.
//! - **Image**: particle state lives in ping-pong float textures, advanced
//!   by a full-screen fragment pass.
//!
//! All three produce the same trajectories for the same seed; techniques can
//! be switched at runtime, falling back automatically when the adapter lacks
//! the required capability.
//!
//! ## Quick Start
//!
//! ```ignore
//! use triad::prelude::*;
//!
//! let gpu = GpuContext::request_headless()?;
//! let mut system = ParticleSystem::builder()
//!     .with_particle_count(100_000)
//!     .with_technique(TechniqueKind::Compute)
//!     .with_seed(42)
//!     .build(&gpu, 1280, 720)?;
//!
//! let camera = OrbitCamera::default();
//! let projection = default_projection(Viewport::new(1280, 720));
//! system.paint(&gpu, &target_view, &camera, projection, 1280, 720);
//! ```
//!
//! ## Rendering
//!
//! Particles are drawn as soft point sprites into a floating-point
//! accumulation buffer that fades a little each frame, leaving motion
//! trails. The buffer is composited over a dark background onto whatever
//! target view the host supplies; the host keeps full ownership of the
//! window, surface, and camera.

pub mod error;
pub mod forces;
pub mod gpu;
pub mod host;
pub mod shaders;
mod system;
pub mod technique;
pub mod time;
mod uniforms;

pub use error::{GpuError, SystemError};
pub use forces::{ForceField, DEFAULT_FORCE_DIM};
pub use glam::{Mat4, Vec3, Vec4};
pub use gpu::GpuContext;
pub use host::{default_projection, CameraCapability, OrbitCamera, Viewport};
pub use system::{ParticleSystem, ParticleSystemBuilder, Spawner};
pub use technique::{integrate_reference, ParticleTechnique, TechniqueKind};

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::error::{GpuError, SystemError};
    pub use crate::forces::ForceField;
    pub use crate::gpu::GpuContext;
    pub use crate::host::{default_projection, CameraCapability, OrbitCamera, Viewport};
    pub use crate::system::{ParticleSystem, ParticleSystemBuilder};
    pub use crate::technique::TechniqueKind;
    pub use crate::time::Time;
    pub use crate::{Mat4, Vec3, Vec4};
}
