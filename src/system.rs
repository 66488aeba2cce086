//! The simulation driver.
//!
//! Owns the force field and its GPU mirror, the frame clock, and one
//! instance of every technique that could be built on the adapter. The host
//! talks to [`ParticleSystem`]: pick a technique, pause, reset, and call
//! `paint` once per frame.

use std::collections::HashMap;

use glam::{Mat4, Vec4};
use rand::rngs::StdRng;
use rand::SeedableRng;
use wgpu::util::DeviceExt;

use crate::error::{GpuError, SystemError};
use crate::forces::{self, ForceField, DEFAULT_FORCE_DIM};
use crate::gpu::GpuContext;
use crate::host::{CameraCapability, Viewport};
use crate::technique::{
    ComputeTechnique, ImageTechnique, ParticleInit, ParticleTechnique, StreamTechnique,
    TechniqueKind,
};
use crate::time::Time;

/// Spawner callback: maps `(index, count)` to an initial
/// `(position, velocity)` pair.
pub type Spawner = Box<dyn Fn(u32, u32) -> (Vec4, Vec4)>;

/// Builder for [`ParticleSystem`].
pub struct ParticleSystemBuilder {
    particle_count: u32,
    bounds: f32,
    force_dim: u32,
    substeps: u32,
    seed: Option<u64>,
    technique: TechniqueKind,
    target_format: wgpu::TextureFormat,
    spawner: Option<Spawner>,
}

impl Default for ParticleSystemBuilder {
    fn default() -> Self {
        Self {
            particle_count: 262_144,
            bounds: 2.0,
            force_dim: DEFAULT_FORCE_DIM,
            substeps: 1,
            seed: None,
            technique: TechniqueKind::Image,
            target_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            spawner: None,
        }
    }
}

impl ParticleSystemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_particle_count(mut self, count: u32) -> Self {
        self.particle_count = count;
        self
    }

    /// Half-extent of the simulation cube.
    pub fn with_bounds(mut self, bounds: f32) -> Self {
        self.bounds = bounds;
        self
    }

    /// Edge length of the force lattice.
    pub fn with_force_dim(mut self, dim: u32) -> Self {
        self.force_dim = dim;
        self
    }

    /// Number of equal integration sub-steps per frame.
    pub fn with_substeps(mut self, substeps: u32) -> Self {
        self.substeps = substeps.max(1);
        self
    }

    /// Seed for the force field and the default spawner. Random if unset.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Technique to start with. Falls back if it cannot be built.
    pub fn with_technique(mut self, technique: TechniqueKind) -> Self {
        self.technique = technique;
        self
    }

    /// Format of the host target view `paint` renders into.
    pub fn with_target_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.target_format = format;
        self
    }

    /// Custom initial-state spawner, replacing the unit-sphere default.
    pub fn with_spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Build the system, constructing every technique the adapter supports.
    ///
    /// Techniques that fail to build are logged and omitted; the requested
    /// technique falls back along [`TechniqueKind::ALL`] if needed.
    pub fn build(
        self,
        gpu: &GpuContext,
        width: u32,
        height: u32,
    ) -> Result<ParticleSystem, SystemError> {
        let seed = self.seed.unwrap_or_else(rand::random);
        let field = ForceField::generate(self.force_dim, self.bounds, seed);
        let init = self.spawn(seed);

        let force_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Force Field Buffer"),
                contents: field.as_bytes(),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            });

        let mut techniques: HashMap<TechniqueKind, Box<dyn ParticleTechnique>> = HashMap::new();
        for kind in TechniqueKind::ALL {
            match build_technique(
                kind,
                gpu,
                init.clone(),
                &field,
                &force_buffer,
                width,
                height,
                self.target_format,
            ) {
                Ok(technique) => {
                    techniques.insert(kind, technique);
                }
                Err(e) => {
                    log::warn!("technique '{}' unavailable: {}", kind.name(), e);
                }
            }
        }

        let available: Vec<TechniqueKind> = TechniqueKind::ALL
            .into_iter()
            .filter(|k| techniques.contains_key(k))
            .collect();
        let active = resolve_technique(self.technique, &available)
            .ok_or(SystemError::NoTechniqueAvailable)?;
        if active != self.technique {
            log::warn!(
                "technique '{}' unavailable, falling back to '{}'",
                self.technique.name(),
                active.name()
            );
        }
        log::info!(
            "particle system ready: {} particles, technique '{}', seed {}",
            init.count(),
            active.name(),
            seed
        );

        Ok(ParticleSystem {
            techniques,
            active,
            field,
            force_buffer,
            time: Time::new(),
            substeps: self.substeps,
            viewport: Viewport::new(width, height),
        })
    }

    fn spawn(&self, seed: u64) -> ParticleInit {
        let count = self.particle_count;
        match &self.spawner {
            Some(spawner) => {
                let mut positions = Vec::with_capacity(count as usize);
                let mut velocities = Vec::with_capacity(count as usize);
                for i in 0..count {
                    let (p, v) = spawner(i, count);
                    positions.push(p);
                    velocities.push(v);
                }
                ParticleInit::new(positions, velocities)
            }
            None => default_spawn(count, seed),
        }
    }
}

/// Default initial state: positions uniform on the unit sphere, zero
/// velocities.
fn default_spawn(count: u32, seed: u64) -> ParticleInit {
    let mut rng = StdRng::seed_from_u64(seed);
    let positions = (0..count)
        .map(|_| forces::unit_sphere(&mut rng).extend(1.0))
        .collect();
    let velocities = vec![Vec4::ZERO; count as usize];
    ParticleInit::new(positions, velocities)
}

#[allow(clippy::too_many_arguments)]
fn build_technique(
    kind: TechniqueKind,
    gpu: &GpuContext,
    init: ParticleInit,
    field: &ForceField,
    force_buffer: &wgpu::Buffer,
    width: u32,
    height: u32,
    target_format: wgpu::TextureFormat,
) -> Result<Box<dyn ParticleTechnique>, GpuError> {
    Ok(match kind {
        TechniqueKind::Compute => Box::new(ComputeTechnique::new(
            gpu,
            init,
            field,
            force_buffer,
            width,
            height,
            target_format,
        )?),
        TechniqueKind::Stream => Box::new(StreamTechnique::new(
            gpu,
            init,
            field,
            force_buffer,
            width,
            height,
            target_format,
        )?),
        TechniqueKind::Image => Box::new(ImageTechnique::new(
            gpu,
            init,
            field,
            force_buffer,
            width,
            height,
            target_format,
        )?),
    })
}

/// Pick the technique to activate: the requested one if available, otherwise
/// the first available kind in fallback order.
fn resolve_technique(
    requested: TechniqueKind,
    available: &[TechniqueKind],
) -> Option<TechniqueKind> {
    if available.contains(&requested) {
        return Some(requested);
    }
    TechniqueKind::ALL
        .into_iter()
        .find(|k| available.contains(k))
}

/// Split a frame delta into `substeps` equal integration steps.
fn split_delta(delta: f32, substeps: u32) -> (f32, u32) {
    let substeps = substeps.max(1);
    (delta / substeps as f32, substeps)
}

/// GPU particle simulation with interchangeable techniques.
pub struct ParticleSystem {
    techniques: HashMap<TechniqueKind, Box<dyn ParticleTechnique>>,
    active: TechniqueKind,

    field: ForceField,
    force_buffer: wgpu::Buffer,

    time: Time,
    substeps: u32,
    viewport: Viewport,
}

impl ParticleSystem {
    pub fn builder() -> ParticleSystemBuilder {
        ParticleSystemBuilder::new()
    }

    /// The currently active technique.
    pub fn technique(&self) -> TechniqueKind {
        self.active
    }

    /// Techniques that initialized successfully, in fallback order.
    pub fn available_techniques(&self) -> Vec<TechniqueKind> {
        TechniqueKind::ALL
            .into_iter()
            .filter(|k| self.techniques.contains_key(k))
            .collect()
    }

    /// Switch the active technique.
    ///
    /// Switching to an unavailable technique keeps the current selection and
    /// logs a warning; particle state is not transferred between techniques.
    pub fn set_technique(&mut self, kind: TechniqueKind) {
        if self.techniques.contains_key(&kind) {
            self.active = kind;
        } else {
            log::warn!(
                "technique '{}' unavailable, keeping '{}'",
                kind.name(),
                self.active.name()
            );
        }
    }

    /// Pause or resume the simulation.
    ///
    /// While paused the clock stops and every technique clears instead of
    /// fading, so no stale trails survive the pause.
    pub fn set_paused(&mut self, paused: bool) {
        if paused {
            self.time.pause();
        } else {
            self.time.resume();
        }
        for technique in self.techniques.values_mut() {
            technique.pause(paused);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.time.is_paused()
    }

    /// Toggle the paused state and return the new value.
    pub fn toggle_paused(&mut self) -> bool {
        let paused = !self.is_paused();
        self.set_paused(paused);
        paused
    }

    pub fn set_substeps(&mut self, substeps: u32) {
        self.substeps = substeps.max(1);
    }

    /// Fix the frame delta for deterministic stepping. `None` restores real
    /// frame timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.time.set_fixed_delta(delta);
    }

    /// The CPU-side force field driving all techniques.
    pub fn force_field(&self) -> &ForceField {
        &self.field
    }

    /// Reset with a fresh random seed.
    pub fn reset(&mut self, gpu: &GpuContext) {
        self.reset_seeded(gpu, rand::random());
    }

    /// Regenerate the force field from `seed`, restore the initial particle
    /// state in every technique, and restart the clock. A paused system
    /// stays paused.
    pub fn reset_seeded(&mut self, gpu: &GpuContext, seed: u64) {
        self.field.regenerate(seed);
        gpu.queue
            .write_buffer(&self.force_buffer, 0, self.field.as_bytes());
        self.time.reset();
        // The clock keeps its paused flag across reset; keep every
        // technique's flag in agreement with it.
        let paused = self.time.is_paused();
        for technique in self.techniques.values_mut() {
            technique.reset(gpu);
            technique.pause(paused);
        }
        log::info!("simulation reset, seed {}", seed);
    }

    /// Advance the simulation and render one frame into `target`.
    ///
    /// Handles viewport changes, the frame clock, sub-stepping, and pause in
    /// one place; the host only supplies the camera and target view.
    pub fn paint(
        &mut self,
        gpu: &GpuContext,
        target: &wgpu::TextureView,
        camera: &dyn CameraCapability,
        projection: Mat4,
        width: u32,
        height: u32,
    ) {
        let viewport = Viewport::new(width, height);
        if viewport.is_empty() {
            return;
        }
        if viewport != self.viewport {
            for technique in self.techniques.values_mut() {
                technique.resize(gpu, width, height);
            }
            self.viewport = viewport;
        }

        let (_, delta) = self.time.update();

        // The active kind is always present; set_technique never selects an
        // unavailable one.
        let Some(active) = self.techniques.get_mut(&self.active) else {
            return;
        };

        if delta > 0.0 {
            let (sub_delta, steps) = split_delta(delta, self.substeps);
            for _ in 0..steps {
                active.step(gpu, sub_delta);
            }
        }

        let view_proj = projection * camera.view();
        active.draw(gpu, target, delta, view_proj);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_requested() {
        let available = [TechniqueKind::Compute, TechniqueKind::Image];
        assert_eq!(
            resolve_technique(TechniqueKind::Image, &available),
            Some(TechniqueKind::Image)
        );
    }

    #[test]
    fn test_resolve_falls_back_in_order() {
        let available = [TechniqueKind::Stream, TechniqueKind::Image];
        assert_eq!(
            resolve_technique(TechniqueKind::Compute, &available),
            Some(TechniqueKind::Stream)
        );
    }

    #[test]
    fn test_resolve_empty_is_none() {
        assert_eq!(resolve_technique(TechniqueKind::Compute, &[]), None);
    }

    #[test]
    fn test_split_delta_preserves_total() {
        let (sub, steps) = split_delta(0.016, 4);
        assert_eq!(steps, 4);
        assert!((sub * steps as f32 - 0.016).abs() < 1e-7);
    }

    #[test]
    fn test_split_delta_clamps_zero_substeps() {
        let (sub, steps) = split_delta(0.016, 0);
        assert_eq!(steps, 1);
        assert_eq!(sub, 0.016);
    }

    #[test]
    fn test_default_spawn_on_unit_sphere() {
        let init = default_spawn(256, 7);
        assert_eq!(init.count(), 256);
        for p in init.positions.iter() {
            assert!((p.truncate().length() - 1.0).abs() < 1e-5);
            assert_eq!(p.w, 1.0);
        }
        assert!(init.velocities.iter().all(|v| *v == Vec4::ZERO));
    }

    #[test]
    fn test_default_spawn_is_seeded() {
        let a = default_spawn(16, 3);
        let b = default_spawn(16, 3);
        assert_eq!(a.positions, b.positions);

        let c = default_spawn(16, 4);
        assert_ne!(a.positions, c.positions);
    }

    #[test]
    fn test_builder_substeps_floor() {
        let builder = ParticleSystemBuilder::new().with_substeps(0);
        assert_eq!(builder.substeps, 1);
    }
}
