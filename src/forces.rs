//! Force-field lattice sampled by all simulation techniques.
//!
//! A small 3D grid of force vectors spanning the simulation cube. Directions
//! are drawn uniformly from the unit sphere; magnitude falls off linearly
//! with distance from the lattice center, so the corners of the field are
//! calm and the middle is turbulent.
//!
//! Generation is fully deterministic for a given seed. The driver owns the
//! GPU mirror of this data (a read-only storage buffer) and re-uploads it on
//! reset; techniques only ever read it.

use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default lattice edge length. Odd, so the field has center axes.
pub const DEFAULT_FORCE_DIM: u32 = 5;

/// CPU-side force lattice.
///
/// Cells are stored as vec4 (xyz force, w = 0) in x-major, then y, then z
/// order, matching the layout the generated shaders index.
#[derive(Debug, Clone)]
pub struct ForceField {
    dim: u32,
    bounds: f32,
    data: Vec<Vec4>,
}

impl ForceField {
    /// Generate a new field from a seed.
    ///
    /// `dim` is the lattice edge length (must be at least 2); `bounds` is the
    /// half-extent of the simulation cube the field spans.
    pub fn generate(dim: u32, bounds: f32, seed: u64) -> Self {
        assert!(dim >= 2, "force lattice needs at least 2 cells per axis");
        assert!(bounds > 0.0, "simulation bounds must be positive");

        let mut field = Self {
            dim,
            bounds,
            data: vec![Vec4::ZERO; (dim * dim * dim) as usize],
        };
        field.regenerate(seed);
        field
    }

    /// Create a field with the same force vector in every cell.
    ///
    /// Mostly useful for predictable setups (`Vec3::ZERO` gives straight-line
    /// particle motion).
    pub fn constant(dim: u32, bounds: f32, force: Vec3) -> Self {
        assert!(dim >= 2, "force lattice needs at least 2 cells per axis");
        assert!(bounds > 0.0, "simulation bounds must be positive");

        Self {
            dim,
            bounds,
            data: vec![force.extend(0.0); (dim * dim * dim) as usize],
        }
    }

    /// Refill the lattice with fresh randomness without reallocating.
    pub fn regenerate(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let dim = self.dim;
        let center = (dim - 1) as f32 * 0.5;
        let max_dist = Vec3::splat(center).length();

        for z in 0..dim {
            for y in 0..dim {
                for x in 0..dim {
                    let i = ((z * dim + y) * dim + x) as usize;
                    let cell = Vec3::new(x as f32, y as f32, z as f32);
                    let dist = (cell - Vec3::splat(center)).length();
                    let attenuation = 1.0 - dist / max_dist;
                    self.data[i] = (unit_sphere(&mut rng) * attenuation).extend(0.0);
                }
            }
        }
    }

    /// Lattice edge length.
    #[inline]
    pub fn dim(&self) -> u32 {
        self.dim
    }

    /// Half-extent of the cube the field spans.
    #[inline]
    pub fn bounds(&self) -> f32 {
        self.bounds
    }

    /// Raw cell data, for upload to the GPU mirror.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Size in bytes of the GPU mirror.
    pub fn byte_size(&self) -> u64 {
        (self.data.len() * std::mem::size_of::<Vec4>()) as u64
    }

    /// Trilinearly interpolated force at a world-space position.
    ///
    /// This is the exact CPU mirror of the lookup the simulation shaders
    /// perform; positions outside the cube clamp to the boundary cells.
    pub fn sample(&self, p: Vec3) -> Vec3 {
        let fd = (self.dim - 1) as f32;
        let g = ((p / self.bounds) * 0.5 + 0.5).clamp(Vec3::ZERO, Vec3::ONE) * fd;
        let base = g.floor().min(Vec3::splat((self.dim - 2) as f32));
        let t = (g - base).clamp(Vec3::ZERO, Vec3::ONE);
        let b = base.as_uvec3();

        let c000 = self.cell(b.x, b.y, b.z);
        let c100 = self.cell(b.x + 1, b.y, b.z);
        let c010 = self.cell(b.x, b.y + 1, b.z);
        let c110 = self.cell(b.x + 1, b.y + 1, b.z);
        let c001 = self.cell(b.x, b.y, b.z + 1);
        let c101 = self.cell(b.x + 1, b.y, b.z + 1);
        let c011 = self.cell(b.x, b.y + 1, b.z + 1);
        let c111 = self.cell(b.x + 1, b.y + 1, b.z + 1);

        let c00 = c000.lerp(c100, t.x);
        let c10 = c010.lerp(c110, t.x);
        let c01 = c001.lerp(c101, t.x);
        let c11 = c011.lerp(c111, t.x);

        let c0 = c00.lerp(c10, t.y);
        let c1 = c01.lerp(c11, t.y);

        c0.lerp(c1, t.z)
    }

    #[inline]
    fn cell(&self, x: u32, y: u32, z: u32) -> Vec3 {
        self.data[((z * self.dim + y) * self.dim + x) as usize].truncate()
    }
}

/// Uniformly distributed point on the unit sphere.
///
/// Archimedes' method: uniform z and uniform azimuth.
pub(crate) fn unit_sphere<R: Rng>(rng: &mut R) -> Vec3 {
    let z: f32 = rng.gen_range(-1.0f32..=1.0);
    let theta: f32 = rng.gen_range(0.0f32..std::f32::consts::TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), r * theta.sin(), z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_deterministic_for_seed() {
        let a = ForceField::generate(5, 1.0, 42);
        let b = ForceField::generate(5, 1.0, 42);
        assert_eq!(a.data, b.data);

        let c = ForceField::generate(5, 1.0, 43);
        assert_ne!(a.data, c.data);
    }

    #[test]
    fn test_regenerate_keeps_allocation() {
        let mut field = ForceField::generate(5, 1.0, 1);
        let len = field.data.len();
        field.regenerate(2);
        assert_eq!(field.data.len(), len);
    }

    #[test]
    fn test_attenuation_vanishes_at_corners() {
        let field = ForceField::generate(5, 1.0, 7);
        // Corner cell (0,0,0) is at maximum distance from the center.
        assert!(field.cell(0, 0, 0).length() < 1e-6);
        // The center cell carries an (almost) unit-length force.
        let center = field.cell(2, 2, 2);
        assert!((center.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cell_w_component_is_zero() {
        let field = ForceField::generate(4, 2.0, 9);
        assert!(field.data.iter().all(|c| c.w == 0.0));
    }

    #[test]
    fn test_sample_at_cell_centers_matches_cells() {
        let field = ForceField::generate(5, 1.0, 11);
        // Lattice cell (2,2,2) sits at the world origin for dim 5.
        let center = field.sample(Vec3::ZERO);
        assert!((center - field.cell(2, 2, 2)).length() < 1e-6);

        // The world-space cube corner maps to the last lattice cell.
        let corner = field.sample(Vec3::ONE);
        assert!((corner - field.cell(4, 4, 4)).length() < 1e-6);
    }

    #[test]
    fn test_sample_clamps_outside_bounds() {
        let field = ForceField::generate(5, 1.0, 13);
        let inside = field.sample(Vec3::new(1.0, 1.0, 1.0));
        let outside = field.sample(Vec3::new(10.0, 10.0, 10.0));
        assert!((inside - outside).length() < 1e-6);
    }

    #[test]
    fn test_constant_field_samples_constant() {
        let field = ForceField::constant(5, 2.0, Vec3::new(0.5, -1.0, 0.25));
        for p in [Vec3::ZERO, Vec3::new(0.3, -1.7, 0.9), Vec3::splat(2.0)] {
            assert!((field.sample(p) - Vec3::new(0.5, -1.0, 0.25)).length() < 1e-6);
        }
    }

    #[test]
    fn test_byte_size_matches_lattice() {
        let field = ForceField::generate(5, 1.0, 3);
        assert_eq!(field.byte_size(), 5 * 5 * 5 * 16);
        assert_eq!(field.as_bytes().len() as u64, field.byte_size());
    }
}
