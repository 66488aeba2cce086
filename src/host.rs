//! The boundary toward the embedding application.
//!
//! The particle system does not own a camera or a window; the host supplies
//! a view through [`CameraCapability`] and a viewport through [`Viewport`].
//! [`OrbitCamera`] is a ready-made implementation for hosts that just want
//! to look at the simulation cube.

use glam::{Mat4, Vec3};

/// What the particle system needs from the host's camera.
pub trait CameraCapability {
    /// World-to-view matrix.
    fn view(&self) -> Mat4;

    /// Camera position in world space.
    fn eye(&self) -> Vec3;
}

/// A camera orbiting a target point on a sphere.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    pub target: Vec3,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            yaw: 0.6,
            pitch: 0.4,
            distance: 3.0,
            target: Vec3::ZERO,
        }
    }
}

impl OrbitCamera {
    pub fn new(yaw: f32, pitch: f32, distance: f32) -> Self {
        Self {
            yaw,
            pitch,
            distance,
            target: Vec3::ZERO,
        }
    }

    /// Rotate by mouse-style deltas, keeping the pitch off the poles.
    pub fn orbit(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw += yaw_delta;
        self.pitch = (self.pitch + pitch_delta).clamp(-1.5, 1.5);
    }

    /// Move toward or away from the target.
    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance - delta).clamp(0.5, 30.0);
    }

    fn position(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target
            + Vec3::new(
                cos_pitch * sin_yaw,
                sin_pitch,
                cos_pitch * cos_yaw,
            ) * self.distance
    }
}

impl CameraCapability for OrbitCamera {
    fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    fn eye(&self) -> Vec3 {
        self.position()
    }
}

/// Viewport dimensions in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero-area viewport; rendering is skipped for these.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Default perspective projection for viewing the simulation cube.
pub fn default_projection(viewport: Viewport) -> Mat4 {
    Mat4::perspective_rh(50f32.to_radians(), viewport.aspect(), 1.0, 16.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orbit_camera_looks_at_target() {
        let camera = OrbitCamera::default();
        let view = camera.view();
        // The target maps onto the view-space -Z axis at the orbit distance.
        let target_view = view.transform_point3(camera.target);
        assert!(target_view.x.abs() < 1e-5);
        assert!(target_view.y.abs() < 1e-5);
        assert!((target_view.z + camera.distance).abs() < 1e-4);
    }

    #[test]
    fn test_orbit_clamps_pitch() {
        let mut camera = OrbitCamera::default();
        camera.orbit(0.0, 100.0);
        assert_eq!(camera.pitch, 1.5);
        camera.orbit(0.0, -200.0);
        assert_eq!(camera.pitch, -1.5);
    }

    #[test]
    fn test_zoom_clamps_distance() {
        let mut camera = OrbitCamera::default();
        camera.zoom(1000.0);
        assert_eq!(camera.distance, 0.5);
        camera.zoom(-1000.0);
        assert_eq!(camera.distance, 30.0);
    }

    #[test]
    fn test_viewport_empty_and_aspect() {
        assert!(Viewport::new(0, 100).is_empty());
        assert!(!Viewport::new(100, 100).is_empty());
        assert_eq!(Viewport::new(200, 100).aspect(), 2.0);
        assert_eq!(Viewport::new(100, 0).aspect(), 1.0);
    }

    #[test]
    fn test_default_projection_is_perspective() {
        let proj = default_projection(Viewport::new(800, 600));
        // Perspective matrices put -1 in the w row.
        assert_eq!(proj.col(2).w, -1.0);
    }
}
