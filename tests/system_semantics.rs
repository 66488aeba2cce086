//! Simulation semantics pinned through the CPU integration mirror.
//!
//! These run without a GPU: `integrate_reference` applies exactly the rule
//! every generated shader applies, so trajectory properties proved here hold
//! for all three techniques.

use glam::{Vec3, Vec4};
use triad::{integrate_reference, ForceField};

/// Step a whole population once, the way one simulation pass does.
fn step_all(field: &ForceField, particles: &mut [(Vec4, Vec4)], dt: f32) {
    for (p, v) in particles.iter_mut() {
        let (np, nv) = integrate_reference(field, *p, *v, dt);
        *p = np;
        *v = nv;
    }
}

#[test]
fn particles_stay_inside_the_cube() {
    let field = ForceField::generate(5, 2.0, 99);
    let mut particles: Vec<(Vec4, Vec4)> = (0..1000)
        .map(|i| {
            let t = i as f32 / 1000.0;
            (
                Vec4::new(t * 4.0 - 2.0, (t * 7.0).sin() * 2.0, t * 2.0 - 1.0, 1.0),
                Vec4::new((t * 13.0).cos(), t * 3.0 - 1.5, 1.0 - t, 0.0),
            )
        })
        .collect();

    for _ in 0..200 {
        step_all(&field, &mut particles, 1.0 / 60.0);
    }

    for (p, _) in &particles {
        assert!(p.x.abs() <= 2.0 && p.y.abs() <= 2.0 && p.z.abs() <= 2.0);
        assert_eq!(p.w, 1.0);
    }
}

#[test]
fn zero_force_zero_velocity_is_stationary() {
    let field = ForceField::constant(5, 2.0, Vec3::ZERO);
    let mut particles = vec![(Vec4::new(0.25, -0.5, 1.0, 1.0), Vec4::ZERO)];

    for _ in 0..50 {
        step_all(&field, &mut particles, 0.1);
    }

    assert_eq!(particles[0].0, Vec4::new(0.25, -0.5, 1.0, 1.0));
}

#[test]
fn large_delta_with_unit_velocity_advances_one_unit() {
    let field = ForceField::constant(5, 100.0, Vec3::ZERO);
    let mut particles: Vec<(Vec4, Vec4)> = (0..1000)
        .map(|i| {
            let offset = i as f32 * 0.05;
            (
                Vec4::new(offset, 0.0, 0.0, 1.0),
                Vec4::new(1.0, 0.0, 0.0, 0.0),
            )
        })
        .collect();
    let start: Vec<Vec4> = particles.iter().map(|(p, _)| *p).collect();

    step_all(&field, &mut particles, 1.0);

    for ((p, v), s) in particles.iter().zip(&start) {
        assert_eq!(p.x, s.x + 1.0);
        assert_eq!((p.y, p.z), (s.y, s.z));
        assert_eq!(*v, Vec4::new(1.0, 0.0, 0.0, 0.0));
    }
}

#[test]
fn reflection_preserves_speed_under_zero_force() {
    let field = ForceField::constant(5, 1.0, Vec3::ZERO);
    let v0 = Vec4::new(0.7, -0.4, 0.9, 0.0);
    let mut particles = vec![(Vec4::new(0.0, 0.0, 0.0, 1.0), v0)];

    for _ in 0..500 {
        step_all(&field, &mut particles, 0.05);
    }

    let speed = particles[0].1.truncate().length();
    assert!((speed - v0.truncate().length()).abs() < 1e-4);
}

#[test]
fn constant_downward_force_accumulates_velocity() {
    let field = ForceField::constant(5, 1000.0, Vec3::new(0.0, -1.0, 0.0));
    let mut particles = vec![(Vec4::new(0.0, 0.0, 0.0, 1.0), Vec4::ZERO)];

    let dt = 0.01;
    for _ in 0..100 {
        step_all(&field, &mut particles, dt);
    }

    // After 1 simulated second of unit acceleration.
    let v = particles[0].1;
    assert!((v.y - -1.0).abs() < 1e-4);
    assert!(particles[0].0.y < 0.0);
}

#[test]
fn trajectories_are_deterministic_per_seed() {
    let field_a = ForceField::generate(5, 2.0, 1234);
    let field_b = ForceField::generate(5, 2.0, 1234);

    let start = (Vec4::new(0.1, 0.2, 0.3, 1.0), Vec4::new(-0.5, 0.0, 0.5, 0.0));
    let mut a = vec![start];
    let mut b = vec![start];

    for _ in 0..100 {
        step_all(&field_a, &mut a, 1.0 / 60.0);
        step_all(&field_b, &mut b, 1.0 / 60.0);
    }

    assert_eq!(a[0], b[0]);
}

#[test]
fn substeps_refine_rather_than_diverge() {
    let field = ForceField::generate(5, 2.0, 55);
    let start = (Vec4::new(0.0, 0.0, 0.0, 1.0), Vec4::new(0.3, 0.1, -0.2, 0.0));

    let mut coarse = vec![start];
    step_all(&field, &mut coarse, 0.1);

    let mut fine = vec![start];
    for _ in 0..10 {
        step_all(&field, &mut fine, 0.01);
    }

    // Same trajectory, integrated at different resolutions; the endpoints
    // agree to first order.
    let gap = (coarse[0].0 - fine[0].0).truncate().length();
    assert!(gap < 0.01, "gap {gap}");
}
