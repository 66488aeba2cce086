//! Parse and validate every generated WGSL module with naga.
//!
//! The shaders are assembled from format strings, so a typo would otherwise
//! only surface at pipeline creation on a live device.

use naga::valid::{Capabilities, ValidationFlags, Validator};
use triad::shaders;

fn validate(label: &str, source: &str) {
    let module = naga::front::wgsl::parse_str(source)
        .unwrap_or_else(|e| panic!("{label} failed to parse:\n{}\n{source}", e));
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .unwrap_or_else(|e| panic!("{label} failed validation: {e:?}"));
}

#[test]
fn compute_step_shader_is_valid() {
    for workgroup_size in [1, 64, 256] {
        validate(
            "compute step",
            &shaders::compute_step_shader(5, 2.0, workgroup_size),
        );
    }
}

#[test]
fn stream_step_shader_is_valid() {
    validate("stream step", &shaders::stream_step_shader(5, 2.0));
}

#[test]
fn image_update_shader_is_valid() {
    for state_width in [1, 512, 1024] {
        validate(
            "image update",
            &shaders::image_update_shader(5, 2.0, state_width),
        );
    }
}

#[test]
fn point_shaders_are_valid() {
    validate("point from buffer", &shaders::point_shader_from_buffer());
    validate("point from texture", &shaders::point_shader_from_texture(512));
}

#[test]
fn fullscreen_shaders_are_valid() {
    validate("fade", &shaders::fade_shader());
    validate("composite", &shaders::composite_shader());
}

#[test]
fn unusual_lattice_configurations_are_valid() {
    // Smallest legal lattice and a large odd one.
    for dim in [2, 9] {
        for bounds in [0.5, 100.0] {
            validate("compute step", &shaders::compute_step_shader(dim, bounds, 128));
            validate("stream step", &shaders::stream_step_shader(dim, bounds));
            validate("image update", &shaders::image_update_shader(dim, bounds, 256));
        }
    }
}
