//! Image technique: particle state lives in ping-pong float textures.
//!
//! Positions and velocities occupy one near-square Rgba32Float texture each,
//! one particle per texel. A step is a full-screen fragment pass reading the
//! source pair and writing the destination pair through two color
//! attachments. This is the baseline model; it needs no compute support and
//! no vertex-stage storage writes.

use glam::Mat4;
use wgpu::util::DeviceExt;

use super::{
    create_point_pipeline, point_alpha, state_texture_extent, ParticleInit, ParticleTechnique,
};
use crate::error::GpuError;
use crate::forces::ForceField;
use crate::gpu::accum::AccumulationTarget;
use crate::gpu::GpuContext;
use crate::shaders;
use crate::uniforms::{FrameUniforms, StepUniforms};

const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// One ping-pong set: a position texture and a velocity texture.
struct StateTextures {
    positions: wgpu::Texture,
    velocities: wgpu::Texture,
    position_view: wgpu::TextureView,
    velocity_view: wgpu::TextureView,
}

impl StateTextures {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let positions = create_state_texture(device, width, height, "State Position Texture");
        let velocities = create_state_texture(device, width, height, "State Velocity Texture");
        let position_view = positions.create_view(&wgpu::TextureViewDescriptor::default());
        let velocity_view = velocities.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            positions,
            velocities,
            position_view,
            velocity_view,
        }
    }
}

fn create_state_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    label: &str,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: STATE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

pub struct ImageTechnique {
    count: u32,
    extent: (u32, u32),

    sets: [StateTextures; 2],
    /// Index of the set holding current state.
    read: usize,

    update_pipeline: wgpu::RenderPipeline,
    /// `update_bind_groups[read]` binds `sets[read]` as source.
    update_bind_groups: [wgpu::BindGroup; 2],
    step_uniforms: wgpu::Buffer,

    draw_pipeline: wgpu::RenderPipeline,
    /// `draw_bind_groups[read]` fetches positions from `sets[read]`.
    draw_bind_groups: [wgpu::BindGroup; 2],
    frame_uniforms: wgpu::Buffer,
    alpha: f32,

    accum: AccumulationTarget,
    init: ParticleInit,
    paused: bool,
}

impl ImageTechnique {
    pub fn new(
        gpu: &GpuContext,
        init: ParticleInit,
        field: &ForceField,
        force_buffer: &wgpu::Buffer,
        width: u32,
        height: u32,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, GpuError> {
        let device = &gpu.device;
        let count = init.count();
        let extent = state_texture_extent(count, device.limits().max_texture_dimension_2d)?;

        let sets = [
            StateTextures::new(device, extent.0, extent.1),
            StateTextures::new(device, extent.0, extent.1),
        ];

        let step_uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Image Step Uniform Buffer"),
            contents: bytemuck::bytes_of(&StepUniforms::new(0.0, count)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let update_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Image Update Bind Group Layout"),
            entries: &[
                state_texture_entry(0),
                state_texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let make_update_bind_group = |src: &StateTextures, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &update_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&src.position_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&src.velocity_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: force_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: step_uniforms.as_entire_binding(),
                    },
                ],
            })
        };

        let update_bind_groups = [
            make_update_bind_group(&sets[0], "Image Update Bind Group A"),
            make_update_bind_group(&sets[1], "Image Update Bind Group B"),
        ];

        let update_shader_src =
            shaders::image_update_shader(field.dim(), field.bounds(), extent.0);
        let update_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Image Update Shader"),
            source: wgpu::ShaderSource::Wgsl(update_shader_src.into()),
        });

        let update_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Image Update Pipeline Layout"),
                bind_group_layouts: &[&update_layout],
                push_constant_ranges: &[],
            });

        let state_target = Some(wgpu::ColorTargetState {
            format: STATE_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        });

        let update_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Image Update Pipeline"),
            layout: Some(&update_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &update_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &update_shader,
                entry_point: Some("fs_main"),
                targets: &[state_target.clone(), state_target],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let alpha = point_alpha(count);
        let frame_uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Image Frame Uniform Buffer"),
            contents: bytemuck::bytes_of(&FrameUniforms::new(Mat4::IDENTITY, alpha)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Image Draw Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let make_draw_bind_group = |src: &StateTextures, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &draw_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: frame_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&src.position_view),
                    },
                ],
            })
        };

        let draw_bind_groups = [
            make_draw_bind_group(&sets[0], "Image Draw Bind Group A"),
            make_draw_bind_group(&sets[1], "Image Draw Bind Group B"),
        ];

        let draw_pipeline = create_point_pipeline(
            device,
            "Image Point Pipeline",
            &shaders::point_shader_from_texture(extent.0),
            &draw_layout,
            false,
        );

        let accum = AccumulationTarget::new(device, width, height, target_format);

        let technique = Self {
            count,
            extent,
            sets,
            read: 0,
            update_pipeline,
            update_bind_groups,
            step_uniforms,
            draw_pipeline,
            draw_bind_groups,
            frame_uniforms,
            alpha,
            accum,
            init,
            paused: false,
        };
        technique.upload_initial_state(gpu);
        Ok(technique)
    }

    /// Upload the construction-time state into both ping-pong sets.
    fn upload_initial_state(&self, gpu: &GpuContext) {
        let position_texels = pad_to_texel_grid(&self.init.positions, self.extent);
        let velocity_texels = pad_to_texel_grid(&self.init.velocities, self.extent);

        for set in &self.sets {
            write_state_texture(gpu, &set.positions, &position_texels, self.extent);
            write_state_texture(gpu, &set.velocities, &velocity_texels, self.extent);
        }
    }
}

impl ParticleTechnique for ImageTechnique {
    fn step(&mut self, gpu: &GpuContext, delta: f32) {
        if self.count > 0 {
            gpu.queue.write_buffer(
                &self.step_uniforms,
                0,
                bytemuck::bytes_of(&StepUniforms::new(delta, self.count)),
            );

            let write = &self.sets[1 - self.read];
            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Image Step Encoder"),
                });
            {
                let attachment = |view| {
                    Some(wgpu::RenderPassColorAttachment {
                        view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })
                };
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Image Update Pass"),
                    color_attachments: &[
                        attachment(&write.position_view),
                        attachment(&write.velocity_view),
                    ],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&self.update_pipeline);
                pass.set_bind_group(0, &self.update_bind_groups[self.read], &[]);
                pass.draw(0..3, 0..1);
            }
            gpu.queue.submit(std::iter::once(encoder.finish()));
        }

        // Swap even for an empty system so the double-buffer invariant holds.
        self.read = 1 - self.read;
    }

    fn draw(&mut self, gpu: &GpuContext, target: &wgpu::TextureView, delta: f32, view_proj: Mat4) {
        gpu.queue.write_buffer(
            &self.frame_uniforms,
            0,
            bytemuck::bytes_of(&FrameUniforms::new(view_proj, self.alpha)),
        );

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Image Draw Encoder"),
            });

        self.accum.begin(&gpu.queue, &mut encoder, delta, self.paused);
        if self.count > 0 {
            let mut pass = self.accum.point_pass(&mut encoder);
            pass.set_pipeline(&self.draw_pipeline);
            pass.set_bind_group(0, &self.draw_bind_groups[self.read], &[]);
            pass.draw(0..6, 0..self.count);
        }
        self.accum.composite(&mut encoder, target, super::BACKGROUND);

        gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        self.accum.resize(&gpu.device, width, height);
    }

    fn reset(&mut self, gpu: &GpuContext) {
        self.upload_initial_state(gpu);
        self.read = 0;
        self.accum.request_clear();
    }

    fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

fn state_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Zero-pad particle data to fill the full texel grid.
fn pad_to_texel_grid(data: &[glam::Vec4], (width, height): (u32, u32)) -> Vec<u8> {
    let texel_count = (width * height) as usize;
    let mut bytes = vec![0u8; texel_count * 16];
    let data_bytes: &[u8] = bytemuck::cast_slice(data);
    bytes[..data_bytes.len()].copy_from_slice(data_bytes);
    bytes
}

fn write_state_texture(
    gpu: &GpuContext,
    texture: &wgpu::Texture,
    texels: &[u8],
    (width, height): (u32, u32),
) {
    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        texels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 16),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}
