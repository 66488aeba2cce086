//! Compute-shader technique: one data-parallel dispatch per step, updating
//! position and velocity storage buffers in place. Rendering draws point
//! sprites straight from the same position buffer, no intermediate copy.

use glam::Mat4;
use wgpu::util::DeviceExt;

use super::{
    create_point_pipeline, create_state_buffer, point_alpha, uniform_bind_group_layout,
    ParticleInit, ParticleTechnique,
};
use crate::error::GpuError;
use crate::forces::ForceField;
use crate::gpu::accum::AccumulationTarget;
use crate::gpu::GpuContext;
use crate::shaders;
use crate::uniforms::{FrameUniforms, StepUniforms};

pub struct ComputeTechnique {
    count: u32,
    /// Workgroup width derived from device limits at construction.
    workgroup_size: u32,

    positions: wgpu::Buffer,
    velocities: wgpu::Buffer,

    step_pipeline: wgpu::ComputePipeline,
    step_bind_group: wgpu::BindGroup,
    step_uniforms: wgpu::Buffer,

    draw_pipeline: wgpu::RenderPipeline,
    frame_bind_group: wgpu::BindGroup,
    frame_uniforms: wgpu::Buffer,
    alpha: f32,

    accum: AccumulationTarget,
    init: ParticleInit,
    paused: bool,
}

impl ComputeTechnique {
    pub fn new(
        gpu: &GpuContext,
        init: ParticleInit,
        field: &ForceField,
        force_buffer: &wgpu::Buffer,
        width: u32,
        height: u32,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, GpuError> {
        if !gpu.supports_compute() {
            return Err(GpuError::UnsupportedExecutionModel("compute shaders"));
        }

        let device = &gpu.device;
        let count = init.count();
        let workgroup_size = device.limits().max_compute_workgroup_size_x.clamp(1, 256);

        let positions = create_state_buffer(
            device,
            "Compute Position Buffer",
            init.position_bytes(),
            wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST,
        );
        let velocities = create_state_buffer(
            device,
            "Compute Velocity Buffer",
            init.velocity_bytes(),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        );

        let step_uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Compute Step Uniform Buffer"),
            contents: bytemuck::bytes_of(&StepUniforms::new(0.0, count)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let step_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Compute Step Bind Group Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, false),
                storage_entry(2, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let step_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Compute Step Bind Group"),
            layout: &step_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: positions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: velocities.as_entire_binding(),
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
        });

        let step_shader_src =
            shaders::compute_step_shader(field.dim(), field.bounds(), workgroup_size);
        let step_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Compute Step Shader"),
            source: wgpu::ShaderSource::Wgsl(step_shader_src.into()),
        });

        let step_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Compute Step Pipeline Layout"),
                bind_group_layouts: &[&step_layout],
                push_constant_ranges: &[],
            });

        let step_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Compute Step Pipeline"),
            layout: Some(&step_pipeline_layout),
            module: &step_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let alpha = point_alpha(count);
        let frame_uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Compute Frame Uniform Buffer"),
            contents: bytemuck::bytes_of(&FrameUniforms::new(Mat4::IDENTITY, alpha)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let frame_layout = uniform_bind_group_layout(
            device,
            "Compute Frame Bind Group Layout",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Compute Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_uniforms.as_entire_binding(),
            }],
        });

        let draw_pipeline = create_point_pipeline(
            device,
            "Compute Point Pipeline",
            &shaders::point_shader_from_buffer(),
            &frame_layout,
            true,
        );

        let accum = AccumulationTarget::new(device, width, height, target_format);

        Ok(Self {
            count,
            workgroup_size,
            positions,
            velocities,
            step_pipeline,
            step_bind_group,
            step_uniforms,
            draw_pipeline,
            frame_bind_group,
            frame_uniforms,
            alpha,
            accum,
            init,
            paused: false,
        })
    }
}

impl ParticleTechnique for ComputeTechnique {
    fn step(&mut self, gpu: &GpuContext, delta: f32) {
        if self.count == 0 {
            return;
        }

        gpu.queue.write_buffer(
            &self.step_uniforms,
            0,
            bytemuck::bytes_of(&StepUniforms::new(delta, self.count)),
        );

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Compute Step Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Compute Step Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.step_pipeline);
            pass.set_bind_group(0, &self.step_bind_group, &[]);
            pass.dispatch_workgroups(self.count.div_ceil(self.workgroup_size), 1, 1);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
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
                label: Some("Compute Draw Encoder"),
            });

        self.accum.begin(&gpu.queue, &mut encoder, delta, self.paused);
        if self.count > 0 {
            let mut pass = self.accum.point_pass(&mut encoder);
            pass.set_pipeline(&self.draw_pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            pass.set_vertex_buffer(0, self.positions.slice(..));
            pass.draw(0..6, 0..self.count);
        }
        self.accum.composite(&mut encoder, target, super::BACKGROUND);

        gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        self.accum.resize(&gpu.device, width, height);
    }

    fn reset(&mut self, gpu: &GpuContext) {
        gpu.queue
            .write_buffer(&self.positions, 0, self.init.position_bytes());
        gpu.queue
            .write_buffer(&self.velocities, 0, self.init.velocity_bytes());
        self.accum.request_clear();
    }

    fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
