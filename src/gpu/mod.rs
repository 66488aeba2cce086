//! GPU device acquisition and capability queries.

pub(crate) mod accum;

use crate::error::GpuError;

/// Handle to the GPU device, queue, and adapter.
///
/// The host framework creates one context and hands it to the particle
/// system; the context outlives every technique built on it.
pub struct GpuContext {
    adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Acquire a device, optionally compatible with a presentation surface.
    ///
    /// Opts into vertex-stage storage writes when the adapter offers them;
    /// the stream technique is gated on that feature.
    pub async fn new(
        instance: &wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;

        let mut required_features = wgpu::Features::empty();
        if adapter
            .features()
            .contains(wgpu::Features::VERTEX_WRITABLE_STORAGE)
        {
            required_features |= wgpu::Features::VERTEX_WRITABLE_STORAGE;
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }

    /// Blocking headless acquisition, for hosts without a window.
    pub fn request_headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        pollster::block_on(Self::new(&instance, None))
    }

    /// The adapter this context was built on.
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Whether the compute execution model is available.
    pub fn supports_compute(&self) -> bool {
        self.adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
    }

    /// Whether the streaming (vertex-pipeline capture) execution model is
    /// available.
    pub fn supports_vertex_writable_storage(&self) -> bool {
        self.device
            .features()
            .contains(wgpu::Features::VERTEX_WRITABLE_STORAGE)
    }
}
