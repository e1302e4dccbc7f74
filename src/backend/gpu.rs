//! Core GPU context and device management.
//!
//! [`GpuContext`] holds the wgpu device, queue and window surface. It is
//! created once from a winit [`Window`] and shared by the managers of the
//! wgpu host.
//!
//! [`Window`]: winit::window::Window

use std::cell::RefCell;
use std::sync::Arc;

use winit::window::Window;

use crate::error::{OverrideError, Result};

/// Core GPU context holding wgpu resources.
///
/// The surface configuration sits behind a `RefCell` so the context can be
/// shared through an `Rc` and still be resized.
pub struct GpuContext {
    /// The surface for presenting rendered frames to the window.
    pub surface: wgpu::Surface<'static>,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    config: RefCell<wgpu::SurfaceConfiguration>,
}

impl GpuContext {
    /// Create a new GPU context from a winit window.
    ///
    /// This performs all wgpu initialization:
    /// 1. Creates a wgpu instance with primary backends (Vulkan, Metal, DX12)
    /// 2. Creates a surface for the window
    /// 3. Requests a suitable GPU adapter
    /// 4. Creates the logical device and command queue
    /// 5. Configures the surface with an sRGB format and Fifo present mode
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| OverrideError::Gpu(format!("no suitable GPU adapter: {e}")))?;

        let adapter_info = adapter.get_info();
        log::info!("using adapter '{}' ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("View Override Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| OverrideError::Gpu("surface reports no formats".into()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            adapter_info,
            config: RefCell::new(config),
        })
    }

    /// Resize the surface to new dimensions.
    ///
    /// Ignores zero-sized dimensions (window minimize).
    pub fn resize(&self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            let mut config = self.config.borrow_mut();
            config.width = width;
            config.height = height;
            self.surface.configure(&self.device, &config);
        }
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.borrow().format
    }

    /// Returns the current surface width in pixels.
    pub fn width(&self) -> u32 {
        self.config.borrow().width
    }

    /// Returns the current surface height in pixels.
    pub fn height(&self) -> u32 {
        self.config.borrow().height
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Reconfigures the surface after it was lost or became outdated.
    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config.borrow());
    }
}
