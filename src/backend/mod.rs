//! The wgpu host.
//!
//! [`WgpuRenderer`] implements the host interfaces on top of a window
//! surface: render targets are wgpu textures, effect shaders are WGSL files
//! compiled into full-screen quad pipelines, and each frame is recorded into
//! one command encoder by [`WgpuFrame`].
//!
//! # Example
//!
//! ```no_run
//! # use std::{rc::Rc, sync::Arc};
//! # use view_override::backend::WgpuRenderer;
//! # use view_override::{FrameContext, OverrideConfig, PipelineController, render_frame};
//! # fn run(window: Arc<winit::window::Window>) -> view_override::Result<()> {
//! let renderer = Rc::new(WgpuRenderer::new(window)?);
//! let mut pipeline = PipelineController::new(renderer.clone(), OverrideConfig::default());
//!
//! let mut frame = renderer.begin_frame()?;
//! render_frame(&mut pipeline, &mut frame, "window", &FrameContext::new(800, 600))?;
//! let overlay_text = frame.finish();
//! # Ok(())
//! # }
//! ```

mod frame;
mod gpu;
mod pipelines;
mod shaders;
mod targets;

pub use frame::WgpuFrame;
pub use gpu::GpuContext;
pub use pipelines::HostPipelines;
pub use shaders::{QuadUniforms, WgpuShaderManager};
pub use targets::WgpuTargetManager;

use std::cell::Cell;
use std::sync::Arc;

use winit::window::Window;

use crate::error::Result;
use crate::host::{RenderTargetManager, Renderer, ShaderManager};

/// Host renderer backed by wgpu.
pub struct WgpuRenderer {
    gpu: GpuContext,
    targets: WgpuTargetManager,
    shaders: WgpuShaderManager,
    pipelines: HostPipelines,
    active: Cell<bool>,
}

impl WgpuRenderer {
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let gpu = GpuContext::new(window)?;
        let targets = WgpuTargetManager::new(gpu.device.clone());
        let shaders = WgpuShaderManager::new(gpu.device.clone(), gpu.queue.clone());
        let pipelines = HostPipelines::new(&gpu);

        Ok(Self {
            gpu,
            targets,
            shaders,
            pipelines,
            active: Cell::new(true),
        })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn targets(&self) -> &WgpuTargetManager {
        &self.targets
    }

    pub fn shaders(&self) -> &WgpuShaderManager {
        &self.shaders
    }

    pub fn pipelines(&self) -> &HostPipelines {
        &self.pipelines
    }

    /// Resizes the surface. A zero-sized window deactivates rendering until
    /// it is restored.
    pub fn resize(&self, width: u32, height: u32) {
        self.active.set(width > 0 && height > 0);
        self.gpu.resize(width, height);
    }

    /// Acquires the next surface texture and starts recording.
    pub fn begin_frame(&self) -> Result<WgpuFrame<'_>> {
        WgpuFrame::new(self)
    }
}

impl Renderer for WgpuRenderer {
    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn render_target_manager(&self) -> Option<&dyn RenderTargetManager> {
        Some(&self.targets)
    }

    fn shader_manager(&self) -> Option<&dyn ShaderManager> {
        Some(&self.shaders)
    }

    fn draw_api_name(&self) -> String {
        format!("{:?}", self.gpu.adapter_info().backend)
    }
}
