//! Interfaces the host application provides to the override.
//!
//! The pipeline never talks to a GPU API directly. Render targets, shaders,
//! 2D text and pass execution all go through the traits in this module, so
//! the same controller runs against the wgpu host in [`crate::backend`] and
//! the in-memory host in [`crate::headless`].
//!
//! # Frame protocol
//!
//! ```text
//! setup(destination, frame) ─▶ start_iterator() ─▶ current() / execute ─▶ advance() ─┐
//!                                     ▲                                               │
//!                                     └──────────────── while advance() ──────────────┘
//!                                                     cleanup()
//! ```
//!
//! [`render_frame`] is the reference implementation of that loop.

use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3, Vec4};

use crate::error::Result;
use crate::passes::{PassInfo, SceneFilter};
use crate::pipeline::PipelineController;
use crate::render_targets::RenderTargetDescriptor;

/// Opaque handle to a render target owned by the host's target manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub usize);

/// Opaque handle to a compiled shader instance owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub usize);

/// Viewport rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Per-frame information the host hands to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameContext {
    pub viewport: Viewport,
}

impl FrameContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Viewport::new(width, height),
        }
    }
}

/// The host's real-time renderer.
///
/// Managers are optional: a host that is still starting up (or shutting
/// down) may not be able to hand them out.
pub trait Renderer {
    /// Whether the rendering subsystem can render a frame right now.
    fn is_active(&self) -> bool;

    fn render_target_manager(&self) -> Option<&dyn RenderTargetManager>;

    fn shader_manager(&self) -> Option<&dyn ShaderManager>;

    /// Human readable name of the active draw API (e.g. "Vulkan").
    fn draw_api_name(&self) -> String;
}

/// Allocates GPU surfaces on behalf of the pipeline.
pub trait RenderTargetManager {
    /// Creates a target matching `descriptor`, or `None` if the host refuses.
    fn acquire_render_target(&self, descriptor: &RenderTargetDescriptor) -> Option<TargetId>;

    /// Reapplies `descriptor` to a live target. Returns `false` for unknown targets.
    fn update_description(&self, target: TargetId, descriptor: &RenderTargetDescriptor) -> bool;

    fn release_render_target(&self, target: TargetId);
}

/// Compiles and caches effect shaders, and stores their parameters.
///
/// The host cache is keyed by `(file, technique)`. Parameters live on the
/// shader instance and are read by the host when the pass executes.
pub trait ShaderManager {
    fn shader_paths(&self) -> Vec<PathBuf>;

    fn add_shader_path(&self, path: &Path);

    /// Returns the cached instance for `(file, technique)`, compiling it first
    /// if needed. The error string is the compiler's diagnostic.
    fn effect_shader(&self, file: &str, technique: &str) -> std::result::Result<ShaderId, String>;

    fn remove_effect_from_cache(&self, file: &str, technique: &str);

    /// Whether `shader` is still in the host cache. Another pipeline sharing
    /// the renderer may have evicted it.
    fn is_effect_live(&self, shader: ShaderId) -> bool;

    fn set_texture_parameter(&self, shader: ShaderId, name: &str, target: TargetId);

    fn set_vec4_parameter(&self, shader: ShaderId, name: &str, value: Vec4);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontSize {
    Small,
    #[default]
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlignment {
    #[default]
    Left,
    Center,
    Right,
}

/// 2D drawing commands for overlay passes.
pub trait UiDrawManager {
    fn begin_drawable(&mut self);

    fn set_color(&mut self, color: Vec3);

    fn set_font_size(&mut self, size: FontSize);

    /// Draws `text` anchored at `position` (pixels, origin bottom-left).
    fn text(&mut self, position: Vec2, text: &str, alignment: TextAlignment);

    fn end_drawable(&mut self);
}

/// Executes passes on behalf of the host.
///
/// Each pass calls the one method matching its kind, so the host never has
/// to inspect concrete pass types.
pub trait PassExecutor {
    fn render_scene(&mut self, pass: &PassInfo<'_>, filter: SceneFilter) -> Result<()>;

    fn render_quad(&mut self, pass: &PassInfo<'_>, shader: ShaderId) -> Result<()>;

    fn render_ui(
        &mut self,
        pass: &PassInfo<'_>,
        draw: &mut dyn FnMut(&mut dyn UiDrawManager),
    ) -> Result<()>;

    fn present(&mut self, pass: &PassInfo<'_>) -> Result<()>;
}

/// Lets the control surface request a redraw of every viewport.
pub trait ViewportRefresh {
    fn schedule_refresh_all(&self);
}

/// Runs one full frame: `setup`, pull iteration with execution, `cleanup`.
///
/// A failed `setup` aborts the frame before any pass runs. An execution
/// error stops iteration, but `cleanup` still runs so the next frame starts
/// from a clean iterator.
pub fn render_frame(
    pipeline: &mut PipelineController,
    executor: &mut dyn PassExecutor,
    destination: &str,
    frame: &FrameContext,
) -> Result<()> {
    pipeline.setup(destination, frame)?;

    let mut result = Ok(());
    if pipeline.start_iterator() {
        loop {
            if let Some(pass) = pipeline.current_mut() {
                if let Err(err) = pass.execute(executor, frame) {
                    log::error!("pass '{}' failed: {err}", pass.name());
                    result = Err(err);
                    break;
                }
            }
            if !pipeline.advance() {
                break;
            }
        }
    }

    pipeline.cleanup();
    result
}
