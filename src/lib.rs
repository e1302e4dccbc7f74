//! # View Override
//!
//! **A fixed five-pass viewport render override over three shared targets.**
//!
//! The override renders the scene into Color, Depth and AuxiliaryNormals,
//! inspects any of them through a full-screen debug quad, draws UI items and
//! a statistics overlay, and presents. The opaque scene pass binds three
//! targets while every later pass binds two, which is enough to expose how a
//! host sorts transparent geometry differently for the two cases.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::rc::Rc;
//! use view_override::*;
//! use view_override::headless::{HeadlessRenderer, RecordingExecutor};
//!
//! let renderer = Rc::new(HeadlessRenderer::new());
//! let mut pipeline = PipelineController::new(renderer, OverrideConfig::default());
//! let mut executor = RecordingExecutor::new();
//!
//! pipeline.change_active_target(2);
//! render_frame(&mut pipeline, &mut executor, "viewport", &FrameContext::new(800, 600))?;
//! assert_eq!(executor.passes().len(), 5);
//! # Ok::<(), OverrideError>(())
//! ```
//!
//! ## Hosts
//!
//! - [`headless`] keeps everything in memory and validates shaders with naga.
//! - [`backend`] renders with wgpu into a winit window (see the
//!   `view-override-demo` binary).

pub mod backend;
mod config;
mod control;
mod error;
pub mod headless;
mod host;
mod logging;
pub mod passes;
mod pipeline;
mod plugin;
mod render_targets;
mod shader_cache;
pub mod wgsl;

pub use config::{DemoConfig, OverrideConfig, SHADER_DIR_ENV, default_shader_dir};
pub use control::{COMMAND_NAME, ControlRequest, ControlSurface, parse_command};
pub use error::{OverrideError, Result};
pub use host::{
    FontSize, FrameContext, PassExecutor, RenderTargetManager, Renderer, ShaderId, ShaderManager,
    TargetId, TextAlignment, UiDrawManager, Viewport, ViewportRefresh, render_frame,
};
pub use logging::{LoggingConfig, init_logging};
pub use passes::{ClearMask, ClearPolicy, PassInfo, RenderPass, SceneFilter};
pub use pipeline::{
    ChannelMask, DebugViewState, PASS_COUNT, PassSlot, PipelineController, SharedPipeline,
};
pub use plugin::{PluginHost, PluginRegistry, ViewOverridePlugin};
pub use render_targets::{RasterFormat, RenderTargetDescriptor, RenderTargetSet, TargetRole};
pub use shader_cache::ShaderCache;

// Re-export math types used in the public API
pub use glam::{Vec2, Vec3, Vec4};
