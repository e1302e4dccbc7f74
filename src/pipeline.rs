//! The override pipeline: five passes over three shared targets.
//!
//! ```text
//!  slot  pass                 Color  Depth  Normals  clear
//!  0     scene (opaque)         ✓      ✓       ✓      all, black
//!  1     debug quad             ✓      ✓
//!  2     scene (UI overlay)     ✓      ✓
//!  3     statistics HUD         ✓      ✓
//!  4     present                ✓      ✓
//! ```
//!
//! The host calls [`PipelineController::setup`] once per frame, pulls the
//! passes through [`start_iterator`](PipelineController::start_iterator),
//! [`current_mut`](PipelineController::current_mut) and
//! [`advance`](PipelineController::advance), then calls
//! [`cleanup`](PipelineController::cleanup).

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use glam::Vec4;

use crate::config::OverrideConfig;
use crate::error::{OverrideError, Result};
use crate::host::{FrameContext, Renderer};
use crate::passes::{DebugQuadPass, HudPass, PresentPass, RenderPass, ScenePass};
use crate::render_targets::{RenderTargetSet, TargetRole};

/// Number of passes in the pipeline.
pub const PASS_COUNT: usize = 5;

/// Position of each pass in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassSlot {
    Scene = 0,
    DebugQuad = 1,
    SceneUi = 2,
    Hud = 3,
    Present = 4,
}

impl PassSlot {
    pub const ALL: [PassSlot; PASS_COUNT] = [
        PassSlot::Scene,
        PassSlot::DebugQuad,
        PassSlot::SceneUi,
        PassSlot::Hud,
        PassSlot::Present,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Suffix appended to the pipeline name to form the pass name.
    pub fn suffix(self) -> &'static str {
        match self {
            PassSlot::Scene => "Scene",
            PassSlot::DebugQuad => "Quad",
            PassSlot::SceneUi => "Scene_UI",
            PassSlot::Hud => "HUD",
            PassSlot::Present => "Present",
        }
    }
}

/// Which colour channels the debug quad shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

impl ChannelMask {
    pub const fn new(r: bool, g: bool, b: bool, a: bool) -> Self {
        Self { r, g, b, a }
    }

    /// 1.0 for visible channels, 0.0 otherwise.
    pub fn to_vec4(self) -> Vec4 {
        let f = |on: bool| if on { 1.0 } else { 0.0 };
        Vec4::new(f(self.r), f(self.g), f(self.b), f(self.a))
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        Self::new(true, true, true, false)
    }
}

impl From<(bool, bool, bool, bool)> for ChannelMask {
    fn from((r, g, b, a): (bool, bool, bool, bool)) -> Self {
        Self::new(r, g, b, a)
    }
}

impl From<ChannelMask> for (bool, bool, bool, bool) {
    fn from(mask: ChannelMask) -> Self {
        (mask.r, mask.g, mask.b, mask.a)
    }
}

/// The debug view selection, pushed into the debug quad every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugViewState {
    pub active_target: TargetRole,
    pub channels: ChannelMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum IterationState {
    #[default]
    NotStarted,
    Iterating(usize),
    Done,
}

/// Shared handle used by the control surface and the plugin registry.
pub type SharedPipeline = Rc<RefCell<PipelineController>>;

type PassList = [Option<Box<dyn RenderPass>>; PASS_COUNT];

/// Owns the shared targets and the five passes, and drives them per frame.
pub struct PipelineController {
    name: String,
    ui_name: String,
    renderer: Rc<dyn Renderer>,
    config: OverrideConfig,
    passes: Option<PassList>,
    targets: Option<RenderTargetSet>,
    iteration: IterationState,
    debug_view: DebugViewState,
}

impl PipelineController {
    /// Creates the controller and acquires the shared targets.
    ///
    /// Acquisition failure is logged and leaves the controller inert: every
    /// later `setup` reports [`OverrideError::ResourceAcquisition`].
    pub fn new(renderer: Rc<dyn Renderer>, config: OverrideConfig) -> Self {
        if let Some(dir) = config.shader_dir.as_deref() {
            register_shader_dir(renderer.as_ref(), dir);
        }

        let targets = match RenderTargetSet::acquire(renderer.clone()) {
            Ok(set) => Some(set),
            Err(err) => {
                log::error!("{}: {err}", config.name);
                None
            }
        };

        let debug_view = DebugViewState {
            active_target: config.active_target,
            channels: config.channels,
        };

        log::info!("created render override '{}'", config.name);

        Self {
            name: config.name.clone(),
            ui_name: config.ui_name.clone(),
            renderer,
            config,
            passes: None,
            targets,
            iteration: IterationState::NotStarted,
            debug_view,
        }
    }

    pub fn shared(self) -> SharedPipeline {
        Rc::new(RefCell::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ui_name(&self) -> &str {
        &self.ui_name
    }

    /// Prepares the pipeline for one frame rendered into `destination`.
    ///
    /// Resizes the targets to the viewport, builds the passes on first use,
    /// rebinds every pass and pushes the debug view into the quad shader.
    pub fn setup(&mut self, destination: &str, frame: &FrameContext) -> Result<()> {
        if !self.renderer.is_active() {
            return Err(OverrideError::RendererUnavailable);
        }

        let Some(targets) = self.targets.as_mut() else {
            return Err(OverrideError::ResourceAcquisition(format!(
                "'{}' has no render targets",
                self.name
            )));
        };

        let viewport = frame.viewport;
        targets.resize(viewport.width, viewport.height)?;

        let passes = match self.passes.as_mut() {
            Some(passes) => passes,
            None => {
                let built = build_passes(
                    &self.name,
                    &self.ui_name,
                    &self.renderer,
                    &self.config,
                    targets,
                );
                self.passes.insert(built)
            }
        };

        let failed: Vec<usize> = passes
            .iter()
            .enumerate()
            .filter(|(_, pass)| pass.is_none())
            .map(|(i, _)| i)
            .collect();
        if !failed.is_empty() {
            for &slot in &failed {
                log::error!(
                    "{}: pass {} ({}) is missing",
                    self.name,
                    slot,
                    PassSlot::ALL[slot].suffix()
                );
            }
            return Err(OverrideError::PipelineIntegrity { failed });
        }

        for pass in passes.iter_mut().flatten() {
            pass.rebind(targets)?;
            pass.apply_debug_view(targets, &self.debug_view);
        }

        log::trace!(
            "{}: setup for '{destination}' at {}x{}",
            self.name,
            viewport.width,
            viewport.height
        );
        Ok(())
    }

    /// Resets the iterator. Passes and targets are kept for the next frame.
    pub fn cleanup(&mut self) {
        self.iteration = IterationState::NotStarted;
    }

    /// Positions the iterator on the first pass.
    pub fn start_iterator(&mut self) -> bool {
        self.iteration = IterationState::Iterating(0);
        true
    }

    /// The pass under the iterator, or `None` when not iterating.
    pub fn current(&self) -> Option<&(dyn RenderPass + 'static)> {
        match self.iteration {
            IterationState::Iterating(i) => self.pass(i),
            _ => None,
        }
    }

    pub fn current_mut(&mut self) -> Option<&mut (dyn RenderPass + 'static)> {
        match self.iteration {
            IterationState::Iterating(i) => self
                .passes
                .as_mut()
                .and_then(|passes| passes[i].as_deref_mut()),
            _ => None,
        }
    }

    /// Moves to the next pass. Returns `false` once past the last one, and
    /// when the iterator was never started.
    pub fn advance(&mut self) -> bool {
        match self.iteration {
            IterationState::Iterating(i) if i + 1 < PASS_COUNT => {
                self.iteration = IterationState::Iterating(i + 1);
                true
            }
            IterationState::Iterating(_) => {
                self.iteration = IterationState::Done;
                false
            }
            IterationState::NotStarted | IterationState::Done => false,
        }
    }

    /// Pass at `index`, if the passes have been built.
    pub fn pass(&self, index: usize) -> Option<&(dyn RenderPass + 'static)> {
        self.passes
            .as_ref()
            .and_then(|passes| passes.get(index))
            .and_then(|pass| pass.as_deref())
    }

    /// Number of constructed passes.
    pub fn pass_count(&self) -> usize {
        self.passes
            .as_ref()
            .map_or(0, |passes| passes.iter().flatten().count())
    }

    pub fn targets(&self) -> Option<&RenderTargetSet> {
        self.targets.as_ref()
    }

    pub fn debug_view(&self) -> &DebugViewState {
        &self.debug_view
    }

    pub fn active_target(&self) -> TargetRole {
        self.debug_view.active_target
    }

    /// Selects the target shown by the debug quad. Indices outside 0..=2 are
    /// ignored.
    pub fn change_active_target(&mut self, index: u32) {
        match TargetRole::from_index(index) {
            Some(role) => {
                log::debug!("{}: active target -> {}", self.name, role.target_name());
                self.debug_view.active_target = role;
            }
            None => log::debug!("{}: ignoring target index {index}", self.name),
        }
    }

    pub fn set_channel_mask(&mut self, mask: impl Into<ChannelMask>) {
        self.debug_view.channels = mask.into();
    }

    pub fn channel_mask(&self) -> ChannelMask {
        self.debug_view.channels
    }

    /// Evicts every cached pass shader. They recompile on the next `setup`.
    pub fn reset_shader_instances(&mut self) {
        if let Some(passes) = self.passes.as_mut() {
            for pass in passes.iter_mut().flatten() {
                pass.invalidate_shaders();
            }
        }
        log::info!("{}: shader instances reset", self.name);
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.passes = None;
        self.targets = None;
        log::info!("released render override '{}'", self.name);
    }
}

fn register_shader_dir(renderer: &dyn Renderer, dir: &Path) {
    let Some(manager) = renderer.shader_manager() else {
        log::warn!("shader manager unavailable, cannot register {}", dir.display());
        return;
    };
    if manager.shader_paths().iter().any(|p| p == dir) {
        return;
    }
    manager.add_shader_path(dir);
    log::debug!("registered shader path {}", dir.display());
}

fn boxed<P: RenderPass + 'static>(pass: P) -> Box<dyn RenderPass> {
    Box::new(pass)
}

fn build_passes(
    name: &str,
    ui_name: &str,
    renderer: &Rc<dyn Renderer>,
    config: &OverrideConfig,
    targets: &RenderTargetSet,
) -> PassList {
    let title = format!("{ui_name} - {}", renderer.draw_api_name());

    PassSlot::ALL.map(|slot| {
        let pass_name = format!("{name}_{}", slot.suffix());
        let built: Result<Box<dyn RenderPass>> = match slot {
            PassSlot::Scene => ScenePass::opaque(pass_name, targets).map(boxed),
            PassSlot::DebugQuad => DebugQuadPass::new(
                pass_name,
                renderer.clone(),
                &config.debug_shader,
                &config.debug_technique,
                targets,
            )
            .map(boxed),
            PassSlot::SceneUi => ScenePass::ui_overlay(pass_name, targets).map(boxed),
            PassSlot::Hud => HudPass::new(pass_name, title.clone(), targets).map(boxed),
            PassSlot::Present => PresentPass::new(pass_name, targets).map(boxed),
        };
        match built {
            Ok(pass) => Some(pass),
            Err(err) => {
                log::error!("{name}: could not create pass {}: {err}", slot.index());
                None
            }
        }
    })
}
