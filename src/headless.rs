//! An in-memory host for running the pipeline without a GPU.
//!
//! The headless host keeps render target descriptors in a table, compiles
//! effect shaders by validating them with naga, and records what every pass
//! asked for. Tests drive whole frames against it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3, Vec4};

use crate::error::Result;
use crate::host::{
    FontSize, PassExecutor, RenderTargetManager, Renderer, ShaderId, ShaderManager, TargetId,
    TextAlignment, UiDrawManager, ViewportRefresh,
};
use crate::passes::{ClearPolicy, PassInfo, SceneFilter};
use crate::render_targets::RenderTargetDescriptor;
use crate::wgsl;

/// A renderer with optional in-memory managers.
pub struct HeadlessRenderer {
    active: Cell<bool>,
    targets: Option<HeadlessTargetManager>,
    shaders: Option<HeadlessShaderManager>,
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self {
            active: Cell::new(true),
            targets: Some(HeadlessTargetManager::default()),
            shaders: Some(HeadlessShaderManager::default()),
        }
    }

    pub fn inactive(self) -> Self {
        self.active.set(false);
        self
    }

    pub fn without_target_manager(mut self) -> Self {
        self.targets = None;
        self
    }

    pub fn without_shader_manager(mut self) -> Self {
        self.shaders = None;
        self
    }

    /// Refuses target acquisitions once `limit` targets are live.
    pub fn with_target_limit(mut self, limit: usize) -> Self {
        if let Some(targets) = self.targets.as_mut() {
            targets.limit = Some(limit);
        }
        self
    }

    pub fn set_active(&self, active: bool) {
        self.active.set(active);
    }

    pub fn target_manager(&self) -> Option<&HeadlessTargetManager> {
        self.targets.as_ref()
    }

    pub fn shader_manager_impl(&self) -> Option<&HeadlessShaderManager> {
        self.shaders.as_ref()
    }
}

impl Renderer for HeadlessRenderer {
    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn render_target_manager(&self) -> Option<&dyn RenderTargetManager> {
        self.targets.as_ref().map(|t| t as &dyn RenderTargetManager)
    }

    fn shader_manager(&self) -> Option<&dyn ShaderManager> {
        self.shaders.as_ref().map(|s| s as &dyn ShaderManager)
    }

    fn draw_api_name(&self) -> String {
        "Headless".to_string()
    }
}

// ============================================================================
// Render targets
// ============================================================================

/// Tracks live targets and their descriptors.
#[derive(Default)]
pub struct HeadlessTargetManager {
    slots: RefCell<Vec<Option<RenderTargetDescriptor>>>,
    limit: Option<usize>,
    updates: Cell<usize>,
    releases: Cell<usize>,
}

impl HeadlessTargetManager {
    pub fn live_count(&self) -> usize {
        self.slots.borrow().iter().flatten().count()
    }

    pub fn descriptor(&self, target: TargetId) -> Option<RenderTargetDescriptor> {
        self.slots.borrow().get(target.0).cloned().flatten()
    }

    /// Number of successful `update_description` calls.
    pub fn update_count(&self) -> usize {
        self.updates.get()
    }

    pub fn release_count(&self) -> usize {
        self.releases.get()
    }
}

impl RenderTargetManager for HeadlessTargetManager {
    fn acquire_render_target(&self, descriptor: &RenderTargetDescriptor) -> Option<TargetId> {
        if self.limit.is_some_and(|limit| self.live_count() >= limit) {
            return None;
        }
        let mut slots = self.slots.borrow_mut();
        slots.push(Some(descriptor.clone()));
        Some(TargetId(slots.len() - 1))
    }

    fn update_description(&self, target: TargetId, descriptor: &RenderTargetDescriptor) -> bool {
        match self.slots.borrow_mut().get_mut(target.0) {
            Some(Some(slot)) => {
                *slot = descriptor.clone();
                self.updates.set(self.updates.get() + 1);
                true
            }
            _ => false,
        }
    }

    fn release_render_target(&self, target: TargetId) {
        if let Some(slot) = self.slots.borrow_mut().get_mut(target.0) {
            if slot.take().is_some() {
                self.releases.set(self.releases.get() + 1);
            }
        }
    }
}

// ============================================================================
// Shaders
// ============================================================================

/// Parameter values set on one shader instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderParameters {
    textures: HashMap<String, TargetId>,
    vectors: HashMap<String, Vec4>,
}

impl ShaderParameters {
    pub fn texture(&self, name: &str) -> Option<TargetId> {
        self.textures.get(name).copied()
    }

    pub fn vec4(&self, name: &str) -> Option<Vec4> {
        self.vectors.get(name).copied()
    }
}

/// Compiles effect shaders by validating their WGSL with naga.
///
/// Sources registered with [`insert_source`](Self::insert_source) take
/// precedence over `<path>/<file>.wgsl` on disk.
#[derive(Default)]
pub struct HeadlessShaderManager {
    paths: RefCell<Vec<PathBuf>>,
    sources: RefCell<HashMap<String, String>>,
    cache: RefCell<HashMap<(String, String), ShaderId>>,
    parameters: RefCell<HashMap<ShaderId, ShaderParameters>>,
    next_id: Cell<usize>,
    compiles: Cell<usize>,
}

impl HeadlessShaderManager {
    pub fn insert_source(&self, file: &str, source: &str) {
        self.sources
            .borrow_mut()
            .insert(file.to_string(), source.to_string());
    }

    /// Number of compiles that reached the validator.
    pub fn compile_count(&self) -> usize {
        self.compiles.get()
    }

    pub fn is_cached(&self, file: &str, technique: &str) -> bool {
        self.cache
            .borrow()
            .contains_key(&(file.to_string(), technique.to_string()))
    }

    pub fn parameters(&self, shader: ShaderId) -> ShaderParameters {
        self.parameters
            .borrow()
            .get(&shader)
            .cloned()
            .unwrap_or_default()
    }

    fn load_source(&self, file: &str) -> std::result::Result<String, String> {
        if let Some(source) = self.sources.borrow().get(file) {
            return Ok(source.clone());
        }
        let file_name = format!("{file}.wgsl");
        for dir in self.paths.borrow().iter() {
            let path = dir.join(&file_name);
            if path.is_file() {
                return fs::read_to_string(&path).map_err(|e| format!("{}: {e}", path.display()));
            }
        }
        Err(format!("effect file '{file_name}' not found in shader paths"))
    }
}

impl ShaderManager for HeadlessShaderManager {
    fn shader_paths(&self) -> Vec<PathBuf> {
        self.paths.borrow().clone()
    }

    fn add_shader_path(&self, path: &Path) {
        self.paths.borrow_mut().push(path.to_path_buf());
    }

    fn effect_shader(&self, file: &str, technique: &str) -> std::result::Result<ShaderId, String> {
        let key = (file.to_string(), technique.to_string());
        if let Some(&id) = self.cache.borrow().get(&key) {
            return Ok(id);
        }

        let source = self.load_source(file)?;
        self.compiles.set(self.compiles.get() + 1);
        wgsl::validate_technique(&source, technique)?;

        let id = ShaderId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.cache.borrow_mut().insert(key, id);
        self.parameters
            .borrow_mut()
            .insert(id, ShaderParameters::default());
        Ok(id)
    }

    fn remove_effect_from_cache(&self, file: &str, technique: &str) {
        let key = (file.to_string(), technique.to_string());
        if let Some(id) = self.cache.borrow_mut().remove(&key) {
            self.parameters.borrow_mut().remove(&id);
        }
    }

    fn is_effect_live(&self, shader: ShaderId) -> bool {
        self.parameters.borrow().contains_key(&shader)
    }

    fn set_texture_parameter(&self, shader: ShaderId, name: &str, target: TargetId) {
        if let Some(params) = self.parameters.borrow_mut().get_mut(&shader) {
            params.textures.insert(name.to_string(), target);
        }
    }

    fn set_vec4_parameter(&self, shader: ShaderId, name: &str, value: Vec4) {
        if let Some(params) = self.parameters.borrow_mut().get_mut(&shader) {
            params.vectors.insert(name.to_string(), value);
        }
    }
}

// ============================================================================
// Pass execution
// ============================================================================

/// One text draw recorded by an overlay pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnText {
    pub text: String,
    pub position: Vec2,
    pub color: Vec3,
    pub font_size: FontSize,
    pub alignment: TextAlignment,
}

/// A pass as seen by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutedPass {
    Scene {
        name: String,
        filter: SceneFilter,
        targets: Vec<TargetId>,
        clear: ClearPolicy,
    },
    Quad {
        name: String,
        shader: ShaderId,
        targets: Vec<TargetId>,
    },
    Ui {
        name: String,
        targets: Vec<TargetId>,
        text: Vec<DrawnText>,
    },
    Present {
        name: String,
        targets: Vec<TargetId>,
    },
}

impl ExecutedPass {
    pub fn name(&self) -> &str {
        match self {
            ExecutedPass::Scene { name, .. }
            | ExecutedPass::Quad { name, .. }
            | ExecutedPass::Ui { name, .. }
            | ExecutedPass::Present { name, .. } => name,
        }
    }

    pub fn targets(&self) -> &[TargetId] {
        match self {
            ExecutedPass::Scene { targets, .. }
            | ExecutedPass::Quad { targets, .. }
            | ExecutedPass::Ui { targets, .. }
            | ExecutedPass::Present { targets, .. } => targets,
        }
    }
}

#[derive(Default)]
struct TextRecorder {
    color: Vec3,
    font_size: FontSize,
    open: bool,
    text: Vec<DrawnText>,
}

impl UiDrawManager for TextRecorder {
    fn begin_drawable(&mut self) {
        self.open = true;
    }

    fn set_color(&mut self, color: Vec3) {
        self.color = color;
    }

    fn set_font_size(&mut self, size: FontSize) {
        self.font_size = size;
    }

    fn text(&mut self, position: Vec2, text: &str, alignment: TextAlignment) {
        if !self.open {
            log::warn!("text drawn outside begin_drawable/end_drawable");
        }
        self.text.push(DrawnText {
            text: text.to_string(),
            position,
            color: self.color,
            font_size: self.font_size,
            alignment,
        });
    }

    fn end_drawable(&mut self) {
        self.open = false;
    }
}

/// Records every pass it is asked to execute.
#[derive(Default)]
pub struct RecordingExecutor {
    passes: Vec<ExecutedPass>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn passes(&self) -> &[ExecutedPass] {
        &self.passes
    }

    /// Returns the recorded passes and starts a new recording.
    pub fn take(&mut self) -> Vec<ExecutedPass> {
        std::mem::take(&mut self.passes)
    }
}

impl PassExecutor for RecordingExecutor {
    fn render_scene(&mut self, pass: &PassInfo<'_>, filter: SceneFilter) -> Result<()> {
        self.passes.push(ExecutedPass::Scene {
            name: pass.name.to_string(),
            filter,
            targets: pass.targets().to_vec(),
            clear: pass.clear,
        });
        Ok(())
    }

    fn render_quad(&mut self, pass: &PassInfo<'_>, shader: ShaderId) -> Result<()> {
        self.passes.push(ExecutedPass::Quad {
            name: pass.name.to_string(),
            shader,
            targets: pass.targets().to_vec(),
        });
        Ok(())
    }

    fn render_ui(
        &mut self,
        pass: &PassInfo<'_>,
        draw: &mut dyn FnMut(&mut dyn UiDrawManager),
    ) -> Result<()> {
        let mut recorder = TextRecorder::default();
        draw(&mut recorder);
        self.passes.push(ExecutedPass::Ui {
            name: pass.name.to_string(),
            targets: pass.targets().to_vec(),
            text: recorder.text,
        });
        Ok(())
    }

    fn present(&mut self, pass: &PassInfo<'_>) -> Result<()> {
        self.passes.push(ExecutedPass::Present {
            name: pass.name.to_string(),
            targets: pass.targets().to_vec(),
        });
        Ok(())
    }
}

/// Counts redraw requests from the control surface.
#[derive(Debug, Default)]
pub struct CountingRefresh {
    count: Cell<usize>,
}

impl CountingRefresh {
    pub fn count(&self) -> usize {
        self.count.get()
    }
}

impl ViewportRefresh for CountingRefresh {
    fn schedule_refresh_all(&self) {
        self.count.set(self.count.get() + 1);
    }
}
