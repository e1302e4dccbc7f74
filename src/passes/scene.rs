use glam::Vec4;

use crate::error::Result;
use crate::host::{FrameContext, PassExecutor};
use crate::passes::{ClearPolicy, RenderPass, SceneFilter, TargetBindings};
use crate::render_targets::{RenderTargetSet, TargetRole};

const OPAQUE_TARGETS: &[TargetRole] = &[
    TargetRole::Color,
    TargetRole::Depth,
    TargetRole::AuxiliaryNormals,
];

const OVERLAY_TARGETS: &[TargetRole] = &[TargetRole::Color, TargetRole::Depth];

/// Draws scene items into the shared targets.
///
/// The opaque variant binds all three targets; the UI overlay variant only
/// binds colour and depth. Transparency sorting differs between the two.
pub struct ScenePass {
    name: String,
    bindings: TargetBindings,
    clear: ClearPolicy,
    filter: SceneFilter,
}

impl ScenePass {
    /// Shaded geometry into Color, Depth and AuxiliaryNormals, cleared to black.
    pub fn opaque(name: impl Into<String>, targets: &RenderTargetSet) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            bindings: TargetBindings::resolve(OPAQUE_TARGETS, targets)?,
            clear: ClearPolicy::all(Vec4::ZERO),
            filter: SceneFilter::ShadedItems,
        })
    }

    /// UI items over the existing Color and Depth contents.
    pub fn ui_overlay(name: impl Into<String>, targets: &RenderTargetSet) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            bindings: TargetBindings::resolve(OVERLAY_TARGETS, targets)?,
            clear: ClearPolicy::NONE,
            filter: SceneFilter::UiItems,
        })
    }
}

impl RenderPass for ScenePass {
    fn name(&self) -> &str {
        &self.name
    }

    fn bindings(&self) -> &TargetBindings {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> &mut TargetBindings {
        &mut self.bindings
    }

    fn clear_policy(&self) -> ClearPolicy {
        self.clear
    }

    fn scene_filter(&self) -> Option<SceneFilter> {
        Some(self.filter)
    }

    fn execute(&mut self, executor: &mut dyn PassExecutor, _frame: &FrameContext) -> Result<()> {
        executor.render_scene(&self.pass_info(), self.filter)
    }
}
