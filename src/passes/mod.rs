//! The render passes that make up the override pipeline.
//!
//! Every pass binds an ordered subset of the shared targets and tells the
//! host how to clear them. The controller never inspects concrete pass
//! types; everything it needs goes through [`RenderPass`].

mod debug_quad;
mod hud;
mod present;
mod scene;

pub use debug_quad::{CHANNELS_PARAM, DebugQuadPass, DebugShaderParams, SOURCE_TEXTURE_PARAM};
pub use hud::{FrameStats, HudPass};
pub use present::PresentPass;
pub use scene::ScenePass;

use bitflags::bitflags;
use glam::Vec4;

use crate::error::{OverrideError, Result};
use crate::host::{FrameContext, PassExecutor, TargetId};
use crate::pipeline::DebugViewState;
use crate::render_targets::{RenderTargetSet, TargetRole};

bitflags! {
    /// Which attachments a pass clears before drawing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearMask: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
        const ALL = Self::COLOR.bits() | Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

/// Clear mask plus the colour written to cleared colour attachments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearPolicy {
    pub mask: ClearMask,
    pub color: Vec4,
}

impl ClearPolicy {
    /// Load everything, clear nothing.
    pub const NONE: Self = Self {
        mask: ClearMask::empty(),
        color: Vec4::ZERO,
    };

    pub fn all(color: Vec4) -> Self {
        Self {
            mask: ClearMask::ALL,
            color,
        }
    }

    pub fn clears(&self, mask: ClearMask) -> bool {
        self.mask.contains(mask)
    }
}

impl Default for ClearPolicy {
    fn default() -> Self {
        Self::NONE
    }
}

/// Which scene items a scene pass draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFilter {
    /// Regular shaded geometry.
    ShadedItems,
    /// Manipulators, grids and other UI items.
    UiItems,
}

/// Target handles resolved for one pass, in binding order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetBindings {
    roles: &'static [TargetRole],
    targets: Vec<TargetId>,
}

impl TargetBindings {
    /// Looks up each of `roles` in `set`.
    pub fn resolve(roles: &'static [TargetRole], set: &RenderTargetSet) -> Result<Self> {
        let mut bindings = Self {
            roles,
            targets: Vec::with_capacity(roles.len()),
        };
        bindings.rebind(set)?;
        Ok(bindings)
    }

    /// Re-resolves the handles against `set`, keeping the same roles.
    pub fn rebind(&mut self, set: &RenderTargetSet) -> Result<()> {
        self.targets.clear();
        for &role in self.roles {
            let target = set.target(role).ok_or_else(|| {
                OverrideError::ResourceAcquisition(format!(
                    "target '{}' is not live",
                    role.target_name()
                ))
            })?;
            self.targets.push(target);
        }
        Ok(())
    }

    pub fn targets(&self) -> &[TargetId] {
        &self.targets
    }

    /// Handle bound for `role`, if the pass binds it.
    pub fn target(&self, role: TargetRole) -> Option<TargetId> {
        self.roles
            .iter()
            .position(|&r| r == role)
            .and_then(|i| self.targets.get(i).copied())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Everything the host needs to set up attachments for a pass.
#[derive(Debug, Clone, Copy)]
pub struct PassInfo<'a> {
    pub name: &'a str,
    pub bindings: &'a TargetBindings,
    pub clear: ClearPolicy,
}

impl PassInfo<'_> {
    pub fn targets(&self) -> &[TargetId] {
        self.bindings.targets()
    }

    pub fn target(&self, role: TargetRole) -> Option<TargetId> {
        self.bindings.target(role)
    }
}

/// A stage of the override pipeline.
///
/// Passes are built once per controller, rebound to the shared targets
/// every frame, and executed by the host through [`execute`](Self::execute).
pub trait RenderPass {
    fn name(&self) -> &str;

    fn bindings(&self) -> &TargetBindings;

    fn bindings_mut(&mut self) -> &mut TargetBindings;

    /// Handles of the targets this pass binds, in binding order.
    fn target_bindings(&self) -> &[TargetId] {
        self.bindings().targets()
    }

    fn rebind(&mut self, set: &RenderTargetSet) -> Result<()> {
        self.bindings_mut().rebind(set)
    }

    fn clear_policy(&self) -> ClearPolicy {
        ClearPolicy::NONE
    }

    /// The scene items drawn by this pass. `None` for non-scene passes.
    fn scene_filter(&self) -> Option<SceneFilter> {
        None
    }

    /// Shader parameters pushed by the last setup. `None` for passes without
    /// an effect shader.
    fn shader_params(&self) -> Option<DebugShaderParams> {
        None
    }

    /// Pushes the debug view selection into the pass's shader parameters.
    fn apply_debug_view(&mut self, _targets: &RenderTargetSet, _view: &DebugViewState) {}

    /// Drops any cached shader instance so the next frame recompiles it.
    fn invalidate_shaders(&mut self) {}

    fn pass_info(&self) -> PassInfo<'_> {
        PassInfo {
            name: self.name(),
            bindings: self.bindings(),
            clear: self.clear_policy(),
        }
    }

    /// Records the pass's work with `executor`.
    fn execute(&mut self, executor: &mut dyn PassExecutor, frame: &FrameContext) -> Result<()>;
}
