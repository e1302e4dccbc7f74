use crate::error::Result;
use crate::host::{FrameContext, PassExecutor};
use crate::passes::{RenderPass, TargetBindings};
use crate::render_targets::{RenderTargetSet, TargetRole};

const PRESENT_TARGETS: &[TargetRole] = &[TargetRole::Color, TargetRole::Depth];

/// Hands the colour target to the host for display. Always the last pass.
pub struct PresentPass {
    name: String,
    bindings: TargetBindings,
}

impl PresentPass {
    pub fn new(name: impl Into<String>, targets: &RenderTargetSet) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            bindings: TargetBindings::resolve(PRESENT_TARGETS, targets)?,
        })
    }
}

impl RenderPass for PresentPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn bindings(&self) -> &TargetBindings {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> &mut TargetBindings {
        &mut self.bindings
    }

    fn execute(&mut self, executor: &mut dyn PassExecutor, _frame: &FrameContext) -> Result<()> {
        executor.present(&self.pass_info())
    }
}
