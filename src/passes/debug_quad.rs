use std::rc::Rc;

use glam::Vec4;

use crate::error::{OverrideError, Result};
use crate::host::{FrameContext, PassExecutor, Renderer, ShaderId, TargetId};
use crate::passes::{RenderPass, TargetBindings};
use crate::pipeline::DebugViewState;
use crate::render_targets::{RenderTargetSet, TargetRole};
use crate::shader_cache::ShaderCache;

/// Texture parameter holding the target being inspected.
pub const SOURCE_TEXTURE_PARAM: &str = "gInputTex";

/// Vec4 parameter holding the channel mask, 1.0 for visible channels.
pub const CHANNELS_PARAM: &str = "gColorChannels";

const QUAD_TARGETS: &[TargetRole] = &[TargetRole::Color, TargetRole::Depth];

/// Shader parameters pushed during the last setup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugShaderParams {
    pub shader: ShaderId,
    pub source: TargetId,
    pub source_role: TargetRole,
    pub channels: Vec4,
}

/// Full-screen quad that shows one of the shared targets with a channel mask.
pub struct DebugQuadPass {
    name: String,
    bindings: TargetBindings,
    cache: ShaderCache,
    applied: Option<DebugShaderParams>,
}

impl DebugQuadPass {
    /// # Errors
    ///
    /// Fails when the host has no shader manager, since the pass could never
    /// draw.
    pub fn new(
        name: impl Into<String>,
        renderer: Rc<dyn Renderer>,
        shader_file: &str,
        technique: &str,
        targets: &RenderTargetSet,
    ) -> Result<Self> {
        if renderer.shader_manager().is_none() {
            return Err(OverrideError::ResourceAcquisition(
                "shader manager is unavailable".into(),
            ));
        }

        Ok(Self {
            name: name.into(),
            bindings: TargetBindings::resolve(QUAD_TARGETS, targets)?,
            cache: ShaderCache::new(renderer, shader_file, technique),
            applied: None,
        })
    }

    /// Compiled shader, if the last compile succeeded.
    pub fn shader(&self) -> Option<ShaderId> {
        self.cache.cached()
    }

    pub fn applied_params(&self) -> Option<&DebugShaderParams> {
        self.applied.as_ref()
    }
}

impl RenderPass for DebugQuadPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn bindings(&self) -> &TargetBindings {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> &mut TargetBindings {
        &mut self.bindings
    }

    fn shader_params(&self) -> Option<DebugShaderParams> {
        self.applied
    }

    fn apply_debug_view(&mut self, targets: &RenderTargetSet, view: &DebugViewState) {
        self.applied = None;

        // Logged inside the cache.
        let Ok(shader) = self.cache.get_or_compile() else {
            return;
        };

        let role = view.active_target;
        let Some(source) = targets.target(role) else {
            log::warn!("debug source '{}' is not live", role.target_name());
            return;
        };

        let channels = view.channels.to_vec4();
        let Some(manager) = self.cache.renderer().shader_manager() else {
            return;
        };
        manager.set_texture_parameter(shader, SOURCE_TEXTURE_PARAM, source);
        manager.set_vec4_parameter(shader, CHANNELS_PARAM, channels);

        self.applied = Some(DebugShaderParams {
            shader,
            source,
            source_role: role,
            channels,
        });
    }

    fn invalidate_shaders(&mut self) {
        self.cache.invalidate();
        self.applied = None;
    }

    fn execute(&mut self, executor: &mut dyn PassExecutor, _frame: &FrameContext) -> Result<()> {
        match self.applied {
            Some(params) => executor.render_quad(&self.pass_info(), params.shader),
            None => {
                log::debug!("{}: no shader, skipping draw", self.name);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{ExecutedPass, HeadlessRenderer, RecordingExecutor};
    use crate::pipeline::ChannelMask;

    const QUAD: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(f32(i), 0.0, 0.0, 1.0);
}

@fragment
fn debug() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;

    fn setup(source: &str) -> (Rc<HeadlessRenderer>, RenderTargetSet, DebugQuadPass) {
        let renderer = Rc::new(HeadlessRenderer::new());
        renderer
            .shader_manager_impl()
            .unwrap()
            .insert_source("quadDebug", source);
        let set = RenderTargetSet::acquire(renderer.clone()).unwrap();
        let pass =
            DebugQuadPass::new("quad", renderer.clone(), "quadDebug", "debug", &set).unwrap();
        (renderer, set, pass)
    }

    #[test]
    fn pushes_selected_target_and_mask() {
        let (renderer, set, mut pass) = setup(QUAD);
        let view = DebugViewState {
            active_target: TargetRole::AuxiliaryNormals,
            channels: ChannelMask::new(true, false, true, false),
        };

        pass.apply_debug_view(&set, &view);

        let shader = pass.shader().unwrap();
        let params = renderer.shader_manager_impl().unwrap().parameters(shader);
        assert_eq!(
            params.texture(SOURCE_TEXTURE_PARAM),
            set.target(TargetRole::AuxiliaryNormals)
        );
        assert_eq!(
            params.vec4(CHANNELS_PARAM),
            Some(Vec4::new(1.0, 0.0, 1.0, 0.0))
        );
    }

    #[test]
    fn broken_shader_skips_parameters_and_draw() {
        let (_renderer, set, mut pass) = setup("not wgsl at all");
        let mut executor = RecordingExecutor::new();

        pass.apply_debug_view(&set, &DebugViewState::default());
        pass.execute(&mut executor, &FrameContext::new(8, 8)).unwrap();

        assert_eq!(pass.shader(), None);
        assert!(pass.applied_params().is_none());
        assert!(executor.passes().is_empty());
    }

    #[test]
    fn draws_with_compiled_shader() {
        let (_renderer, set, mut pass) = setup(QUAD);
        let mut executor = RecordingExecutor::new();

        pass.apply_debug_view(&set, &DebugViewState::default());
        pass.execute(&mut executor, &FrameContext::new(8, 8)).unwrap();

        assert!(matches!(executor.passes(), [ExecutedPass::Quad { .. }]));
    }

    #[test]
    fn invalidate_clears_instance() {
        let (renderer, set, mut pass) = setup(QUAD);
        pass.apply_debug_view(&set, &DebugViewState::default());

        pass.invalidate_shaders();

        assert_eq!(pass.shader(), None);
        assert!(!renderer.shader_manager_impl().unwrap().is_cached("quadDebug", "debug"));
    }

    #[test]
    fn requires_shader_manager() {
        let renderer = Rc::new(HeadlessRenderer::new().without_shader_manager());
        let set = RenderTargetSet::acquire(renderer.clone()).unwrap();

        let result = DebugQuadPass::new("quad", renderer, "quadDebug", "debug", &set);

        assert!(result.is_err());
    }
}
