//! Pipeline Integration Tests
//!
//! Tests for:
//! - Full frames against the headless host: pass order, bindings, clears
//! - Setup failures: inactive renderer, missing managers, broken shaders
//! - Debug view routing through the control surface
//! - Plugin activation and deactivation

use std::rc::Rc;

use glam::Vec4;
use view_override::headless::{CountingRefresh, ExecutedPass, HeadlessRenderer, RecordingExecutor};
use view_override::passes::{CHANNELS_PARAM, SOURCE_TEXTURE_PARAM};
use view_override::{
    COMMAND_NAME, ClearMask, FrameContext, OverrideConfig, OverrideError, PASS_COUNT,
    PipelineController, PluginHost, RenderPass, Renderer, SceneFilter, TargetRole,
    ViewOverridePlugin, render_frame,
};

fn new_pipeline(renderer: &Rc<HeadlessRenderer>) -> PipelineController {
    PipelineController::new(renderer.clone(), OverrideConfig::default())
}

fn run_frame(
    pipeline: &mut PipelineController,
    width: u32,
    height: u32,
) -> view_override::Result<Vec<ExecutedPass>> {
    let mut executor = RecordingExecutor::new();
    render_frame(pipeline, &mut executor, "viewport", &FrameContext::new(width, height))?;
    Ok(executor.take())
}

// ============================================================================
// Full Frames
// ============================================================================

#[test]
fn frame_runs_five_passes_in_order() {
    let renderer = Rc::new(HeadlessRenderer::new());
    let mut pipeline = new_pipeline(&renderer);

    let passes = run_frame(&mut pipeline, 800, 600).unwrap();

    let names: Vec<&str> = passes.iter().map(ExecutedPass::name).collect();
    assert_eq!(
        names,
        [
            "viewOverride_Scene",
            "viewOverride_Quad",
            "viewOverride_Scene_UI",
            "viewOverride_HUD",
            "viewOverride_Present",
        ]
    );
    assert_eq!(pipeline.pass_count(), PASS_COUNT);
}

#[test]
fn opaque_scene_binds_three_targets_and_the_rest_two() {
    let renderer = Rc::new(HeadlessRenderer::new());
    let mut pipeline = new_pipeline(&renderer);

    let passes = run_frame(&mut pipeline, 800, 600).unwrap();

    let targets = pipeline.targets().unwrap();
    let all: Vec<_> = TargetRole::ALL.iter().map(|&r| targets.target(r).unwrap()).collect();
    assert_eq!(passes[0].targets(), all.as_slice());
    for pass in &passes[1..] {
        assert_eq!(pass.targets(), &all[..2], "{}", pass.name());
    }
}

#[test]
fn only_opaque_scene_clears() {
    let renderer = Rc::new(HeadlessRenderer::new());
    let mut pipeline = new_pipeline(&renderer);

    let passes = run_frame(&mut pipeline, 800, 600).unwrap();

    match &passes[0] {
        ExecutedPass::Scene { filter, clear, .. } => {
            assert_eq!(*filter, SceneFilter::ShadedItems);
            assert_eq!(clear.mask, ClearMask::ALL);
            assert_eq!(clear.color, Vec4::ZERO);
        }
        other => panic!("expected scene pass, got {other:?}"),
    }
    match &passes[2] {
        ExecutedPass::Scene { filter, clear, .. } => {
            assert_eq!(*filter, SceneFilter::UiItems);
            assert!(clear.mask.is_empty());
        }
        other => panic!("expected ui scene pass, got {other:?}"),
    }
}

#[test]
fn targets_follow_viewport_between_frames() {
    let renderer = Rc::new(HeadlessRenderer::new());
    let mut pipeline = new_pipeline(&renderer);
    let manager = renderer.target_manager().unwrap();

    for (w, h) in [(800, 600), (1024, 768), (1, 1)] {
        run_frame(&mut pipeline, w, h).unwrap();
        let targets = pipeline.targets().unwrap();
        for role in TargetRole::ALL {
            let live = manager.descriptor(targets.target(role).unwrap()).unwrap();
            assert_eq!(live.size(), (w, h));
        }
    }
    assert_eq!(manager.live_count(), 3);
}

#[test]
fn hud_title_names_the_draw_api() {
    let renderer = Rc::new(HeadlessRenderer::new());
    let mut pipeline = new_pipeline(&renderer);

    let passes = run_frame(&mut pipeline, 800, 600).unwrap();

    let ExecutedPass::Ui { text, .. } = &passes[3] else {
        panic!("expected ui pass, got {:?}", passes[3]);
    };
    assert_eq!(text[0].text, "View Override - Headless");
}

#[test]
fn iterator_is_reset_after_each_frame() {
    let renderer = Rc::new(HeadlessRenderer::new());
    let mut pipeline = new_pipeline(&renderer);

    run_frame(&mut pipeline, 64, 64).unwrap();

    assert!(pipeline.current().is_none());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn inactive_renderer_runs_no_passes() {
    let renderer = Rc::new(HeadlessRenderer::new().inactive());
    let mut pipeline = new_pipeline(&renderer);

    let err = run_frame(&mut pipeline, 800, 600).unwrap_err();

    assert!(matches!(err, OverrideError::RendererUnavailable));
    assert_eq!(pipeline.pass_count(), 0);
}

#[test]
fn refused_targets_leave_pipeline_inert() {
    let renderer = Rc::new(HeadlessRenderer::new().with_target_limit(1));
    let mut pipeline = new_pipeline(&renderer);

    for _ in 0..2 {
        let err = run_frame(&mut pipeline, 800, 600).unwrap_err();
        assert!(matches!(err, OverrideError::ResourceAcquisition(_)));
    }
    assert_eq!(renderer.target_manager().unwrap().live_count(), 0);
}

#[test]
fn missing_debug_shader_skips_quad_only() {
    let renderer = Rc::new(HeadlessRenderer::new());
    let config = OverrideConfig::default().debug_shader("missingEffect", "debug");
    let mut pipeline = PipelineController::new(renderer.clone(), config);

    let passes = run_frame(&mut pipeline, 320, 240).unwrap();

    assert_eq!(passes.len(), PASS_COUNT - 1);
    assert!(!passes.iter().any(|p| matches!(p, ExecutedPass::Quad { .. })));
}

// ============================================================================
// Debug View
// ============================================================================

#[test]
fn debug_view_reaches_quad_shader() {
    let renderer = Rc::new(HeadlessRenderer::new());
    let mut pipeline = new_pipeline(&renderer);

    pipeline.change_active_target(1);
    pipeline.set_channel_mask((true, false, true, false));
    let passes = run_frame(&mut pipeline, 800, 600).unwrap();

    let ExecutedPass::Quad { shader, .. } = &passes[1] else {
        panic!("expected quad pass, got {:?}", passes[1]);
    };
    let params = renderer.shader_manager_impl().unwrap().parameters(*shader);
    let depth = pipeline.targets().unwrap().target(TargetRole::Depth);
    assert_eq!(params.texture(SOURCE_TEXTURE_PARAM), depth);
    assert_eq!(params.vec4(CHANNELS_PARAM), Some(Vec4::new(1.0, 0.0, 1.0, 0.0)));

    let applied = pipeline.pass(1).and_then(|pass| pass.shader_params()).unwrap();
    assert_eq!(applied.source_role, TargetRole::Depth);
    assert!(pipeline.pass(0).unwrap().shader_params().is_none());
}

#[test]
fn refresh_recompiles_on_next_frame() {
    let renderer = Rc::new(HeadlessRenderer::new());
    let mut pipeline = new_pipeline(&renderer);
    let shaders = renderer.shader_manager_impl().unwrap();

    run_frame(&mut pipeline, 64, 64).unwrap();
    run_frame(&mut pipeline, 64, 64).unwrap();
    assert_eq!(shaders.compile_count(), 1);

    pipeline.reset_shader_instances();
    assert!(!shaders.is_cached("quadDebug", "debug"));

    run_frame(&mut pipeline, 64, 64).unwrap();
    assert_eq!(shaders.compile_count(), 2);
}

#[test]
fn pipelines_sharing_a_renderer_survive_each_others_refresh() {
    let renderer = Rc::new(HeadlessRenderer::new());
    let mut a = new_pipeline(&renderer);
    let mut b = new_pipeline(&renderer);
    run_frame(&mut a, 64, 64).unwrap();
    run_frame(&mut b, 64, 64).unwrap();

    a.reset_shader_instances();
    drop(a);
    let passes = run_frame(&mut b, 64, 64).unwrap();

    let ExecutedPass::Quad { shader, .. } = &passes[1] else {
        panic!("expected quad pass, got {:?}", passes[1]);
    };
    let manager = renderer.shader_manager_impl().unwrap();
    assert!(manager.is_cached("quadDebug", "debug"));
    let color = b.targets().unwrap().target(TargetRole::Color);
    assert_eq!(manager.parameters(*shader).texture(SOURCE_TEXTURE_PARAM), color);
}

// ============================================================================
// Plugin & Control Surface
// ============================================================================

#[test]
fn plugin_command_drives_the_registered_pipeline() {
    let renderer = Rc::new(HeadlessRenderer::new());
    let refresh = Rc::new(CountingRefresh::default());
    let mut host = PluginHost::new();
    let mut plugin = ViewOverridePlugin::new(OverrideConfig::default());
    plugin
        .activate(&mut host, Some(renderer.clone() as Rc<dyn Renderer>), refresh.clone())
        .unwrap();

    let surface = host.command(COMMAND_NAME).unwrap().clone();
    surface.execute_line("viewOverride -t 2 -c 1 1 1 1").unwrap();
    assert_eq!(surface.execute_line("viewOverride -q -t").unwrap(), Some(2));
    assert_eq!(refresh.count(), 1);

    let pipeline = host.render_override("viewOverride").unwrap().clone();
    let passes = run_frame(&mut pipeline.borrow_mut(), 200, 100).unwrap();
    assert_eq!(passes.len(), PASS_COUNT);

    drop(surface);
    drop(pipeline);
    plugin.deactivate(&mut host).unwrap();
    assert_eq!(renderer.target_manager().unwrap().live_count(), 0);
    assert!(host.command(COMMAND_NAME).is_none());
}
