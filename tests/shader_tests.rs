//! Shader Validation Tests
//!
//! Every WGSL file shipped in `shaders/` must parse and validate, and expose
//! the entry points the hosts look up by name.

use std::path::Path;

use view_override::wgsl::{self, QUAD_VERTEX_ENTRY};

fn load(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders").join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

#[test]
fn quad_debug_has_color_and_depth_techniques() {
    let entry_points = wgsl::validate_technique(&load("quadDebug.wgsl"), "debug")
        .unwrap_or_else(|e| panic!("{e}"));

    assert!(entry_points.has_vertex(QUAD_VERTEX_ENTRY));
    assert!(entry_points.has_fragment("debug_depth"));
}

#[test]
fn test_scene_has_shaded_and_ui_outputs() {
    let entry_points = wgsl::validate(&load("testScene.wgsl")).unwrap_or_else(|e| panic!("{e}"));

    assert!(entry_points.has_vertex("vs_main"));
    assert!(entry_points.has_fragment("fs_main"));
    assert!(entry_points.has_fragment("fs_ui"));
}

#[test]
fn present_validates() {
    let entry_points = wgsl::validate(&load("present.wgsl")).unwrap_or_else(|e| panic!("{e}"));

    assert!(entry_points.has_vertex("vs_main"));
    assert!(entry_points.has_fragment("fs_main"));
}
