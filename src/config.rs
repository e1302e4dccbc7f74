//! Configuration for the override and the demo host.

use std::env;
use std::path::{Path, PathBuf};

use crate::pipeline::ChannelMask;
use crate::render_targets::TargetRole;

/// Settings for a [`PipelineController`](crate::pipeline::PipelineController).
///
/// # Example
/// ```ignore
/// let config = OverrideConfig::new()
///     .ui_name("Sorting Repro")
///     .active_target(TargetRole::AuxiliaryNormals);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideConfig {
    /// Registration name of the override. Also prefixes every pass name.
    pub name: String,
    /// Name shown in the host UI and the HUD title.
    pub ui_name: String,
    /// Directory registered with the host shader manager. `None` skips
    /// registration. Defaults to [`default_shader_dir`].
    pub shader_dir: Option<PathBuf>,
    pub debug_shader: String,
    pub debug_technique: String,
    pub channels: ChannelMask,
    pub active_target: TargetRole,
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            name: "viewOverride".to_string(),
            ui_name: "View Override".to_string(),
            shader_dir: Some(default_shader_dir()),
            debug_shader: "quadDebug".to_string(),
            debug_technique: "debug".to_string(),
            channels: ChannelMask::default(),
            active_target: TargetRole::Color,
        }
    }
}

impl OverrideConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn ui_name(mut self, ui_name: impl Into<String>) -> Self {
        self.ui_name = ui_name.into();
        self
    }

    pub fn shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = Some(dir.into());
        self
    }

    pub fn without_shader_dir(mut self) -> Self {
        self.shader_dir = None;
        self
    }

    pub fn debug_shader(mut self, file: impl Into<String>, technique: impl Into<String>) -> Self {
        self.debug_shader = file.into();
        self.debug_technique = technique.into();
        self
    }

    pub fn channels(mut self, channels: impl Into<ChannelMask>) -> Self {
        self.channels = channels.into();
        self
    }

    pub fn active_target(mut self, role: TargetRole) -> Self {
        self.active_target = role;
        self
    }
}

/// Environment variable that overrides the effect shader directory.
pub const SHADER_DIR_ENV: &str = "VIEW_OVERRIDE_SHADER_DIR";

/// Where effect shaders are looked up when no directory is configured.
///
/// In order: `VIEW_OVERRIDE_SHADER_DIR`, a `shaders` directory next to the
/// running executable, then the `shaders` directory of the source checkout
/// the crate was built from.
pub fn default_shader_dir() -> PathBuf {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    resolve_shader_dir(env::var_os(SHADER_DIR_ENV).map(PathBuf::from), exe_dir.as_deref())
}

fn resolve_shader_dir(from_env: Option<PathBuf>, exe_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = from_env {
        return dir;
    }
    if let Some(dir) = exe_dir.map(|d| d.join("shaders")).filter(|d| d.is_dir()) {
        return dir;
    }
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders"))
}

/// Window settings for the demo binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "View Override".to_string(),
            width: 800,
            height: 600,
        }
    }
}

impl DemoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_registered_names() {
        let config = OverrideConfig::default();
        assert_eq!(config.name, "viewOverride");
        assert_eq!(config.ui_name, "View Override");
        assert_eq!(config.debug_shader, "quadDebug");
        assert_eq!(config.debug_technique, "debug");
        assert_eq!(config.channels, ChannelMask::new(true, true, true, false));
        assert!(config.shader_dir.unwrap().ends_with("shaders"));
    }

    #[test]
    fn shader_dir_prefers_env_then_executable() {
        let exe_dir = env::temp_dir().join(format!("view-override-{}", std::process::id()));
        std::fs::create_dir_all(exe_dir.join("shaders")).unwrap();

        let from_env = resolve_shader_dir(Some(PathBuf::from("/opt/fx")), Some(&exe_dir));
        let beside_exe = resolve_shader_dir(None, Some(&exe_dir));
        let fallback = resolve_shader_dir(None, Some(Path::new("/nonexistent/bin")));
        std::fs::remove_dir_all(&exe_dir).unwrap();

        assert_eq!(from_env, PathBuf::from("/opt/fx"));
        assert_eq!(beside_exe, exe_dir.join("shaders"));
        assert_eq!(fallback, Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders"));
    }

    #[test]
    fn builder_overrides() {
        let config = OverrideConfig::new()
            .name("repro")
            .channels((false, true, false, true))
            .active_target(TargetRole::Depth)
            .without_shader_dir();

        assert_eq!(config.name, "repro");
        assert_eq!(config.active_target, TargetRole::Depth);
        assert_eq!(config.channels, ChannelMask::new(false, true, false, true));
        assert_eq!(config.shader_dir, None);
    }
}
