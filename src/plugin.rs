//! Plugin activation and deactivation.
//!
//! Activation creates the pipeline, registers it as a render override and
//! registers the control command bound to it. Deactivation undoes both and
//! drops the pipeline, which releases its targets and shaders.

use std::collections::HashMap;
use std::rc::Rc;

use crate::config::OverrideConfig;
use crate::control::{COMMAND_NAME, ControlSurface};
use crate::error::{OverrideError, Result};
use crate::host::{Renderer, ViewportRefresh};
use crate::pipeline::{PipelineController, SharedPipeline};

/// Where the host keeps render overrides and commands.
pub trait PluginRegistry {
    fn register_override(&mut self, pipeline: SharedPipeline) -> Result<()>;

    /// Removes the override named `name` and hands it back.
    fn deregister_override(&mut self, name: &str) -> Result<Option<SharedPipeline>>;

    fn register_command(&mut self, name: &str, surface: ControlSurface) -> Result<()>;

    fn deregister_command(&mut self, name: &str) -> Result<()>;
}

/// In-memory registry.
#[derive(Default)]
pub struct PluginHost {
    overrides: HashMap<String, SharedPipeline>,
    commands: HashMap<String, ControlSurface>,
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_override(&self, name: &str) -> Option<&SharedPipeline> {
        self.overrides.get(name)
    }

    pub fn command(&self, name: &str) -> Option<&ControlSurface> {
        self.commands.get(name)
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}

impl PluginRegistry for PluginHost {
    fn register_override(&mut self, pipeline: SharedPipeline) -> Result<()> {
        let name = pipeline.borrow().name().to_string();
        if self.overrides.contains_key(&name) {
            return Err(OverrideError::Registration(format!(
                "render override '{name}' is already registered"
            )));
        }
        self.overrides.insert(name, pipeline);
        Ok(())
    }

    fn deregister_override(&mut self, name: &str) -> Result<Option<SharedPipeline>> {
        Ok(self.overrides.remove(name))
    }

    fn register_command(&mut self, name: &str, surface: ControlSurface) -> Result<()> {
        if self.commands.contains_key(name) {
            return Err(OverrideError::Registration(format!(
                "command '{name}' is already registered"
            )));
        }
        self.commands.insert(name.to_string(), surface);
        Ok(())
    }

    fn deregister_command(&mut self, name: &str) -> Result<()> {
        match self.commands.remove(name) {
            Some(_) => Ok(()),
            None => Err(OverrideError::Registration(format!(
                "command '{name}' is not registered"
            ))),
        }
    }
}

/// The plugin entry points.
pub struct ViewOverridePlugin {
    config: OverrideConfig,
    pipeline: Option<SharedPipeline>,
}

impl ViewOverridePlugin {
    pub fn new(config: OverrideConfig) -> Self {
        Self {
            config,
            pipeline: None,
        }
    }

    pub fn pipeline(&self) -> Option<&SharedPipeline> {
        self.pipeline.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Creates and registers the override and its command.
    ///
    /// Without a renderer nothing is registered and activation still
    /// succeeds, matching a host started without a viewport.
    pub fn activate(
        &mut self,
        registry: &mut dyn PluginRegistry,
        renderer: Option<Rc<dyn Renderer>>,
        refresh: Rc<dyn ViewportRefresh>,
    ) -> Result<()> {
        if self.pipeline.is_some() {
            return Err(OverrideError::Registration(format!(
                "'{}' is already active",
                self.config.name
            )));
        }
        let Some(renderer) = renderer else {
            log::warn!("no renderer, '{}' not registered", self.config.name);
            return Ok(());
        };

        let pipeline = PipelineController::new(renderer, self.config.clone()).shared();
        registry.register_override(pipeline.clone())?;

        let surface = ControlSurface::new(pipeline.clone(), refresh);
        if let Err(err) = registry.register_command(COMMAND_NAME, surface) {
            registry.deregister_override(&self.config.name)?;
            return Err(err);
        }

        log::info!("activated '{}'", self.config.ui_name);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Deregisters the override and command and drops the pipeline.
    pub fn deactivate(&mut self, registry: &mut dyn PluginRegistry) -> Result<()> {
        let Some(pipeline) = self.pipeline.take() else {
            return Ok(());
        };

        registry.deregister_override(&self.config.name)?;
        registry.deregister_command(COMMAND_NAME)?;

        if Rc::strong_count(&pipeline) > 1 {
            log::warn!("'{}' is still referenced after deactivation", self.config.name);
        }
        drop(pipeline);

        log::info!("deactivated '{}'", self.config.ui_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{CountingRefresh, HeadlessRenderer};

    fn activate(host: &mut PluginHost, renderer: &Rc<HeadlessRenderer>) -> ViewOverridePlugin {
        let mut plugin = ViewOverridePlugin::new(OverrideConfig::default());
        plugin
            .activate(
                host,
                Some(renderer.clone() as Rc<dyn Renderer>),
                Rc::new(CountingRefresh::default()),
            )
            .unwrap();
        plugin
    }

    #[test]
    fn activate_registers_override_and_command() {
        let renderer = Rc::new(HeadlessRenderer::new());
        let mut host = PluginHost::new();

        let plugin = activate(&mut host, &renderer);

        assert!(plugin.is_active());
        assert!(host.render_override("viewOverride").is_some());
        assert!(host.command(COMMAND_NAME).is_some());
    }

    #[test]
    fn command_drives_registered_pipeline() {
        let renderer = Rc::new(HeadlessRenderer::new());
        let mut host = PluginHost::new();
        let plugin = activate(&mut host, &renderer);

        host.command(COMMAND_NAME).unwrap().execute(&["-t", "2"]).unwrap();

        let pipeline = plugin.pipeline().unwrap().borrow();
        assert_eq!(pipeline.active_target().index(), 2);
    }

    #[test]
    fn deactivate_releases_everything() {
        let renderer = Rc::new(HeadlessRenderer::new());
        let mut host = PluginHost::new();
        let mut plugin = activate(&mut host, &renderer);

        plugin.deactivate(&mut host).unwrap();

        assert!(!plugin.is_active());
        assert_eq!(host.override_count(), 0);
        assert_eq!(host.command_count(), 0);
        assert_eq!(renderer.target_manager().unwrap().live_count(), 0);
    }

    #[test]
    fn activate_without_renderer_registers_nothing() {
        let mut host = PluginHost::new();
        let mut plugin = ViewOverridePlugin::new(OverrideConfig::default());

        plugin
            .activate(&mut host, None, Rc::new(CountingRefresh::default()))
            .unwrap();

        assert!(!plugin.is_active());
        assert_eq!(host.override_count(), 0);
        assert_eq!(host.command_count(), 0);
    }

    #[test]
    fn double_activation_is_rejected() {
        let renderer = Rc::new(HeadlessRenderer::new());
        let mut host = PluginHost::new();
        let mut plugin = activate(&mut host, &renderer);

        let err = plugin
            .activate(
                &mut host,
                Some(renderer.clone() as Rc<dyn Renderer>),
                Rc::new(CountingRefresh::default()),
            )
            .unwrap_err();

        assert!(matches!(err, OverrideError::Registration(_)));
    }
}
