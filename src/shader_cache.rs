//! Lazily compiled shader instances with explicit invalidation.

use std::rc::Rc;

use crate::error::{OverrideError, Result};
use crate::host::{Renderer, ShaderId};

/// One effect shader, compiled through the host on first use.
///
/// A failed compile is remembered so the error is logged once; every later
/// call still retries, so a fixed shader file is picked up without a reload.
/// The host cache is shared by every pipeline on a renderer, so a cached
/// instance is checked against the host before it is handed out.
pub struct ShaderCache {
    renderer: Rc<dyn Renderer>,
    file: String,
    technique: String,
    instance: Option<ShaderId>,
    failed: bool,
}

impl ShaderCache {
    pub fn new(
        renderer: Rc<dyn Renderer>,
        file: impl Into<String>,
        technique: impl Into<String>,
    ) -> Self {
        Self {
            renderer,
            file: file.into(),
            technique: technique.into(),
            instance: None,
            failed: false,
        }
    }

    /// Returns the compiled instance, compiling it first if needed.
    ///
    /// # Errors
    ///
    /// [`OverrideError::ShaderCompilation`] when the host cannot compile the
    /// shader or has no shader manager.
    pub fn get_or_compile(&mut self) -> Result<ShaderId> {
        let Some(manager) = self.renderer.shader_manager() else {
            self.instance = None;
            return Err(self.failure("shader manager is unavailable".to_string()));
        };

        if let Some(id) = self.instance {
            if manager.is_effect_live(id) {
                return Ok(id);
            }
            log::debug!("shader '{}' ({}) was evicted, recompiling", self.file, self.technique);
            self.instance = None;
        }

        let compiled = manager.effect_shader(&self.file, &self.technique);

        match compiled {
            Ok(id) => {
                if self.failed {
                    log::info!("shader '{}' compiled after earlier failure", self.file);
                }
                self.failed = false;
                self.instance = Some(id);
                Ok(id)
            }
            Err(reason) => Err(self.failure(reason)),
        }
    }

    fn failure(&mut self, reason: String) -> OverrideError {
        let err = OverrideError::ShaderCompilation {
            file: self.file.clone(),
            technique: self.technique.clone(),
            reason,
        };
        if self.failed {
            log::debug!("{err}");
        } else {
            log::error!("{err}");
        }
        self.failed = true;
        err
    }

    /// Evicts the instance here and in the host cache.
    pub fn invalidate(&mut self) {
        if self.instance.take().is_some() {
            log::debug!("invalidating shader '{}' ({})", self.file, self.technique);
        }
        self.failed = false;
        if let Some(manager) = self.renderer.shader_manager() {
            manager.remove_effect_from_cache(&self.file, &self.technique);
        }
    }

    /// The cached instance, without compiling.
    pub fn cached(&self) -> Option<ShaderId> {
        self.instance
    }

    pub fn renderer(&self) -> &Rc<dyn Renderer> {
        &self.renderer
    }
}

impl Drop for ShaderCache {
    fn drop(&mut self) {
        if self.instance.is_some() {
            self.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessRenderer;
    use crate::host::ShaderManager;

    const VALID: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(f32(i), 0.0, 0.0, 1.0);
}

@fragment
fn debug() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;

    fn renderer_with(source: &str) -> Rc<HeadlessRenderer> {
        let renderer = Rc::new(HeadlessRenderer::new());
        renderer
            .shader_manager_impl()
            .unwrap()
            .insert_source("quadDebug", source);
        renderer
    }

    #[test]
    fn compiles_once_and_caches() {
        let renderer = renderer_with(VALID);
        let mut cache = ShaderCache::new(renderer.clone(), "quadDebug", "debug");

        let first = cache.get_or_compile().unwrap();
        let second = cache.get_or_compile().unwrap();

        assert_eq!(first, second);
        assert_eq!(renderer.shader_manager_impl().unwrap().compile_count(), 1);
    }

    #[test]
    fn invalidate_forces_recompile() {
        let renderer = renderer_with(VALID);
        let manager = renderer.shader_manager_impl().unwrap();
        let mut cache = ShaderCache::new(renderer.clone(), "quadDebug", "debug");

        cache.get_or_compile().unwrap();
        cache.invalidate();

        assert_eq!(cache.cached(), None);
        assert!(!manager.is_cached("quadDebug", "debug"));

        cache.get_or_compile().unwrap();
        assert_eq!(manager.compile_count(), 2);
    }

    #[test]
    fn compile_failure_yields_no_handle() {
        let renderer = renderer_with("fn broken( {");
        let mut cache = ShaderCache::new(renderer, "quadDebug", "debug");

        let err = cache.get_or_compile().unwrap_err();

        assert!(matches!(err, OverrideError::ShaderCompilation { .. }));
        assert_eq!(cache.cached(), None);
    }

    #[test]
    fn missing_technique_is_a_compile_failure() {
        let renderer = renderer_with(VALID);
        let mut cache = ShaderCache::new(renderer, "quadDebug", "nope");

        assert!(cache.get_or_compile().is_err());
    }

    #[test]
    fn recompiles_after_eviction_by_another_cache() {
        let renderer = renderer_with(VALID);
        let manager = renderer.shader_manager_impl().unwrap();
        let mut a = ShaderCache::new(renderer.clone(), "quadDebug", "debug");
        let mut b = ShaderCache::new(renderer.clone(), "quadDebug", "debug");

        let shared = a.get_or_compile().unwrap();
        assert_eq!(b.get_or_compile().unwrap(), shared);

        a.invalidate();
        let fresh = b.get_or_compile().unwrap();

        assert_ne!(fresh, shared);
        assert!(manager.is_effect_live(fresh));
        assert_eq!(b.cached(), Some(fresh));
        assert_eq!(manager.compile_count(), 2);
    }

    #[test]
    fn drop_evicts_host_entry() {
        let renderer = renderer_with(VALID);
        let mut cache = ShaderCache::new(renderer.clone(), "quadDebug", "debug");
        cache.get_or_compile().unwrap();

        drop(cache);

        assert!(!renderer.shader_manager_impl().unwrap().is_cached("quadDebug", "debug"));
    }
}
