//! The shared render targets and their per-frame sizing.
//!
//! Three surfaces are shared by every pass of the pipeline:
//!
//! | role               | name            | format              |
//! |--------------------|-----------------|---------------------|
//! | `Color`            | `colorTarget`   | RGBA 16-bit float   |
//! | `Depth`            | `depthTarget`   | depth 24 / stencil 8 |
//! | `AuxiliaryNormals` | `normalsTarget` | RGBA 32-bit float   |
//!
//! Targets are created at 1×1 and grow to the viewport on the first
//! [`RenderTargetSet::resize`]. The set releases its targets when dropped.

use std::rc::Rc;

use crate::error::{OverrideError, Result};
use crate::host::{Renderer, TargetId};

/// Logical name of one of the shared surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetRole {
    #[default]
    Color = 0,
    Depth = 1,
    AuxiliaryNormals = 2,
}

impl TargetRole {
    pub const COUNT: usize = 3;

    pub const ALL: [TargetRole; Self::COUNT] = [
        TargetRole::Color,
        TargetRole::Depth,
        TargetRole::AuxiliaryNormals,
    ];

    /// Maps a control-surface index (0, 1, 2) to a role.
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Name given to the target's descriptor.
    pub fn target_name(self) -> &'static str {
        match self {
            TargetRole::Color => "colorTarget",
            TargetRole::Depth => "depthTarget",
            TargetRole::AuxiliaryNormals => "normalsTarget",
        }
    }

    pub fn format(self) -> RasterFormat {
        match self {
            TargetRole::Color => RasterFormat::Rgba16Float,
            TargetRole::Depth => RasterFormat::Depth24Stencil8,
            TargetRole::AuxiliaryNormals => RasterFormat::Rgba32Float,
        }
    }
}

/// Pixel formats used by the shared targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    Rgba16Float,
    Depth24Stencil8,
    Rgba32Float,
}

impl RasterFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, RasterFormat::Depth24Stencil8)
    }
}

/// Description of a render target.
///
/// Only the size changes after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetDescriptor {
    name: String,
    width: u32,
    height: u32,
    multisample_count: u32,
    format: RasterFormat,
    array_slice_count: u32,
    is_cube_map: bool,
}

impl RenderTargetDescriptor {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        multisample_count: u32,
        format: RasterFormat,
        array_slice_count: u32,
        is_cube_map: bool,
    ) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            multisample_count,
            format,
            array_slice_count,
            is_cube_map,
        }
    }

    /// The 1×1, single-sample, single-slice descriptor for `role`.
    pub fn for_role(role: TargetRole) -> Self {
        Self::new(role.target_name(), 1, 1, 0, role.format(), 1, false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Requested MSAA sample count. `0` means no multisampling.
    pub fn multisample_count(&self) -> u32 {
        self.multisample_count
    }

    pub fn format(&self) -> RasterFormat {
        self.format
    }

    pub fn array_slice_count(&self) -> u32 {
        self.array_slice_count
    }

    pub fn is_cube_map(&self) -> bool {
        self.is_cube_map
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

/// The three shared targets, one per [`TargetRole`].
///
/// A set is either complete or empty: [`acquire`](Self::acquire) releases
/// whatever it already created when a later target fails.
pub struct RenderTargetSet {
    renderer: Rc<dyn Renderer>,
    descriptors: [RenderTargetDescriptor; TargetRole::COUNT],
    targets: [Option<TargetId>; TargetRole::COUNT],
}

impl RenderTargetSet {
    /// Acquires the three targets at 1×1.
    ///
    /// # Errors
    ///
    /// [`OverrideError::ResourceAcquisition`] if the host has no render
    /// target manager or refuses one of the targets.
    pub fn acquire(renderer: Rc<dyn Renderer>) -> Result<Self> {
        let descriptors = TargetRole::ALL.map(RenderTargetDescriptor::for_role);
        let mut targets = [None; TargetRole::COUNT];

        let Some(manager) = renderer.render_target_manager() else {
            return Err(OverrideError::ResourceAcquisition(
                "render target manager is unavailable".into(),
            ));
        };

        for role in TargetRole::ALL {
            let descriptor = &descriptors[role.index()];
            match manager.acquire_render_target(descriptor) {
                Some(id) => targets[role.index()] = Some(id),
                None => {
                    for id in targets.iter_mut().filter_map(Option::take) {
                        manager.release_render_target(id);
                    }
                    return Err(OverrideError::ResourceAcquisition(format!(
                        "host refused render target '{}'",
                        descriptor.name()
                    )));
                }
            }
        }

        log::debug!("render targets acquired: {targets:?}");

        Ok(Self {
            renderer,
            descriptors,
            targets,
        })
    }

    /// Sizes every target to `width` × `height`.
    ///
    /// Zero dimensions (a minimized viewport) are clamped to 1. Calling this
    /// with the current size does nothing.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let size = (width.max(1), height.max(1));
        if self.descriptors.iter().all(|d| d.size() == size) {
            return Ok(());
        }

        let Some(manager) = self.renderer.render_target_manager() else {
            return Err(OverrideError::ResourceAcquisition(
                "render target manager is unavailable".into(),
            ));
        };

        for (descriptor, target) in self.descriptors.iter_mut().zip(&self.targets) {
            descriptor.set_size(size.0, size.1);
            if let Some(id) = *target {
                if !manager.update_description(id, descriptor) {
                    return Err(OverrideError::ResourceAcquisition(format!(
                        "host rejected resize of '{}'",
                        descriptor.name()
                    )));
                }
            }
        }

        log::debug!("render targets resized to {}x{}", size.0, size.1);
        Ok(())
    }

    /// Releases every target still held. Safe to call repeatedly.
    pub fn release(&mut self) {
        let manager = self.renderer.render_target_manager();
        for id in self.targets.iter_mut().filter_map(Option::take) {
            match manager {
                Some(manager) => manager.release_render_target(id),
                None => log::warn!("render target manager gone, dropping {id:?} without release"),
            }
        }
    }

    pub fn target(&self, role: TargetRole) -> Option<TargetId> {
        self.targets[role.index()]
    }

    pub fn descriptor(&self, role: TargetRole) -> &RenderTargetDescriptor {
        &self.descriptors[role.index()]
    }

    /// Whether all three targets are live.
    pub fn is_complete(&self) -> bool {
        self.targets.iter().all(Option::is_some)
    }
}

impl Drop for RenderTargetSet {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessRenderer;

    fn acquire(renderer: &Rc<HeadlessRenderer>) -> RenderTargetSet {
        RenderTargetSet::acquire(renderer.clone()).unwrap()
    }

    // ── acquire ───────────────────────────────────────────────────────────

    #[test]
    fn acquire_creates_one_by_one_targets() {
        let renderer = Rc::new(HeadlessRenderer::new());
        let set = acquire(&renderer);

        assert!(set.is_complete());
        assert_eq!(renderer.target_manager().unwrap().live_count(), 3);
        for role in TargetRole::ALL {
            assert_eq!(set.descriptor(role).size(), (1, 1));
            assert_eq!(set.descriptor(role).format(), role.format());
            assert_eq!(set.descriptor(role).name(), role.target_name());
        }
    }

    #[test]
    fn acquire_without_manager_fails() {
        let renderer = Rc::new(HeadlessRenderer::new().without_target_manager());
        let result = RenderTargetSet::acquire(renderer);
        assert!(matches!(result, Err(OverrideError::ResourceAcquisition(_))));
    }

    #[test]
    fn partial_acquisition_releases_everything() {
        let renderer = Rc::new(HeadlessRenderer::new().with_target_limit(2));
        let result = RenderTargetSet::acquire(renderer.clone());

        assert!(matches!(result, Err(OverrideError::ResourceAcquisition(_))));
        assert_eq!(renderer.target_manager().unwrap().live_count(), 0);
    }

    // ── resize ────────────────────────────────────────────────────────────

    #[test]
    fn resize_updates_every_descriptor() {
        let renderer = Rc::new(HeadlessRenderer::new());
        let mut set = acquire(&renderer);
        let manager = renderer.target_manager().unwrap();

        for (w, h) in [(1, 1), (800, 600), (1920, 1080), (3, 7000)] {
            set.resize(w, h).unwrap();
            for role in TargetRole::ALL {
                assert_eq!(set.descriptor(role).size(), (w, h));
                let live = manager.descriptor(set.target(role).unwrap()).unwrap();
                assert_eq!(live.size(), (w, h));
            }
        }
    }

    #[test]
    fn resize_to_same_size_is_a_no_op() {
        let renderer = Rc::new(HeadlessRenderer::new());
        let mut set = acquire(&renderer);
        let manager = renderer.target_manager().unwrap();

        set.resize(640, 480).unwrap();
        let updates = manager.update_count();
        set.resize(640, 480).unwrap();

        assert_eq!(manager.update_count(), updates);
    }

    #[test]
    fn resize_clamps_zero_dimensions() {
        let renderer = Rc::new(HeadlessRenderer::new());
        let mut set = acquire(&renderer);

        set.resize(0, 0).unwrap();
        assert_eq!(set.descriptor(TargetRole::Depth).size(), (1, 1));
    }

    // ── release ───────────────────────────────────────────────────────────

    #[test]
    fn release_is_idempotent() {
        let renderer = Rc::new(HeadlessRenderer::new());
        let mut set = acquire(&renderer);

        set.release();
        set.release();

        assert!(!set.is_complete());
        assert_eq!(renderer.target_manager().unwrap().live_count(), 0);
        assert_eq!(renderer.target_manager().unwrap().release_count(), 3);
    }

    #[test]
    fn drop_releases_targets() {
        let renderer = Rc::new(HeadlessRenderer::new());
        drop(acquire(&renderer));
        assert_eq!(renderer.target_manager().unwrap().live_count(), 0);
    }

    #[test]
    fn role_indices_match_control_surface() {
        assert_eq!(TargetRole::from_index(0), Some(TargetRole::Color));
        assert_eq!(TargetRole::from_index(1), Some(TargetRole::Depth));
        assert_eq!(TargetRole::from_index(2), Some(TargetRole::AuxiliaryNormals));
        assert_eq!(TargetRole::from_index(3), None);
    }
}
