//! GPU textures backing the shared render targets.

use std::cell::RefCell;

use crate::host::{RenderTargetManager, TargetId};
use crate::render_targets::{RasterFormat, RenderTargetDescriptor};

pub(crate) fn texture_format(format: RasterFormat) -> wgpu::TextureFormat {
    match format {
        RasterFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        RasterFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        RasterFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

/// A live target: texture plus the views passes use.
///
/// `attachment` covers every aspect; `sampling` is depth-only for the depth
/// target so it can be bound as `texture_depth_2d`.
struct GpuTarget {
    descriptor: RenderTargetDescriptor,
    texture: wgpu::Texture,
    attachment: wgpu::TextureView,
    sampling: wgpu::TextureView,
}

impl GpuTarget {
    fn new(device: &wgpu::Device, descriptor: &RenderTargetDescriptor) -> Self {
        let faces = if descriptor.is_cube_map() { 6 } else { 1 };
        let layers = descriptor.array_slice_count().max(1) * faces;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(descriptor.name()),
            size: wgpu::Extent3d {
                width: descriptor.width().max(1),
                height: descriptor.height().max(1),
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: descriptor.multisample_count().max(1),
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(descriptor.format()),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let attachment = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampling = if descriptor.format().is_depth() {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some(descriptor.name()),
                aspect: wgpu::TextureAspect::DepthOnly,
                ..Default::default()
            })
        } else {
            attachment.clone()
        };

        Self {
            descriptor: descriptor.clone(),
            texture,
            attachment,
            sampling,
        }
    }
}

/// Creates and resizes textures for the pipeline.
///
/// A changed descriptor recreates the texture; handles stay valid.
pub struct WgpuTargetManager {
    device: wgpu::Device,
    slots: RefCell<Vec<Option<GpuTarget>>>,
}

impl WgpuTargetManager {
    pub fn new(device: wgpu::Device) -> Self {
        Self {
            device,
            slots: RefCell::new(Vec::new()),
        }
    }

    fn with_target<T>(&self, target: TargetId, f: impl FnOnce(&GpuTarget) -> T) -> Option<T> {
        self.slots.borrow().get(target.0).and_then(Option::as_ref).map(f)
    }

    pub fn attachment_view(&self, target: TargetId) -> Option<wgpu::TextureView> {
        self.with_target(target, |t| t.attachment.clone())
    }

    pub fn sampling_view(&self, target: TargetId) -> Option<wgpu::TextureView> {
        self.with_target(target, |t| t.sampling.clone())
    }

    pub fn texture(&self, target: TargetId) -> Option<wgpu::Texture> {
        self.with_target(target, |t| t.texture.clone())
    }

    pub fn descriptor(&self, target: TargetId) -> Option<RenderTargetDescriptor> {
        self.with_target(target, |t| t.descriptor.clone())
    }
}

impl RenderTargetManager for WgpuTargetManager {
    fn acquire_render_target(&self, descriptor: &RenderTargetDescriptor) -> Option<TargetId> {
        let target = GpuTarget::new(&self.device, descriptor);
        let mut slots = self.slots.borrow_mut();
        slots.push(Some(target));
        Some(TargetId(slots.len() - 1))
    }

    fn update_description(&self, target: TargetId, descriptor: &RenderTargetDescriptor) -> bool {
        let mut slots = self.slots.borrow_mut();
        let Some(Some(slot)) = slots.get_mut(target.0) else {
            return false;
        };
        if slot.descriptor != *descriptor {
            *slot = GpuTarget::new(&self.device, descriptor);
        }
        true
    }

    fn release_render_target(&self, target: TargetId) {
        if let Some(slot) = self.slots.borrow_mut().get_mut(target.0) {
            if let Some(released) = slot.take() {
                released.texture.destroy();
            }
        }
    }
}
