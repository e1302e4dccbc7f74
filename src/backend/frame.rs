//! Per-frame pass execution for the wgpu host.

use glam::{Vec2, Vec3};

use crate::backend::WgpuRenderer;
use crate::backend::pipelines::{SHADED_INSTANCES, UI_INSTANCES};
use crate::error::{OverrideError, Result};
use crate::host::{FontSize, PassExecutor, ShaderId, TargetId, TextAlignment, UiDrawManager};
use crate::passes::{ClearMask, ClearPolicy, PassInfo, SceneFilter};
use crate::render_targets::TargetRole;

/// Collects overlay text. The demo has no font rasterizer, so text ends up
/// in the window title and the log.
#[derive(Default)]
struct TitleOverlay {
    lines: Vec<String>,
}

impl UiDrawManager for TitleOverlay {
    fn begin_drawable(&mut self) {}

    fn set_color(&mut self, _color: Vec3) {}

    fn set_font_size(&mut self, _size: FontSize) {}

    fn text(&mut self, _position: Vec2, text: &str, _alignment: TextAlignment) {
        if !text.is_empty() {
            self.lines.push(text.to_string());
        }
    }

    fn end_drawable(&mut self) {}
}

/// One frame of GPU work. Passes record into a single encoder, submitted by
/// [`finish`](Self::finish).
pub struct WgpuFrame<'a> {
    renderer: &'a WgpuRenderer,
    encoder: wgpu::CommandEncoder,
    surface_texture: wgpu::SurfaceTexture,
    overlay: Vec<String>,
}

impl<'a> WgpuFrame<'a> {
    pub(crate) fn new(renderer: &'a WgpuRenderer) -> Result<Self> {
        let gpu = renderer.gpu();
        let surface_texture = match gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.reconfigure();
                gpu.surface
                    .get_current_texture()
                    .map_err(|e| OverrideError::Gpu(format!("surface unavailable: {e}")))?
            }
            Err(e) => return Err(OverrideError::Gpu(format!("surface unavailable: {e}"))),
        };

        let encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("View Override Frame"),
            });

        Ok(Self {
            renderer,
            encoder,
            surface_texture,
            overlay: Vec::new(),
        })
    }

    /// Submits the frame, presents it and returns the overlay text.
    pub fn finish(self) -> Vec<String> {
        self.renderer
            .gpu()
            .queue
            .submit(std::iter::once(self.encoder.finish()));
        self.surface_texture.present();
        self.overlay
    }

    fn view(&self, pass: &PassInfo<'_>, role: TargetRole) -> Result<wgpu::TextureView> {
        pass.target(role)
            .and_then(|id| self.renderer.targets().attachment_view(id))
            .ok_or_else(|| {
                OverrideError::Gpu(format!(
                    "pass '{}' has no live '{}'",
                    pass.name,
                    role.target_name()
                ))
            })
    }

    /// Copies a target so it can be sampled while the original is attached.
    fn snapshot(&mut self, source: TargetId) -> Result<wgpu::TextureView> {
        let targets = self.renderer.targets();
        let (Some(texture), Some(descriptor)) =
            (targets.texture(source), targets.descriptor(source))
        else {
            return Err(OverrideError::Gpu(format!("{source:?} is not live")));
        };

        let copy = self.renderer.gpu().device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Debug Source Copy"),
            size: texture.size(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture.format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.encoder.copy_texture_to_texture(
            texture.as_image_copy(),
            copy.as_image_copy(),
            texture.size(),
        );
        log::trace!("copied '{}' for sampling", descriptor.name());
        Ok(copy.create_view(&wgpu::TextureViewDescriptor::default()))
    }
}

fn color_ops(clear: &ClearPolicy) -> wgpu::Operations<wgpu::Color> {
    let load = if clear.clears(ClearMask::COLOR) {
        let c = clear.color.as_dvec4();
        wgpu::LoadOp::Clear(wgpu::Color {
            r: c.x,
            g: c.y,
            b: c.z,
            a: c.w,
        })
    } else {
        wgpu::LoadOp::Load
    };
    wgpu::Operations {
        load,
        store: wgpu::StoreOp::Store,
    }
}

fn depth_stencil_ops(clear: &ClearPolicy) -> (wgpu::Operations<f32>, wgpu::Operations<u32>) {
    let depth = if clear.clears(ClearMask::DEPTH) {
        wgpu::LoadOp::Clear(1.0)
    } else {
        wgpu::LoadOp::Load
    };
    let stencil = if clear.clears(ClearMask::STENCIL) {
        wgpu::LoadOp::Clear(0)
    } else {
        wgpu::LoadOp::Load
    };
    (
        wgpu::Operations {
            load: depth,
            store: wgpu::StoreOp::Store,
        },
        wgpu::Operations {
            load: stencil,
            store: wgpu::StoreOp::Store,
        },
    )
}

impl PassExecutor for WgpuFrame<'_> {
    fn render_scene(&mut self, pass: &PassInfo<'_>, filter: SceneFilter) -> Result<()> {
        let mut color_roles = vec![TargetRole::Color];
        if filter == SceneFilter::ShadedItems {
            color_roles.push(TargetRole::AuxiliaryNormals);
        }
        let color_views = color_roles
            .iter()
            .map(|&role| self.view(pass, role))
            .collect::<Result<Vec<_>>>()?;
        let depth_view = self.view(pass, TargetRole::Depth)?;

        let ops = color_ops(&pass.clear);
        let color_attachments: Vec<_> = color_views
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops,
                    depth_slice: None,
                })
            })
            .collect();
        let (depth_ops, stencil_ops) = depth_stencil_ops(&pass.clear);

        let pipelines = self.renderer.pipelines();
        let (pipeline, instances) = match filter {
            SceneFilter::ShadedItems => (&pipelines.scene, SHADED_INSTANCES),
            SceneFilter::UiItems => (&pipelines.ui, UI_INSTANCES),
        };

        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.name),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(depth_ops),
                stencil_ops: Some(stencil_ops),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(pipeline);
        render_pass.draw(0..6, instances);
        Ok(())
    }

    fn render_quad(&mut self, pass: &PassInfo<'_>, shader: ShaderId) -> Result<()> {
        let Some(draw) = self.renderer.shaders().quad_draw(shader) else {
            log::warn!("{}: shader {shader:?} was evicted", pass.name);
            return Ok(());
        };
        let Some(source) = draw.source else {
            log::debug!("{}: no source target set", pass.name);
            return Ok(());
        };
        let Some(descriptor) = self.renderer.targets().descriptor(source) else {
            return Err(OverrideError::Gpu(format!("{source:?} is not live")));
        };

        let quad = if descriptor.format().is_depth() {
            match draw.depth {
                Some(depth) => depth,
                None => {
                    log::warn!("{}: effect has no depth technique", pass.name);
                    return Ok(());
                }
            }
        } else {
            draw.color
        };

        let color_view = self.view(pass, TargetRole::Color)?;
        let source_view = if pass.target(TargetRole::Color) == Some(source) {
            self.snapshot(source)?
        } else {
            self.renderer
                .targets()
                .sampling_view(source)
                .ok_or_else(|| OverrideError::Gpu(format!("{source:?} is not live")))?
        };

        let bind_group = self
            .renderer
            .gpu()
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Quad Bind Group"),
                layout: &quad.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: draw.uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: quad.texture_binding,
                        resource: wgpu::BindingResource::TextureView(&source_view),
                    },
                ],
            });

        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.name),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_view,
                resolve_target: None,
                ops: color_ops(&pass.clear),
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&quad.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    }

    fn render_ui(
        &mut self,
        _pass: &PassInfo<'_>,
        draw: &mut dyn FnMut(&mut dyn UiDrawManager),
    ) -> Result<()> {
        let mut overlay = TitleOverlay::default();
        draw(&mut overlay);
        self.overlay.extend(overlay.lines);
        Ok(())
    }

    fn present(&mut self, pass: &PassInfo<'_>) -> Result<()> {
        let source = pass
            .target(TargetRole::Color)
            .and_then(|id| self.renderer.targets().sampling_view(id))
            .ok_or_else(|| {
                OverrideError::Gpu(format!("pass '{}' has no colour target", pass.name))
            })?;

        let pipelines = self.renderer.pipelines();
        let bind_group = self
            .renderer
            .gpu()
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Present Bind Group"),
                layout: &pipelines.present_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&source),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&pipelines.sampler),
                    },
                ],
            });

        let surface_view = self
            .surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.name),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &surface_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&pipelines.present);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    }
}
