//! Effect shaders compiled into full-screen quad pipelines.
//!
//! An effect file provides the `vs_main` vertex entry point and one fragment
//! entry point per technique. Colour targets are read through `technique`
//! (`texture_2d<f32>` at binding 1); when the file also defines
//! `<technique>_depth` it is used for the depth target
//! (`texture_depth_2d` at binding 2). Binding 0 holds [`QuadUniforms`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec4;

use crate::backend::targets::texture_format;
use crate::host::{ShaderId, ShaderManager, TargetId};
use crate::passes::{CHANNELS_PARAM, SOURCE_TEXTURE_PARAM};
use crate::render_targets::TargetRole;
use crate::wgsl::{self, EntryPoints, QUAD_VERTEX_ENTRY};

/// Uniforms for quad effects.
///
/// # WGSL Declaration
///
/// ```wgsl
/// struct Uniforms {
///     channels: vec4f,
/// }
/// @group(0) @binding(0) var<uniform> u: Uniforms;
/// ```
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadUniforms {
    pub channels: [f32; 4],
}

/// Pipeline and bind group layout for one source kind.
#[derive(Clone)]
pub struct QuadPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
    /// Binding slot of the source texture.
    pub texture_binding: u32,
}

/// Everything needed to draw a quad effect this frame.
pub struct QuadDraw {
    pub color: QuadPipeline,
    pub depth: Option<QuadPipeline>,
    pub uniforms: wgpu::Buffer,
    pub source: Option<TargetId>,
}

struct QuadProgram {
    color: QuadPipeline,
    depth: Option<QuadPipeline>,
    uniforms: wgpu::Buffer,
    source: Option<TargetId>,
}

/// Loads WGSL from the registered shader paths and builds quad pipelines.
///
/// Sources are validated with naga before any wgpu object is created, so a
/// broken file surfaces as a compile error instead of a device error.
pub struct WgpuShaderManager {
    device: wgpu::Device,
    queue: wgpu::Queue,
    paths: RefCell<Vec<PathBuf>>,
    cache: RefCell<HashMap<(String, String), ShaderId>>,
    programs: RefCell<HashMap<ShaderId, QuadProgram>>,
    next_id: Cell<usize>,
}

impl WgpuShaderManager {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            paths: RefCell::new(Vec::new()),
            cache: RefCell::new(HashMap::new()),
            programs: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn quad_draw(&self, shader: ShaderId) -> Option<QuadDraw> {
        self.programs.borrow().get(&shader).map(|p| QuadDraw {
            color: p.color.clone(),
            depth: p.depth.clone(),
            uniforms: p.uniforms.clone(),
            source: p.source,
        })
    }

    fn load_source(&self, file: &str) -> Result<String, String> {
        let file_name = format!("{file}.wgsl");
        for dir in self.paths.borrow().iter() {
            let path = dir.join(&file_name);
            if path.is_file() {
                return fs::read_to_string(&path).map_err(|e| format!("{}: {e}", path.display()));
            }
        }
        Err(format!("effect file '{file_name}' not found in shader paths"))
    }

    fn build_program(
        &self,
        file: &str,
        technique: &str,
        source: &str,
        entry_points: &EntryPoints,
    ) -> QuadProgram {
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(file),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let uniforms = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Quad Uniforms"),
            size: std::mem::size_of::<QuadUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let color = self.quad_pipeline(
            &module,
            technique,
            1,
            wgpu::TextureSampleType::Float { filterable: false },
        );
        let depth_entry = format!("{technique}_depth");
        let depth = entry_points
            .has_fragment(&depth_entry)
            .then(|| self.quad_pipeline(&module, &depth_entry, 2, wgpu::TextureSampleType::Depth));

        QuadProgram {
            color,
            depth,
            uniforms,
            source: None,
        }
    }

    fn quad_pipeline(
        &self,
        module: &wgpu::ShaderModule,
        entry_point: &str,
        texture_binding: u32,
        sample_type: wgpu::TextureSampleType,
    ) -> QuadPipeline {
        let device = &self.device;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Quad Bind Group Layout"),
            entries: &[
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Source target
                wgpu::BindGroupLayoutEntry {
                    binding: texture_binding,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Quad Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(entry_point),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some(QUAD_VERTEX_ENTRY),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some(entry_point),
                targets: &[Some(wgpu::ColorTargetState {
                    format: texture_format(TargetRole::Color.format()),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        QuadPipeline {
            pipeline,
            bind_group_layout,
            texture_binding,
        }
    }
}

impl ShaderManager for WgpuShaderManager {
    fn shader_paths(&self) -> Vec<PathBuf> {
        self.paths.borrow().clone()
    }

    fn add_shader_path(&self, path: &Path) {
        self.paths.borrow_mut().push(path.to_path_buf());
    }

    fn effect_shader(&self, file: &str, technique: &str) -> Result<ShaderId, String> {
        let key = (file.to_string(), technique.to_string());
        if let Some(&id) = self.cache.borrow().get(&key) {
            return Ok(id);
        }

        let source = self.load_source(file)?;
        let entry_points = wgsl::validate_technique(&source, technique)?;
        let program = self.build_program(file, technique, &source, &entry_points);

        let id = ShaderId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.cache.borrow_mut().insert(key, id);
        self.programs.borrow_mut().insert(id, program);
        log::info!("compiled effect '{file}' ({technique})");
        Ok(id)
    }

    fn remove_effect_from_cache(&self, file: &str, technique: &str) {
        let key = (file.to_string(), technique.to_string());
        if let Some(id) = self.cache.borrow_mut().remove(&key) {
            self.programs.borrow_mut().remove(&id);
        }
    }

    fn is_effect_live(&self, shader: ShaderId) -> bool {
        self.programs.borrow().contains_key(&shader)
    }

    fn set_texture_parameter(&self, shader: ShaderId, name: &str, target: TargetId) {
        let mut programs = self.programs.borrow_mut();
        let Some(program) = programs.get_mut(&shader) else {
            return;
        };
        match name {
            SOURCE_TEXTURE_PARAM => program.source = Some(target),
            other => log::debug!("ignoring texture parameter '{other}'"),
        }
    }

    fn set_vec4_parameter(&self, shader: ShaderId, name: &str, value: Vec4) {
        let programs = self.programs.borrow();
        let Some(program) = programs.get(&shader) else {
            return;
        };
        match name {
            CHANNELS_PARAM => {
                let uniforms = QuadUniforms {
                    channels: value.to_array(),
                };
                self.queue
                    .write_buffer(&program.uniforms, 0, bytemuck::cast_slice(&[uniforms]));
            }
            other => log::debug!("ignoring vec4 parameter '{other}'"),
        }
    }
}
