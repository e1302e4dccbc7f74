//! Built-in pipelines of the wgpu host: the test scene and the final blit.

use crate::backend::gpu::GpuContext;
use crate::backend::targets::texture_format;
use crate::render_targets::TargetRole;

const TEST_SCENE_SHADER: &str = include_str!("../../shaders/testScene.wgsl");
const PRESENT_SHADER: &str = include_str!("../../shaders/present.wgsl");

/// Instances of the test scene drawn by each scene filter.
pub const SHADED_INSTANCES: std::ops::Range<u32> = 0..3;
pub const UI_INSTANCES: std::ops::Range<u32> = 3..4;

/// Pipelines the host owns, independent of the override's effect shaders.
pub struct HostPipelines {
    /// Shaded items into Color + AuxiliaryNormals with depth.
    pub scene: wgpu::RenderPipeline,
    /// UI items into Color with depth.
    pub ui: wgpu::RenderPipeline,
    /// Colour target to the window surface.
    pub present: wgpu::RenderPipeline,
    pub present_layout: wgpu::BindGroupLayout,
    pub sampler: wgpu::Sampler,
}

impl HostPipelines {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Test Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(TEST_SCENE_SHADER.into()),
        });

        let scene_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Test Scene Pipeline Layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });

        let color_target = wgpu::ColorTargetState {
            format: texture_format(TargetRole::Color.format()),
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        };
        // 32-bit float targets are not blendable.
        let normals_target = wgpu::ColorTargetState {
            format: texture_format(TargetRole::AuxiliaryNormals.format()),
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        };

        let scene = scene_pipeline(
            device,
            &scene_layout,
            &scene_shader,
            "fs_main",
            &[Some(color_target.clone()), Some(normals_target)],
        );
        let ui = scene_pipeline(
            device,
            &scene_layout,
            &scene_shader,
            "fs_ui",
            &[Some(color_target)],
        );

        let present_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Present Shader"),
            source: wgpu::ShaderSource::Wgsl(PRESENT_SHADER.into()),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Present Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let present_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Present Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let present_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Present Pipeline Layout"),
                bind_group_layouts: &[&present_layout],
                push_constant_ranges: &[],
            });

        let present = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Present Pipeline"),
            layout: Some(&present_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &present_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &present_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.surface_format(),
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

        Self {
            scene,
            ui,
            present,
            present_layout,
            sampler,
        }
    }
}

fn scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    fragment_entry: &str,
    targets: &[Option<wgpu::ColorTargetState>],
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(fragment_entry),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: texture_format(TargetRole::Depth.format()),
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
