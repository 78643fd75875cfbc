use crate::scene::BloomSettings;

use super::context::HDR_FORMAT;
use super::shaders::compile_post_shader;
use super::uniforms::PostParams;

const STAGE_THRESHOLD: usize = 0;
const STAGE_BLUR_H: usize = 1;
const STAGE_BLUR_V: usize = 2;
const STAGE_COMPOSITE: usize = 3;
const STAGE_COUNT: usize = 4;

/// Texture sizes used by the chain for a given drawing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TargetSizes {
    pub scene: (u32, u32),
    /// High-pass and blur targets run at half resolution.
    pub half: (u32, u32),
}

pub(crate) fn target_sizes(buffer: (u32, u32)) -> TargetSizes {
    let scene = (buffer.0.max(1), buffer.1.max(1));
    TargetSizes {
        scene,
        half: ((scene.0 / 2).max(1), (scene.1 / 2).max(1)),
    }
}

struct RenderTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl RenderTarget {
    fn new(
        device: &wgpu::Device,
        label: &str,
        size: (u32, u32),
        sample_count: u32,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: HDR_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

struct Targets {
    scene: RenderTarget,
    scene_msaa: Option<RenderTarget>,
    bright: RenderTarget,
    blur: RenderTarget,
}

impl Targets {
    fn new(device: &wgpu::Device, sizes: TargetSizes, sample_count: u32) -> Self {
        let sampled = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let scene_msaa = (sample_count > 1).then(|| {
            RenderTarget::new(
                device,
                "bloom scene msaa",
                sizes.scene,
                sample_count,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            )
        });
        Self {
            scene: RenderTarget::new(device, "bloom scene", sizes.scene, 1, sampled),
            scene_msaa,
            bright: RenderTarget::new(device, "bloom bright", sizes.half, 1, sampled),
            blur: RenderTarget::new(device, "bloom blur", sizes.half, 1, sampled),
        }
    }
}

/// Scene target plus the high-pass, blur and composite stages that turn it
/// into the presented frame.
pub(crate) struct BloomChain {
    settings: BloomSettings,
    sample_count: u32,
    sizes: TargetSizes,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    threshold_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    params: Vec<wgpu::Buffer>,
    targets: Targets,
    bind_groups: Vec<wgpu::BindGroup>,
}

impl BloomChain {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
        buffer: (u32, u32),
        settings: BloomSettings,
    ) -> Self {
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom layout"),
            entries: &[
                texture_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(3),
            ],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("bloom sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bloom pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let module = compile_post_shader(device);
        let threshold_pipeline = build_stage(
            device,
            &pipeline_layout,
            &module,
            "fs_threshold",
            HDR_FORMAT,
        );
        let blur_pipeline = build_stage(device, &pipeline_layout, &module, "fs_blur", HDR_FORMAT);
        let composite_pipeline = build_stage(
            device,
            &pipeline_layout,
            &module,
            "fs_composite",
            surface_format,
        );

        let params = (0..STAGE_COUNT)
            .map(|stage| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("bloom params #{stage}")),
                    size: std::mem::size_of::<PostParams>() as wgpu::BufferAddress,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .collect();

        let sizes = target_sizes(buffer);
        let targets = Targets::new(device, sizes, sample_count);
        let mut chain = Self {
            settings,
            sample_count,
            sizes,
            layout,
            sampler,
            threshold_pipeline,
            blur_pipeline,
            composite_pipeline,
            params,
            targets,
            bind_groups: Vec::new(),
        };
        chain.bind_groups = chain.build_bind_groups(device);
        chain.write_params(queue);
        chain
    }

    pub fn sizes(&self) -> TargetSizes {
        self.sizes
    }

    /// Recreates every target for the new drawing buffer.
    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, buffer: (u32, u32)) {
        let sizes = target_sizes(buffer);
        if sizes == self.sizes {
            return;
        }
        self.sizes = sizes;
        self.targets = Targets::new(device, sizes, self.sample_count);
        self.bind_groups = self.build_bind_groups(device);
        self.write_params(queue);
        tracing::debug!(
            scene_width = sizes.scene.0,
            scene_height = sizes.scene.1,
            bloom_width = sizes.half.0,
            bloom_height = sizes.half.1,
            "bloom targets resized"
        );
    }

    /// Colour attachment for the scene pass, cleared to `clear`.
    pub fn scene_attachment(&self, clear: wgpu::Color) -> wgpu::RenderPassColorAttachment<'_> {
        let (view, resolve_target) = match self.targets.scene_msaa.as_ref() {
            Some(msaa) => (&msaa.view, Some(&self.targets.scene.view)),
            None => (&self.targets.scene.view, None),
        };
        wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(clear),
                store: wgpu::StoreOp::Store,
            },
        }
    }

    /// High-pass, blur both ways, then composite onto `output`.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        run_stage(
            encoder,
            "bloom threshold",
            &self.threshold_pipeline,
            &self.bind_groups[STAGE_THRESHOLD],
            &self.targets.bright.view,
        );
        run_stage(
            encoder,
            "bloom blur horizontal",
            &self.blur_pipeline,
            &self.bind_groups[STAGE_BLUR_H],
            &self.targets.blur.view,
        );
        run_stage(
            encoder,
            "bloom blur vertical",
            &self.blur_pipeline,
            &self.bind_groups[STAGE_BLUR_V],
            &self.targets.bright.view,
        );
        run_stage(
            encoder,
            "bloom composite",
            &self.composite_pipeline,
            &self.bind_groups[STAGE_COMPOSITE],
            output,
        );
    }

    fn build_bind_groups(&self, device: &wgpu::Device) -> Vec<wgpu::BindGroup> {
        // (source, secondary) per stage; the vertical blur writes back into `bright`.
        let sources = [
            (&self.targets.scene.view, &self.targets.scene.view),
            (&self.targets.bright.view, &self.targets.bright.view),
            (&self.targets.blur.view, &self.targets.blur.view),
            (&self.targets.scene.view, &self.targets.bright.view),
        ];
        sources
            .into_iter()
            .zip(&self.params)
            .enumerate()
            .map(|(stage, ((source, secondary), params))| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("bloom bind group #{stage}")),
                    layout: &self.layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(source),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: params.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::TextureView(secondary),
                        },
                    ],
                })
            })
            .collect()
    }

    fn write_params(&self, queue: &wgpu::Queue) {
        let stages = stage_params(&self.settings, self.sizes);
        for (buffer, params) in self.params.iter().zip(stages.iter()) {
            queue.write_buffer(buffer, 0, bytemuck::bytes_of(params));
        }
    }
}

/// Uniforms for threshold, horizontal blur, vertical blur and composite.
pub(crate) fn stage_params(settings: &BloomSettings, sizes: TargetSizes) -> [PostParams; STAGE_COUNT] {
    [
        PostParams::new(settings, sizes.scene, [0.0, 0.0]),
        PostParams::new(settings, sizes.half, [1.0, 0.0]),
        PostParams::new(settings, sizes.half, [0.0, 1.0]),
        PostParams::new(settings, sizes.half, [0.0, 0.0]),
    ]
}

fn run_stage(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    target: &wgpu::TextureView,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

fn build_stage(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    entry_point: &str,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(entry_point),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(entry_point),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}
