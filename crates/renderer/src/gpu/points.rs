use bytemuck::{Pod, Zeroable};
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::backend::FrameInputs;
use crate::material::{BlendMode, ThemePreset};
use crate::scene::ParticleCloud;
use crate::sprite::SpriteImage;

use super::context::HDR_FORMAT;
use super::shaders::compile_point_shader;
use super::uniforms::PointUniforms;

const VERTICES_PER_POINT: u32 = 6;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PointInstance {
    pub position: [f32; 3],
    pub scale: f32,
}

unsafe impl Zeroable for PointInstance {}
unsafe impl Pod for PointInstance {}

impl PointInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

pub(crate) fn instances(cloud: &ParticleCloud) -> Vec<PointInstance> {
    cloud
        .positions()
        .iter()
        .zip(cloud.scales())
        .map(|(position, scale)| PointInstance {
            position: *position,
            scale: *scale,
        })
        .collect()
}

struct CloudResources {
    instance_buffer: wgpu::Buffer,
    count: u32,
    sprite_bind_group: wgpu::BindGroup,
    _sprite_texture: wgpu::Texture,
}

/// Draws the particle cloud as camera-facing textured quads.
pub(crate) struct PointPass {
    uniforms: PointUniforms,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    sprite_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    additive_pipeline: wgpu::RenderPipeline,
    normal_pipeline: wgpu::RenderPipeline,
    blend: BlendMode,
    cloud: Option<CloudResources>,
}

impl PointPass {
    pub fn new(device: &wgpu::Device, sample_count: u32) -> Self {
        let uniforms = PointUniforms::new();
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("point uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("point uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("point uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let sprite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite layout"),
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
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprite sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("point pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &sprite_layout],
            push_constant_ranges: &[],
        });
        let module = compile_point_shader(device);
        let additive_pipeline = build_pipeline(
            device,
            &pipeline_layout,
            &module,
            sample_count,
            BlendMode::Additive,
        );
        let normal_pipeline = build_pipeline(
            device,
            &pipeline_layout,
            &module,
            sample_count,
            BlendMode::Normal,
        );

        Self {
            uniforms,
            uniform_buffer,
            uniform_bind_group,
            sprite_layout,
            sampler,
            additive_pipeline,
            normal_pipeline,
            blend: BlendMode::Additive,
            cloud: None,
        }
    }

    pub fn install(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        cloud: &ParticleCloud,
        sprite: &SpriteImage,
        material: &ThemePreset,
    ) {
        let instances = instances(cloud);
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("point instances"),
            contents: bytemuck::cast_slice(&instances),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("point sprite"),
                size: wgpu::Extent3d {
                    width: sprite.width(),
                    height: sprite.height(),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            sprite.pixels(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sprite_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite bind group"),
            layout: &self.sprite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        self.cloud = Some(CloudResources {
            instance_buffer,
            count: instances.len() as u32,
            sprite_bind_group,
            _sprite_texture: texture,
        });
        self.apply_material(material);
    }

    pub fn apply_material(&mut self, material: &ThemePreset) {
        self.blend = material.blend;
        self.uniforms.set_material(material);
    }

    pub fn set_frame(&mut self, frame: &FrameInputs) {
        self.uniforms.set_frame(frame);
    }

    pub fn upload(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(cloud) = self.cloud.as_ref().filter(|cloud| cloud.count > 0) else {
            return;
        };
        let pipeline = match self.blend {
            BlendMode::Additive => &self.additive_pipeline,
            BlendMode::Normal => &self.normal_pipeline,
        };
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, &cloud.sprite_bind_group, &[]);
        pass.set_vertex_buffer(0, cloud.instance_buffer.slice(..));
        pass.draw(0..VERTICES_PER_POINT, 0..cloud.count);
    }
}

pub(crate) fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    let color = match mode {
        BlendMode::Additive => wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        BlendMode::Normal => wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    };
    wgpu::BlendState {
        color,
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    sample_count: u32,
    mode: BlendMode,
) -> wgpu::RenderPipeline {
    let label = match mode {
        BlendMode::Additive => "point pipeline (additive)",
        BlendMode::Normal => "point pipeline (normal)",
    };
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_point"),
            buffers: &[PointInstance::layout()],
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
        multisample: wgpu::MultisampleState {
            count: sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_point"),
            targets: &[Some(wgpu::ColorTargetState {
                format: HDR_FORMAT,
                blend: Some(blend_state(mode)),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ParticleSpec;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn instances_pair_positions_with_scales() {
        let cloud = ParticleCloud::generate(
            &ParticleSpec {
                count: 5,
                extent: [2.0, 2.0, 2.0],
            },
            &mut StdRng::seed_from_u64(3),
        );
        let instances = instances(&cloud);
        assert_eq!(instances.len(), 5);
        for (index, instance) in instances.iter().enumerate() {
            assert_eq!(instance.position, cloud.positions()[index]);
            assert_eq!(instance.scale, cloud.scales()[index]);
        }
        assert_eq!(std::mem::size_of::<PointInstance>(), 16);
    }

    #[test]
    fn blend_modes_map_to_expected_factors() {
        let additive = blend_state(BlendMode::Additive);
        assert_eq!(additive.color.dst_factor, wgpu::BlendFactor::One);
        let normal = blend_state(BlendMode::Normal);
        assert_eq!(normal.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert_eq!(normal.color.src_factor, wgpu::BlendFactor::SrcAlpha);
    }
}
