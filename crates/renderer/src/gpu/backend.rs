use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::backend::{FrameError, FrameInputs, SceneBackend};
use crate::material::{Rgb, ThemePreset};
use crate::scene::{BloomSettings, ParticleCloud, Viewport};
use crate::sprite::{AssetLoadError, SpriteImage};
use crate::types::{Antialiasing, GpuPowerPreference};

use super::bloom::BloomChain;
use super::context::GpuContext;
use super::points::PointPass;

struct GpuResources {
    context: GpuContext,
    points: PointPass,
    bloom: BloomChain,
}

/// `wgpu` implementation of [`SceneBackend`].
pub struct GpuBackend {
    resources: Option<GpuResources>,
    background: Rgb,
}

impl GpuBackend {
    pub fn new<T>(
        target: &T,
        surface_size: PhysicalSize<u32>,
        buffer: (u32, u32),
        antialiasing: Antialiasing,
        power: GpuPowerPreference,
        bloom: BloomSettings,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, surface_size, antialiasing, power)?;
        let points = PointPass::new(&context.device, context.sample_count);
        let bloom = BloomChain::new(
            &context.device,
            &context.queue,
            context.surface_format,
            context.sample_count,
            buffer,
            bloom,
        );
        tracing::info!(
            surface_width = context.size.width,
            surface_height = context.size.height,
            buffer_width = buffer.0,
            buffer_height = buffer.1,
            sample_count = context.sample_count,
            format = ?context.surface_format,
            "GPU backend ready"
        );
        Ok(Self {
            resources: Some(GpuResources {
                context,
                points,
                bloom,
            }),
            background: Rgb::from_hex(0x000000),
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.resources.is_none()
    }
}

impl SceneBackend for GpuBackend {
    fn resize(&mut self, viewport: &Viewport, buffer: (u32, u32)) {
        let Some(resources) = self.resources.as_mut() else {
            return;
        };
        if !resources.context.fits(buffer) {
            tracing::warn!(
                width = buffer.0,
                height = buffer.1,
                max = resources.context.max_texture_dimension,
                "drawing buffer exceeds GPU limits; keeping previous size"
            );
            return;
        }
        let (width, height) = viewport.physical_size();
        resources.context.resize(PhysicalSize::new(width, height));
        resources
            .bloom
            .resize(&resources.context.device, &resources.context.queue, buffer);
    }

    fn set_background(&mut self, color: Rgb) {
        self.background = color;
    }

    fn install_cloud(
        &mut self,
        cloud: &ParticleCloud,
        sprite: &SpriteImage,
        material: &ThemePreset,
    ) -> Result<(), AssetLoadError> {
        let Some(resources) = self.resources.as_mut() else {
            return Ok(());
        };
        if !resources.context.fits((sprite.width(), sprite.height())) {
            return Err(AssetLoadError::TooLarge {
                width: sprite.width(),
                height: sprite.height(),
                max: resources.context.max_texture_dimension,
            });
        }
        resources.points.install(
            &resources.context.device,
            &resources.context.queue,
            cloud,
            sprite,
            material,
        );
        Ok(())
    }

    fn apply_material(&mut self, material: &ThemePreset) {
        if let Some(resources) = self.resources.as_mut() {
            resources.points.apply_material(material);
        }
    }

    fn render(&mut self, frame: &FrameInputs) -> Result<(), FrameError> {
        let resources = self.resources.as_mut().ok_or(FrameError::Disposed)?;
        let surface_texture = resources.context.surface.get_current_texture()?;
        let output = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        resources.points.set_frame(frame);
        resources.points.upload(&resources.context.queue);

        let [r, g, b] = self.background.to_linear();
        let clear = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        };

        let mut encoder =
            resources
                .context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene pass"),
                color_attachments: &[Some(resources.bloom.scene_attachment(clear))],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            resources.points.draw(&mut pass);
        }
        resources.bloom.encode(&mut encoder, &output);

        resources
            .context
            .queue
            .submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    fn dispose(&mut self) {
        if let Some(resources) = self.resources.take() {
            let sizes = resources.bloom.sizes();
            drop(resources);
            tracing::debug!(
                scene_width = sizes.scene.0,
                scene_height = sizes.scene.1,
                "GPU resources released"
            );
        }
    }
}
