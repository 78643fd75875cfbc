use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::backend::FrameInputs;
use crate::material::ThemePreset;
use crate::scene::BloomSettings;

/// Uniform block for the point pass; mirrors `PointUniforms` in WGSL.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PointUniforms {
    pub view_projection: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    /// Linear RGB tint plus opacity.
    pub tint: [f32; 4],
    /// x = point size, y = aspect.
    pub params: [f32; 4],
}

unsafe impl Zeroable for PointUniforms {}
unsafe impl Pod for PointUniforms {}

impl PointUniforms {
    pub fn new() -> Self {
        Self {
            view_projection: Mat4::IDENTITY.to_cols_array_2d(),
            model: Mat4::IDENTITY.to_cols_array_2d(),
            tint: [1.0; 4],
            params: [1.0, 1.0, 0.0, 0.0],
        }
    }

    pub fn set_frame(&mut self, frame: &FrameInputs) {
        self.view_projection = frame.view_projection.to_cols_array_2d();
        self.model = frame.model.to_cols_array_2d();
        self.params[1] = frame.aspect.max(f32::EPSILON);
    }

    pub fn set_material(&mut self, material: &ThemePreset) {
        let [r, g, b] = material.color.to_linear();
        self.tint = [r, g, b, material.opacity.clamp(0.0, 1.0)];
        self.params[0] = material.size;
    }
}

/// Uniform block for one post-processing stage; mirrors `PostParams` in WGSL.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PostParams {
    pub texel_size: [f32; 2],
    pub direction: [f32; 2],
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
    pub _padding: f32,
}

unsafe impl Zeroable for PostParams {}
unsafe impl Pod for PostParams {}

impl PostParams {
    pub fn new(settings: &BloomSettings, source_size: (u32, u32), direction: [f32; 2]) -> Self {
        Self {
            texel_size: [
                1.0 / source_size.0.max(1) as f32,
                1.0 / source_size.1.max(1) as f32,
            ],
            direction,
            threshold: settings.threshold,
            strength: settings.strength,
            radius: settings.radius,
            _padding: 0.0,
        }
    }
}
