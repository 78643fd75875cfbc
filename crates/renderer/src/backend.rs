use std::fmt;

use glam::Mat4;

use crate::material::{Rgb, ThemePreset};
use crate::scene::{ParticleCloud, Viewport};
use crate::sprite::{AssetLoadError, SpriteImage};

/// Per-frame values handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    pub view_projection: Mat4,
    pub model: Mat4,
    /// Camera aspect, used to keep billboards square.
    pub aspect: f32,
    pub elapsed: f32,
}

/// Everything the controller needs from whatever draws the scene.
///
/// The GPU implementation lives in [`crate::gpu::GpuBackend`]; tests drive the
/// controller with a recording implementation instead.
pub trait SceneBackend {
    /// `buffer` is the drawing-buffer size after the pixel-ratio cap.
    fn resize(&mut self, viewport: &Viewport, buffer: (u32, u32));
    fn set_background(&mut self, color: Rgb);
    /// Uploads the cloud and its sprite. A sprite the backend cannot use is
    /// reported as an [`AssetLoadError`] and nothing is installed.
    fn install_cloud(
        &mut self,
        cloud: &ParticleCloud,
        sprite: &SpriteImage,
        material: &ThemePreset,
    ) -> Result<(), AssetLoadError>;
    fn apply_material(&mut self, material: &ThemePreset);
    fn render(&mut self, frame: &FrameInputs) -> Result<(), FrameError>;
    /// Releases every resource. Further calls are no-ops.
    fn dispose(&mut self);
}

#[derive(Debug)]
pub enum FrameError {
    /// Surface must be reconfigured before the next frame.
    SurfaceLost,
    OutOfMemory,
    Timeout,
    Disposed,
    Other(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::SurfaceLost => f.write_str("surface lost or outdated"),
            FrameError::OutOfMemory => f.write_str("surface out of memory"),
            FrameError::Timeout => f.write_str("surface timed out"),
            FrameError::Disposed => f.write_str("renderer resources already released"),
            FrameError::Other(message) => write!(f, "surface error: {message}"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<wgpu::SurfaceError> for FrameError {
    fn from(value: wgpu::SurfaceError) -> Self {
        match value {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => FrameError::SurfaceLost,
            wgpu::SurfaceError::OutOfMemory => FrameError::OutOfMemory,
            wgpu::SurfaceError::Timeout => FrameError::Timeout,
            other => FrameError::Other(format!("{other:?}")),
        }
    }
}
