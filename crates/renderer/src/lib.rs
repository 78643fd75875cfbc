//! Renderer crate for Starfield.
//!
//! The crate turns a window into an ambient, theme-aware particle field:
//!
//! ```text
//!   starfield CLI
//!          │ RendererConfig + ThemeCell
//!          ▼
//!   Renderer::run ──▶ winit event loop ──▶ ParticleController ──▶ SceneBackend
//!          ▲                 │                    ▲                  (GpuBackend)
//!          │                 │ pump()             │ channel + waker
//!          │                 └────────────────────┤
//!     theme toggles                      sprite loader thread
//! ```
//!
//! `ParticleController` owns the scene state (camera, cloud, pointer, theme
//! material) and is generic over [`SceneBackend`], so its behaviour can be
//! exercised without a GPU. `GpuBackend` draws the cloud as instanced point
//! sprites into an HDR target and finishes each frame with a bloom chain.

mod backend;
mod controller;
mod gpu;
mod material;
mod scene;
mod sprite;
mod types;
mod window;

use anyhow::Result;
use theme::ThemeCell;

pub use backend::{FrameError, FrameInputs, SceneBackend};
pub use controller::{
    ControllerPhase, Diagnostic, DiagnosticKind, FrameOutcome, ParticleController,
};
pub use gpu::GpuBackend;
pub use material::{BlendMode, Rgb, ThemePreset, ThemePresets};
pub use scene::{
    BloomSettings, CameraSpec, MotionSettings, ParticleCloud, ParticleSpec, PerspectiveCamera,
    PointerState, Viewport,
};
pub use sprite::{
    AssetLoadError, Liveness, SpriteFetch, SpriteImage, SpriteLoad, SpriteSource, Waker,
};
pub use types::{
    Antialiasing, FieldSettings, GpuPowerPreference, RendererConfig, DEFAULT_MAX_PIXEL_RATIO,
};

/// Entry point used by the CLI.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Opens the window and blocks until it is closed. `theme` is shared with
    /// the caller so toggles made in the window reach its subscribers.
    pub fn run(&mut self, theme: ThemeCell) -> Result<()> {
        tracing::info!(
            width = self.config.surface_size.0,
            height = self.config.surface_size.1,
            particles = self.config.field.particles.count,
            sprite = %self.config.sprite,
            theme = %theme.get(),
            "starting particle field"
        );
        window::run_window(self.config.clone(), theme)
    }
}
