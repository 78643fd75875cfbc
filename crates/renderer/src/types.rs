use std::time::Duration;

use crate::material::ThemePresets;
use crate::scene::{BloomSettings, CameraSpec, MotionSettings, ParticleSpec};
use crate::sprite::SpriteSource;

/// Default cap on the device pixel ratio used for the drawing buffer.
pub const DEFAULT_MAX_PIXEL_RATIO: f64 = 2.0;

/// Anti-aliasing policy for the scene pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the scene format.
    #[default]
    Auto,
    /// Disable MSAA and render straight into the scene texture.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

/// Scene tunables. Defaults reproduce the stock hero animation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSettings {
    pub particles: ParticleSpec,
    pub camera: CameraSpec,
    pub bloom: BloomSettings,
    pub motion: MotionSettings,
    pub presets: ThemePresets,
    pub max_pixel_ratio: f64,
    /// Fixed RNG seed for reproducible clouds; `None` draws from entropy.
    pub seed: Option<u64>,
    /// How often frame statistics are logged at debug level.
    pub stats_interval: Duration,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            particles: ParticleSpec::default(),
            camera: CameraSpec::default(),
            bloom: BloomSettings::default(),
            motion: MotionSettings::default(),
            presets: ThemePresets::default(),
            max_pixel_ratio: DEFAULT_MAX_PIXEL_RATIO,
            seed: None,
            stats_interval: Duration::from_secs(5),
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial window size in logical pixels.
    pub surface_size: (u32, u32),
    pub title: String,
    pub antialiasing: Antialiasing,
    pub power: GpuPowerPreference,
    pub sprite: SpriteSource,
    pub field: FieldSettings,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            title: "Starfield".to_string(),
            antialiasing: Antialiasing::default(),
            power: GpuPowerPreference::default(),
            sprite: SpriteSource::default(),
            field: FieldSettings::default(),
        }
    }
}
