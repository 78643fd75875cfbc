use std::path::Path;

use anyhow::{Context, Result};
use fieldconfig::{AntialiasSetting, BlendSetting, FieldConfig, ThemeSection};
use renderer::{
    Antialiasing, BlendMode, FieldSettings, RendererConfig, Rgb, SpriteSource, ThemePreset,
};

use crate::cli::RunArgs;
use crate::paths::AppPaths;

/// Reads the field configuration. A missing default file is fine; a missing
/// file named with `--config` is not.
pub fn load_field_config(path: &Path, explicit: bool) -> Result<Option<FieldConfig>> {
    if !path.exists() {
        if explicit {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        tracing::debug!(path = %path.display(), "no field config; using defaults");
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config = FieldConfig::from_toml_str(&contents)
        .with_context(|| format!("invalid config file at {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded field config");
    Ok(Some(config))
}

/// Layers CLI flags over the config file over built-in defaults.
pub fn build_renderer_config(
    args: &RunArgs,
    file: Option<&FieldConfig>,
    paths: &AppPaths,
) -> RendererConfig {
    let mut config = RendererConfig::default();
    if let Some(file) = file {
        apply_field_config(&mut config.field, file);
        if let Some(antialias) = file.antialias {
            config.antialiasing = map_antialias(antialias);
        }
    }

    if let Some(size) = args.size {
        config.surface_size = size;
    }
    if let Some(count) = args.particles {
        config.field.particles.count = count;
    }
    if let Some(seed) = args.seed {
        config.field.seed = Some(seed);
    }
    if let Some(antialias) = args.antialias {
        config.antialiasing = antialias;
    }

    config.sprite = resolve_sprite(
        args.sprite.as_ref(),
        file.and_then(|file| file.sprite.source.as_deref()),
        paths,
    );
    config
}

fn apply_field_config(field: &mut FieldSettings, file: &FieldConfig) {
    if let Some(ratio) = file.max_pixel_ratio {
        field.max_pixel_ratio = f64::from(ratio);
    }
    if let Some(interval) = file.stats_interval {
        field.stats_interval = interval;
    }

    let particles = &file.particles;
    if let Some(count) = particles.count {
        field.particles.count = count as usize;
    }
    if let Some(extent) = particles.extent {
        field.particles.extent = extent;
    }
    if particles.seed.is_some() {
        field.seed = particles.seed;
    }

    let camera = &file.camera;
    if let Some(fov) = camera.fov {
        field.camera.fov_y_degrees = fov;
    }
    if let Some(near) = camera.near {
        field.camera.near = near;
    }
    if let Some(far) = camera.far {
        field.camera.far = far;
    }
    if let Some(distance) = camera.distance {
        field.camera.distance = distance;
    }

    let bloom = &file.bloom;
    if let Some(strength) = bloom.strength {
        field.bloom.strength = strength;
    }
    if let Some(radius) = bloom.radius {
        field.bloom.radius = radius;
    }
    if let Some(threshold) = bloom.threshold {
        field.bloom.threshold = threshold;
    }

    if let Some(spin) = file.motion.spin {
        field.motion.spin = spin;
    }
    if let Some(influence) = file.motion.pointer_influence {
        field.motion.pointer_influence = influence;
    }

    if let Some(dark) = file.themes.dark.as_ref() {
        apply_theme_section(
            &mut field.presets.dark,
            &mut field.presets.dark_background,
            dark,
        );
    }
    if let Some(light) = file.themes.light.as_ref() {
        apply_theme_section(
            &mut field.presets.light,
            &mut field.presets.light_background,
            light,
        );
    }
}

fn apply_theme_section(preset: &mut ThemePreset, background: &mut Rgb, section: &ThemeSection) {
    if let Some(blend) = section.blend {
        preset.blend = match blend {
            BlendSetting::Additive => BlendMode::Additive,
            BlendSetting::Normal => BlendMode::Normal,
        };
    }
    if let Some(color) = section.color {
        preset.color = Rgb::from_hex(color.0);
    }
    if let Some(opacity) = section.opacity {
        preset.opacity = opacity;
    }
    if let Some(size) = section.size {
        preset.size = size;
    }
    if let Some(color) = section.background {
        *background = Rgb::from_hex(color.0);
    }
}

fn map_antialias(setting: AntialiasSetting) -> Antialiasing {
    match setting {
        AntialiasSetting::Auto => Antialiasing::Auto,
        AntialiasSetting::Off => Antialiasing::Off,
        AntialiasSetting::Samples2 => Antialiasing::Samples(2),
        AntialiasSetting::Samples4 => Antialiasing::Samples(4),
        AntialiasSetting::Samples8 => Antialiasing::Samples(8),
        AntialiasSetting::Samples16 => Antialiasing::Samples(16),
    }
}

/// Picks the sprite source. Relative file paths from the config file are
/// resolved against the data directory.
fn resolve_sprite(
    cli: Option<&SpriteSource>,
    configured: Option<&str>,
    paths: &AppPaths,
) -> SpriteSource {
    if let Some(source) = cli {
        return source.clone();
    }
    if let Some(raw) = configured {
        let source = raw.parse::<SpriteSource>().unwrap_or_default();
        return match source {
            SpriteSource::File(path) if path.is_relative() => {
                SpriteSource::File(paths.data_dir().join(path))
            }
            other => other,
        };
    }
    let bundled = paths.default_sprite();
    if bundled.is_file() {
        SpriteSource::File(bundled)
    } else {
        SpriteSource::default()
    }
}
