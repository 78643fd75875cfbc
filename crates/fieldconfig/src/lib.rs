use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Sparse particle-field configuration. Every value is optional; callers
/// layer it over their own defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub stats_interval: Option<Duration>,
    #[serde(default)]
    pub max_pixel_ratio: Option<f32>,
    #[serde(default, deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<AntialiasSetting>,
    #[serde(default)]
    pub particles: ParticlesSection,
    #[serde(default)]
    pub camera: CameraSection,
    #[serde(default)]
    pub bloom: BloomSection,
    #[serde(default)]
    pub motion: MotionSection,
    #[serde(default)]
    pub sprite: SpriteSection,
    #[serde(default)]
    pub themes: ThemesSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParticlesSection {
    pub count: Option<u32>,
    pub extent: Option<[f32; 3]>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CameraSection {
    pub fov: Option<f32>,
    pub near: Option<f32>,
    pub far: Option<f32>,
    pub distance: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BloomSection {
    pub strength: Option<f32>,
    pub radius: Option<f32>,
    pub threshold: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MotionSection {
    pub spin: Option<[f32; 2]>,
    pub pointer_influence: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpriteSection {
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThemesSection {
    pub dark: Option<ThemeSection>,
    pub light: Option<ThemeSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThemeSection {
    pub blend: Option<BlendSetting>,
    pub color: Option<HexColor>,
    pub opacity: Option<f32>,
    pub size: Option<f32>,
    pub background: Option<HexColor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendSetting {
    Additive,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples2,
    Samples4,
    Samples8,
    Samples16,
}

impl AntialiasSetting {
    pub fn from_samples(samples: u32) -> Option<Self> {
        match samples {
            0 | 1 => Some(Self::Off),
            2 => Some(Self::Samples2),
            4 => Some(Self::Samples4),
            8 => Some(Self::Samples8),
            16 => Some(Self::Samples16),
            _ => None,
        }
    }
}

/// `0xRRGGBB` color written as `"#2563eb"`, `"2563eb"`, `"0x2563eb"`, or an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor(pub u32);

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Str(String),
            Num(i64),
        }

        match Helper::deserialize(deserializer)? {
            Helper::Str(raw) => parse_hex_color(&raw).map(HexColor).map_err(de::Error::custom),
            Helper::Num(value) => {
                if !(0..=0xFF_FFFF).contains(&value) {
                    return Err(de::Error::custom(format!(
                        "color {value:#x} is outside 0x000000..=0xffffff"
                    )));
                }
                Ok(HexColor(value as u32))
            }
        }
    }
}

pub fn parse_hex_color(raw: &str) -> Result<u32, String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix("0x"))
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.len() != 6 {
        return Err(format!("color '{trimmed}' must have six hex digits"));
    }
    u32::from_str_radix(digits, 16).map_err(|_| format!("color '{trimmed}' is not valid hex"))
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Duration::try_from_secs_f64(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_antialias(&raw).map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            let raw = value.to_string();
            Some(parse_antialias(&raw).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

fn parse_antialias(raw: &str) -> Result<AntialiasSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(AntialiasSetting::Off),
        "2" => Ok(AntialiasSetting::Samples2),
        "4" => Ok(AntialiasSetting::Samples4),
        "8" => Ok(AntialiasSetting::Samples8),
        "16" => Ok(AntialiasSetting::Samples16),
        other => Err(format!("invalid antialias setting '{other}'")),
    }
}

const MAX_PARTICLES: u32 = 1_000_000;

fn default_version() -> u32 {
    1
}

impl FieldConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FieldConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        if let Some(ratio) = self.max_pixel_ratio {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(ConfigError::Invalid(
                    "max_pixel_ratio must be a positive number".into(),
                ));
            }
        }

        if let Some(interval) = self.stats_interval {
            if interval.is_zero() {
                return Err(ConfigError::Invalid("stats_interval must be > 0".into()));
            }
        }

        if let Some(count) = self.particles.count {
            if count == 0 || count > MAX_PARTICLES {
                return Err(ConfigError::Invalid(format!(
                    "particles.count must be between 1 and {MAX_PARTICLES}"
                )));
            }
        }
        if let Some(extent) = self.particles.extent {
            if extent.iter().any(|axis| !axis.is_finite() || *axis <= 0.0) {
                return Err(ConfigError::Invalid(
                    "particles.extent values must be positive".into(),
                ));
            }
        }

        if let Some(fov) = self.camera.fov {
            if !(fov > 0.0 && fov < 180.0) {
                return Err(ConfigError::Invalid(
                    "camera.fov must be between 0 and 180 degrees".into(),
                ));
            }
        }
        let near = self.camera.near.unwrap_or(0.1);
        let far = self.camera.far.unwrap_or(1000.0);
        if !(near > 0.0) || !(far > near) {
            return Err(ConfigError::Invalid(format!(
                "camera planes must satisfy 0 < near < far (near={near}, far={far})"
            )));
        }
        if let Some(distance) = self.camera.distance {
            if !distance.is_finite() || distance <= 0.0 {
                return Err(ConfigError::Invalid("camera.distance must be > 0".into()));
            }
        }

        if let Some(strength) = self.bloom.strength {
            if !strength.is_finite() || strength < 0.0 {
                return Err(ConfigError::Invalid("bloom.strength must be >= 0".into()));
            }
        }
        if let Some(radius) = self.bloom.radius {
            if !(0.0..=1.0).contains(&radius) {
                return Err(ConfigError::Invalid(
                    "bloom.radius must be between 0 and 1".into(),
                ));
            }
        }
        if let Some(threshold) = self.bloom.threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(ConfigError::Invalid("bloom.threshold must be >= 0".into()));
            }
        }

        if let Some(spin) = self.motion.spin {
            if spin.iter().any(|value| !value.is_finite()) {
                return Err(ConfigError::Invalid("motion.spin must be finite".into()));
            }
        }
        if let Some(influence) = self.motion.pointer_influence {
            if !influence.is_finite() {
                return Err(ConfigError::Invalid(
                    "motion.pointer_influence must be finite".into(),
                ));
            }
        }

        if let Some(source) = &self.sprite.source {
            if source.trim().is_empty() {
                return Err(ConfigError::Invalid("sprite.source must not be empty".into()));
            }
        }

        for (name, theme) in [("dark", &self.themes.dark), ("light", &self.themes.light)] {
            let Some(theme) = theme else {
                continue;
            };
            if let Some(opacity) = theme.opacity {
                if !(0.0..=1.0).contains(&opacity) {
                    return Err(ConfigError::Invalid(format!(
                        "themes.{name}.opacity must be between 0 and 1"
                    )));
                }
            }
            if let Some(size) = theme.size {
                if !size.is_finite() || size <= 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "themes.{name}.size must be > 0"
                    )));
                }
            }
        }

        Ok(())
    }
}
