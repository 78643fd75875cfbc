use theme::ThemeMode;

/// 24-bit sRGB colour stored as `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u32);

impl Rgb {
    pub const fn from_hex(hex: u32) -> Self {
        Self(hex & 0x00ff_ffff)
    }

    pub const fn hex(self) -> u32 {
        self.0
    }

    /// Gamma-encoded channels in `[0, 1]`.
    pub fn components(self) -> [f32; 3] {
        let r = ((self.0 >> 16) & 0xff) as f32 / 255.0;
        let g = ((self.0 >> 8) & 0xff) as f32 / 255.0;
        let b = (self.0 & 0xff) as f32 / 255.0;
        [r, g, b]
    }

    /// Linear-light channels, ready for blending in an HDR target.
    pub fn to_linear(self) -> [f32; 3] {
        self.components().map(srgb_to_linear)
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

fn srgb_to_linear(channel: f32) -> f32 {
    if channel <= 0.04045 {
        channel / 12.92
    } else {
        ((channel + 0.055) / 1.055).powf(2.4)
    }
}

/// How point fragments combine with what is already in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Source is added to the destination; overlapping points brighten.
    Additive,
    /// Standard alpha-over compositing.
    Normal,
}

/// Point material values for one theme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemePreset {
    pub blend: BlendMode,
    pub color: Rgb,
    pub opacity: f32,
    pub size: f32,
}

/// Per-theme material and background values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemePresets {
    pub dark: ThemePreset,
    pub light: ThemePreset,
    pub dark_background: Rgb,
    pub light_background: Rgb,
}

impl ThemePresets {
    pub fn preset_for(&self, mode: ThemeMode) -> ThemePreset {
        match mode {
            ThemeMode::Dark => self.dark,
            ThemeMode::Light => self.light,
        }
    }

    pub fn background_for(&self, mode: ThemeMode) -> Rgb {
        match mode {
            ThemeMode::Dark => self.dark_background,
            ThemeMode::Light => self.light_background,
        }
    }
}

impl Default for ThemePresets {
    fn default() -> Self {
        Self {
            dark: ThemePreset {
                blend: BlendMode::Additive,
                color: Rgb::from_hex(0x2563eb),
                opacity: 0.9,
                size: 2.5,
            },
            light: ThemePreset {
                blend: BlendMode::Normal,
                color: Rgb::from_hex(0x3b82f6),
                opacity: 0.8,
                size: 2.2,
            },
            dark_background: Rgb::from_hex(0x0a0a0a),
            light_background: Rgb::from_hex(0xfffada),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_components_round_trip_through_display() {
        let color = Rgb::from_hex(0x2563eb);
        assert_eq!(color.to_string(), "#2563eb");
        let [r, g, b] = color.components();
        assert!((r - 0x25 as f32 / 255.0).abs() < 1e-6);
        assert!((g - 0x63 as f32 / 255.0).abs() < 1e-6);
        assert!((b - 0xeb as f32 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn linear_conversion_preserves_extremes() {
        assert_eq!(Rgb::from_hex(0x000000).to_linear(), [0.0, 0.0, 0.0]);
        let white = Rgb::from_hex(0xffffff).to_linear();
        assert!(white.iter().all(|c| (c - 1.0).abs() < 1e-5));
        let mid = Rgb::from_hex(0x808080).to_linear()[0];
        assert!(mid > 0.2 && mid < 0.23, "mid grey was {mid}");
    }

    #[test]
    fn presets_follow_theme() {
        let presets = ThemePresets::default();
        let dark = presets.preset_for(ThemeMode::Dark);
        assert_eq!(dark.blend, BlendMode::Additive);
        assert_eq!(dark.color, Rgb::from_hex(0x2563eb));
        let light = presets.preset_for(ThemeMode::Light);
        assert_eq!(light.blend, BlendMode::Normal);
        assert_eq!(light.size, 2.2);
        assert_eq!(presets.background_for(ThemeMode::Light), Rgb::from_hex(0xfffada));
        assert_eq!(presets.background_for(ThemeMode::Dark), Rgb::from_hex(0x0a0a0a));
    }
}
