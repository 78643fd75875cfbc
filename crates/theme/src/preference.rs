use crate::mode::ThemeMode;

/// Interprets a persisted preference value. Anything other than `dark` or
/// `light` counts as "no preference".
pub fn parse_preference(saved: Option<&str>) -> Option<ThemeMode> {
    saved.and_then(|value| value.parse().ok())
}

/// Picks the startup theme: an explicit saved preference wins, otherwise the
/// system preference decides.
pub fn resolve_initial(saved: Option<&str>, system_prefers_dark: bool) -> ThemeMode {
    match parse_preference(saved) {
        Some(mode) => mode,
        None => ThemeMode::from_dark(system_prefers_dark),
    }
}
