use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::{Antialiasing, SpriteSource};
use theme::ThemeMode;

#[derive(Parser, Debug)]
#[command(
    name = "starfield",
    author,
    version,
    about = "Theme-aware ambient particle field",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Field configuration file (defaults to `starfield.toml` in the config directory).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Point sprite: a file path, an `http(s)://` URL, or `builtin[:SIZE]`.
    #[arg(long, value_name = "PATH|URL|builtin")]
    pub sprite: Option<SpriteSource>,

    /// Initial window size in logical pixels (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Number of particles in the cloud.
    #[arg(long, value_name = "N", value_parser = parse_particles)]
    pub particles: Option<usize>,

    /// Seed for the particle layout; omit for a fresh layout every launch.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Start in this theme for the current session without saving it.
    #[arg(long, value_name = "MODE", value_parser = parse_theme)]
    pub theme: Option<ThemeMode>,

    /// System colour-scheme preference used when no theme has been saved.
    #[arg(
        long,
        value_name = "MODE",
        env = "STARFIELD_SYSTEM_THEME",
        value_parser = parse_theme
    )]
    pub system_theme: Option<ThemeMode>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<Antialiasing>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read or change the saved theme preference.
    Theme(ThemeCommand),
    /// Print resolved directories and files.
    Paths,
}

#[derive(Parser, Debug)]
pub struct ThemeCommand {
    #[command(subcommand)]
    pub action: ThemeAction,
}

#[derive(Subcommand, Debug)]
pub enum ThemeAction {
    /// Print the effective theme.
    Get,
    /// Save a theme preference.
    Set {
        #[arg(value_name = "MODE", value_parser = parse_theme)]
        mode: ThemeMode,
    },
    /// Flip the effective theme and save the result.
    Toggle,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_antialias(value: &str) -> Result<Antialiasing, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("anti-alias mode must not be empty".to_string());
    }

    let normalized = trimmed.to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(Antialiasing::Auto),
        "off" | "none" | "disable" | "disabled" | "0" => Ok(Antialiasing::Off),
        _ => {
            let samples: u32 = normalized.parse().map_err(|_| {
                format!("invalid anti-alias sample count '{trimmed}'; use auto/off or 2/4/8/16")
            })?;

            if samples == 1 {
                return Ok(Antialiasing::Off);
            }

            if !matches!(samples, 2 | 4 | 8 | 16) {
                return Err(format!(
                    "unsupported sample count {samples}; supported values are 2, 4, 8, or 16"
                ));
            }

            Ok(Antialiasing::Samples(samples))
        }
    }
}

pub fn parse_theme(value: &str) -> Result<ThemeMode, String> {
    value.parse::<ThemeMode>().map_err(|err| err.to_string())
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    if width == 0 || height == 0 {
        return Err("window size must be greater than zero".into());
    }
    Ok((width, height))
}

fn parse_particles(value: &str) -> Result<usize, String> {
    let count = value
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("invalid particle count '{}'", value.trim()))?;
    if count == 0 {
        return Err("particle count must be at least 1".into());
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_antialias_modes() {
        assert_eq!(parse_antialias("auto").unwrap(), Antialiasing::Auto);
        assert_eq!(parse_antialias("OFF").unwrap(), Antialiasing::Off);
        assert_eq!(parse_antialias("1").unwrap(), Antialiasing::Off);
        assert_eq!(parse_antialias("4").unwrap(), Antialiasing::Samples(4));
        assert!(parse_antialias("3").is_err());
        assert!(parse_antialias("").is_err());
    }

    #[test]
    fn parses_window_sizes() {
        assert_eq!(parse_size("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_size(" 375 X 812 ").unwrap(), (375, 812));
        assert!(parse_size("0x100").is_err());
        assert!(parse_size("1920").is_err());
        assert!(parse_size("wide x tall").is_err());
    }

    #[test]
    fn parses_theme_names() {
        assert_eq!(parse_theme("dark").unwrap(), ThemeMode::Dark);
        assert_eq!(parse_theme("Light").unwrap(), ThemeMode::Light);
        assert!(parse_theme("sepia").is_err());
    }

    #[test]
    fn rejects_empty_cloud() {
        assert!(parse_particles("0").is_err());
        assert_eq!(parse_particles("2500").unwrap(), 2500);
    }

    #[test]
    fn theme_subcommands_parse() {
        let cli = Cli::try_parse_from(["starfield", "theme", "set", "light"]).unwrap();
        match cli.command {
            Some(Command::Theme(ThemeCommand {
                action: ThemeAction::Set { mode },
            })) => assert_eq!(mode, ThemeMode::Light),
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["starfield", "--particles", "300", "--sprite", "builtin:32"])
            .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.particles, Some(300));
        assert_eq!(cli.run.sprite, Some(SpriteSource::Builtin { size: 32 }));
    }
}
