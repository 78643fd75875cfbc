mod cli;
mod paths;
mod run;
mod settings;
mod state;

use anyhow::Result;
use cli::{Command, ThemeAction};
use paths::AppPaths;
use state::{save_theme, AppState};
use theme::{resolve_initial, ThemeMode};

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Theme(theme_cmd)) => {
            handle_theme_command(theme_cmd.action, cli.run.system_theme)
        }
        Some(Command::Paths) => run_paths(),
        None => run::run(cli.run),
    }
}

fn handle_theme_command(action: ThemeAction, system_theme: Option<ThemeMode>) -> Result<()> {
    let paths = AppPaths::discover()?;
    let state_path = paths.state_file();
    let state = AppState::load_or_default(&state_path)?;
    let effective = resolve_initial(
        state.theme.as_deref(),
        run::system_prefers_dark(system_theme),
    );

    match action {
        ThemeAction::Get => {
            if state.saved_theme().is_some() {
                println!("{effective}");
            } else {
                println!("{effective} (system)");
            }
        }
        ThemeAction::Set { mode } => {
            save_theme(&state_path, mode)?;
            println!("{mode}");
        }
        ThemeAction::Toggle => {
            let next = effective.toggle();
            save_theme(&state_path, next)?;
            println!("{next}");
        }
    }
    Ok(())
}

fn run_paths() -> Result<()> {
    let paths = AppPaths::discover()?;
    println!("Starfield directories:");
    println!("  config:  {}", paths.config_dir().display());
    println!("  data:    {}", paths.data_dir().display());
    println!("  field:   {}", paths.config_file().display());
    println!("  state:   {}", paths.state_file().display());
    let sprite = paths.default_sprite();
    let status = if sprite.is_file() {
        "present"
    } else {
        "missing; builtin glow used"
    };
    println!("  sprite:  {} ({status})", sprite.display());
    Ok(())
}
