use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use renderer::Renderer;
use theme::{resolve_initial, Subscription, ThemeCell, ThemeMode, ThemeWatcher};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;
use crate::settings::{build_renderer_config, load_field_config};
use crate::state::{save_theme, AppState};

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    fs::create_dir_all(paths.config_dir()).with_context(|| {
        format!(
            "failed to create config directory at {}",
            paths.config_dir().display()
        )
    })?;
    tracing::debug!(
        config = %paths.config_dir().display(),
        data = %paths.data_dir().display(),
        "resolved starfield paths"
    );

    let config_path = args.config.clone().unwrap_or_else(|| paths.config_file());
    let field_config = load_field_config(&config_path, args.config.is_some())?;
    let renderer_config = build_renderer_config(&args, field_config.as_ref(), &paths);

    let state_path = paths.state_file();
    let state = load_state_lenient(&state_path);
    let initial = match args.theme {
        Some(mode) => {
            tracing::info!(theme = %mode, "theme overridden for this session");
            mode
        }
        None => resolve_initial(state.theme.as_deref(), system_prefers_dark(args.system_theme)),
    };
    let cell = ThemeCell::new(initial);

    let _persist = persist_on_change(&cell, state_path.clone());
    let _watcher = match ThemeWatcher::watch(&state_path, cell.clone(), read_saved_theme) {
        Ok(watcher) => {
            tracing::debug!(path = %watcher.path().display(), "watching theme preference");
            Some(watcher)
        }
        Err(err) => {
            tracing::warn!(error = %err, "theme preference changes will not be picked up live");
            None
        }
    };

    let mut renderer = Renderer::new(renderer_config);
    renderer.run(cell)
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// System colour-scheme preference. An explicit `--system-theme` (or
/// `STARFIELD_SYSTEM_THEME`) wins; otherwise `GTK_THEME` is consulted.
pub fn system_prefers_dark(explicit: Option<ThemeMode>) -> bool {
    if let Some(mode) = explicit {
        return mode.is_dark();
    }
    gtk_theme_is_dark(env::var("GTK_THEME").ok().as_deref())
}

fn gtk_theme_is_dark(value: Option<&str>) -> bool {
    match value {
        Some(name) => {
            let name = name.trim().to_ascii_lowercase();
            name.ends_with(":dark") || name.ends_with("-dark")
        }
        None => false,
    }
}

/// A corrupt state file must not keep the window from opening.
fn load_state_lenient(path: &Path) -> AppState {
    match AppState::load_or_default(path) {
        Ok(state) => state,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "ignoring unreadable state file");
            AppState::default()
        }
    }
}

fn read_saved_theme(path: &Path) -> Option<ThemeMode> {
    AppState::load_or_default(path)
        .ok()
        .and_then(|state| state.saved_theme())
}

/// Writes every theme change back to the state file. Notifications from
/// different threads may arrive out of order, so the cell's current value is
/// saved rather than the notified one.
fn persist_on_change(cell: &ThemeCell, state_path: PathBuf) -> Subscription {
    let current = cell.clone();
    cell.subscribe(move |_| {
        if let Err(err) = save_theme(&state_path, current.get()) {
            tracing::warn!(error = %format!("{err:#}"), "failed to save theme preference");
        }
    })
}
