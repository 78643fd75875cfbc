//! Process-wide light/dark theme flag.
//!
//! The flag is owned by the application, not by the renderer. Consumers get a
//! cloneable [`ThemeCell`] handle, read the current [`ThemeMode`], and register
//! callbacks that fire whenever the mode actually changes:
//!
//! ```text
//!   persisted preference ──┐
//!                          ├─▶ resolve_initial ─▶ ThemeCell ──notify──▶ subscribers
//!   system preference ─────┘          ▲
//!                                     │ set()/toggle()
//!        ThemeWatcher (file edits) ───┤
//!        in-window toggle ────────────┘
//! ```

mod cell;
mod mode;
mod preference;
mod watch;

pub use cell::{Subscription, ThemeCell};
pub use mode::{ThemeError, ThemeMode};
pub use preference::{parse_preference, resolve_initial};
pub use watch::ThemeWatcher;
