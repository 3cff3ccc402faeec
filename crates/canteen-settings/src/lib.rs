//! # canteen-settings
//!
//! Configuration for the canteen notification server, loaded from three
//! layers (in priority order):
//! 1. **Compiled defaults** — [`CanteenSettings::default()`]
//! 2. **Settings file** — `~/.canteen/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables** — `CANTEEN_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
