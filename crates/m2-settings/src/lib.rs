//! # m2-settings
//!
//! Configuration for the M2 gateway, loaded from three layers (in priority
//! order):
//! 1. **Compiled defaults**: [`GatewaySettings::default()`]
//! 2. **Settings file**: `~/.m2/gateway.json` or an explicit path
//!    (deep-merged over defaults, camelCase keys)
//! 3. **Environment variables**: `M2_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    read_settings_file, settings_path, validate,
};
pub use types::*;
