//! # Cascade Centralized Configuration
//!
//! This crate provides the settings model shared by every Cascade service:
//! the typed settings map handed to a part at start, the per-part setting
//! definitions it is validated against, and the replication settings
//! vocabulary the admin layer speaks.
//!
//! ## Usage
//!
//! ```rust
//! use config::{SettingDefinitions, SettingKind, SettingsMap};
//!
//! let defs = SettingDefinitions::new()
//!     .define("batch_size", SettingKind::Int, true)
//!     .define("log_level", SettingKind::Str, false);
//!
//! let mut settings = SettingsMap::new();
//! settings.insert("batch_size".to_string(), 500.into());
//! defs.validate(&settings).expect("settings are well formed");
//! ```

pub mod replication;
pub mod settings;

// Re-export commonly used types
pub use replication::{apply_default_settings, default_settings, verify_filter_expression};
pub use settings::{SettingDefinitions, SettingKind, SettingValue, SettingsError, SettingsMap};
