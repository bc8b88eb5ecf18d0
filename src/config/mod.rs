//! Configuration Module
//!
//! Loads the global configuration that supplies the lowest-precedence
//! variable layer and default runner settings.

pub mod global;

pub use global::{GlobalConfig, CONFIG_ENV_VAR, CONFIG_PATH};
