//! Configuration module
//!
//! TOML file plus environment overrides

pub mod config;

pub use config::{AzureConfig, Config, D365Config, HttpConfig, RuntimeConfig};
