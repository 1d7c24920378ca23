//! WebAudit Common - Shared utilities: logging and configuration
//!
//! This crate provides common functionality used across all WebAudit crates.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigBuilder, EngineSettings, LoggingConfig, ScanSettings};
pub use logging::{init_logging_with_config, LogConfig, LogFormat};
