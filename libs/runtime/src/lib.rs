//! Process-level plumbing for the server: layered configuration, logging, signals.

pub mod config;
pub mod home_dir;
pub mod logging;
pub mod shutdown;

pub use config::{default_logging_config, AppConfig, CliArgs, LoggingConfig, Section, ServerConfig};
pub use shutdown::wait_for_shutdown;
