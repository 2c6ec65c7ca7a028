//! Shared service plumbing
//!
//! Provides the pieces every monitor binary needs:
//! - logging bootstrap (console + daily file)
//! - graceful shutdown signal handling
//! - env/config fallback helpers

pub mod config_loader;
pub mod logging;
pub mod shutdown;

pub use config_loader::get_string_config;
pub use shutdown::{wait_for_shutdown, ShutdownSignal};
