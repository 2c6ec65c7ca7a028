//! Service Bootstrap and Initialization
//!
//! Command line parsing, configuration loading and logging setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use common::logging::{self, LogConfig};
use errors::{MonitorError, MonitorResult};

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};

/// Env var for the log level when `--log-level` is not given
pub const LOG_LEVEL_ENV: &str = "MONSRV_LOG_LEVEL";

#[derive(Parser, Debug)]
#[command(author, version, about = "Monsrv - Renogy Modbus-TCP monitor")]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Log level or filter directive (overrides the config file)
    #[arg(short = 'l', long, global = true)]
    pub log_level: Option<String>,

    /// Disable colored console output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Validate configuration and profiles, then exit
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Poll every configured device until Ctrl+C
    Run,
    /// List the supported device types
    Profiles,
    /// Write the max charge current of a DC-DC charger
    SetMaxCurrent {
        /// Device id from the configuration
        #[arg(long)]
        device: String,
        /// Limit in amps
        #[arg(long)]
        amps: f64,
    },
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

/// Load the layered configuration named by `--config`
pub fn load_configuration(args: &Args) -> MonitorResult<AppConfig> {
    AppConfig::load(&args.config)
}

/// Level priority: `--log-level` > `MONSRV_LOG_LEVEL` > config file
pub fn effective_log_level(args: &Args, config: &AppConfig) -> String {
    common::get_string_config(
        args.log_level.clone(),
        false,
        LOG_LEVEL_ENV,
        config.logging.level.clone(),
    )
}

/// Initialize logging from CLI flags and the logging section
pub fn initialize_logging(args: &Args, config: &AppConfig) -> MonitorResult<()> {
    let log_dir = logging::init_log_root(config.logging.dir.as_deref()).to_path_buf();

    logging::init_with_config(LogConfig {
        service_name: "monsrv".to_string(),
        log_dir,
        level: effective_log_level(args, config),
        file_enabled: config.logging.file_enabled,
        ansi: !args.no_color,
    })
    .map_err(|e| MonitorError::config(format!("Failed to initialize logging: {}", e)))
}
