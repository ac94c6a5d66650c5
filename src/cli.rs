//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// LTI 1.3 Advantage tool provider
#[derive(Parser, Debug)]
#[command(name = "lti-tool")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "LTI_TOOL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "LTI_TOOL_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "LTI_TOOL_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LTI_TOOL_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LTI_TOOL_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the tool provider server (default)
    Serve,
}
