//! LTI tool provider - process entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use lti_tool::{
    cli::{Cli, Command},
    config::Config,
    server::LtiTool,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    // A local .env is a development convenience; absence is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::Serve) | None => run_server(cli).await,
    }
}

async fn run_server(cli: Cli) -> ExitCode {
    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let tool = match LtiTool::new(config) {
        Ok(tool) => tool,
        Err(e) => {
            error!(error = %e, "Failed to initialize tool provider");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tool.run().await {
        error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
