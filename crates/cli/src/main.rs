//! Connector CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Load configuration**: defaults, `--config` file, `CONNECTOR_*`
//!    environment variables, then command-line flags.
//! 2. **Wire observability**: `tracing-subscriber` with a plain or JSON
//!    formatter and, when configured, an OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: a [`ReqwestTransport`] injected into the
//!    [`Connector`] compiled from the TOML definition.
//! 4. **Run the command**: `describe` or `execute`.

mod args;
mod config;
mod observability;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use connector::{Connector, ConnectorError, FailureOrigin};
use http_transport::ReqwestTransport;
use serde_json::json;
use tracing::info;

use crate::args::{Cli, Command, ExecuteArgs};
use crate::config::CliConfig;

const EXIT_LOCAL_FAILURE: u8 = 2;
const EXIT_REMOTE_FAILURE: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = CliConfig::load(cli.config.as_deref(), |key| std::env::var(key).ok())?;
    if let Some(definition) = cli.definition {
        config.definition = definition;
    }
    if let Some(format) = cli.log_format {
        config.log.format = format;
    }

    let _telemetry = observability::init(&config.log)?;

    let source = std::fs::read_to_string(&config.definition).with_context(|| {
        format!(
            "Failed to read connector definition {}",
            config.definition.display()
        )
    })?;
    let transport = ReqwestTransport::new(&config.transport)?;
    let connector = Connector::from_toml_str(&source, Arc::new(transport))
        .with_context(|| format!("Failed to load {}", config.definition.display()))?;
    info!(
        connector = %connector.name(),
        version = connector.version(),
        operations = connector.registry().len(),
        "Connector loaded"
    );

    match cli.command {
        Command::Describe => {
            println!("{}", serde_json::to_string_pretty(&connector.describe())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Execute(args) => execute(&connector, &args).await,
    }
}

async fn execute(connector: &Connector, args: &ExecuteArgs) -> Result<ExitCode> {
    let bundle = args.bundle()?;

    let outcome = if args.dry_run {
        connector
            .build_request(&args.operation, &bundle)
            .map(|request| json!(request))
    } else {
        connector.execute(&args.operation, &bundle).await
    };

    match outcome {
        Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&failure_report(&e))?);
            Ok(exit_code(&e))
        }
    }
}

fn failure_report(error: &ConnectorError) -> serde_json::Value {
    json!({
        "error": error,
        "message": error.to_string(),
        "origin": error.origin(),
        "http_status": error.http_status(),
    })
}

fn exit_code(error: &ConnectorError) -> ExitCode {
    match error.origin() {
        FailureOrigin::Local => ExitCode::from(EXIT_LOCAL_FAILURE),
        FailureOrigin::Remote => ExitCode::from(EXIT_REMOTE_FAILURE),
    }
}
