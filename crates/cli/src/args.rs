//! Command-line arguments and bundle assembly.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use connector::Bundle;
use serde_json::Value;

use crate::config::LogFormat;

/// Describe and run connector operations from the command line.
///
/// Exit codes: 0 on success, 1 on startup errors, 2 when an invocation fails
/// locally (bad bundle, unknown operation), 3 when it fails remotely (HTTP
/// error status, malformed body, transport failure).
#[derive(Debug, Parser)]
#[command(name = "connectorctl", version, about)]
pub struct Cli {
    /// Runtime configuration file (TOML).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Connector definition file; overrides the configured one.
    #[arg(long, short, global = true)]
    pub definition: Option<PathBuf>,

    /// Log output format; overrides the configured one.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the connector's declarative surface as JSON.
    Describe,
    /// Run one operation and print its payload as JSON.
    Execute(ExecuteArgs),
}

#[derive(Debug, Args)]
pub struct ExecuteArgs {
    /// Operation name (e.g. `assign_ticket`, `authentication_test`).
    pub operation: String,

    /// Input value as `key=string` or `key:=json`. Repeatable.
    #[arg(long = "input", short = 'i', value_parser = parse_pair)]
    pub inputs: Vec<(String, Value)>,

    /// Credential value as `key=string` or `key:=json`. Repeatable.
    #[arg(long = "auth", short = 'a', value_parser = parse_pair)]
    pub auth: Vec<(String, Value)>,

    /// JSON bundle file (`{"inputData": {...}, "authData": {...}}`).
    /// `--input` and `--auth` values are layered on top.
    #[arg(long)]
    pub bundle: Option<PathBuf>,

    /// Print the request that would be sent instead of sending it.
    #[arg(long)]
    pub dry_run: bool,
}

impl ExecuteArgs {
    /// Assembles the bundle from `--bundle`, then `--input` / `--auth`.
    pub fn bundle(&self) -> Result<Bundle> {
        let mut bundle = match &self.bundle {
            Some(path) => read_bundle(path)?,
            None => Bundle::new(),
        };
        for (key, value) in &self.inputs {
            bundle.input_data.insert(key.clone(), value.clone());
        }
        for (key, value) in &self.auth {
            bundle.auth_data.insert(key.clone(), value.clone());
        }
        Ok(bundle)
    }
}

fn read_bundle(path: &Path) -> Result<Bundle> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bundle file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse bundle file {}", path.display()))
}

/// Parses `key=value` (string) or `key:=value` (JSON).
fn parse_pair(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value or key:=json, got '{raw}'"))?;

    let (key, value) = match key.strip_suffix(':') {
        Some(key) => {
            let json = serde_json::from_str(value)
                .map_err(|e| format!("invalid JSON for '{key}': {e}"))?;
            (key, json)
        }
        None => (key, Value::String(value.to_string())),
    };

    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn plain_values_stay_strings() {
        assert_eq!(
            parse_pair("ticket_id=42").unwrap(),
            ("ticket_id".to_string(), json!("42"))
        );
        assert_eq!(
            parse_pair("query=a=b").unwrap(),
            ("query".to_string(), json!("a=b"))
        );
    }

    #[test]
    fn json_values_are_parsed() {
        assert_eq!(
            parse_pair("limit:=10").unwrap(),
            ("limit".to_string(), json!(10))
        );
        assert_eq!(
            parse_pair("urgent:=true").unwrap(),
            ("urgent".to_string(), json!(true))
        );
        assert!(parse_pair("limit:=ten").is_err());
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        assert!(parse_pair("no-separator").is_err());
        assert!(parse_pair("=value").is_err());
    }

    #[test]
    fn flags_layer_over_bundle_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"inputData":{{"ticket_id":"1","note":"x"}},"authData":{{"api_key":"old"}}}}"#
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "connectorctl",
            "execute",
            "assign_ticket",
            "--bundle",
            file.path().to_str().unwrap(),
            "-i",
            "ticket_id=42",
            "--auth",
            "api_key=k",
        ])
        .unwrap();
        let Command::Execute(args) = cli.command else {
            panic!("expected execute");
        };

        let bundle = args.bundle().unwrap();
        assert_eq!(bundle.input_data["ticket_id"], "42");
        assert_eq!(bundle.input_data["note"], "x");
        assert_eq!(bundle.auth_data["api_key"], "k");
    }
}
