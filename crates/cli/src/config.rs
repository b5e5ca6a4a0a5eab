//! CLI runtime configuration.
//!
//! Layered, lowest precedence first: built-in defaults, an optional TOML file
//! (`--config`), `CONNECTOR_*` environment variables, command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use http_transport::TransportConfig;
use serde::Deserialize;

/// Output format of log lines on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` takes precedence.
    pub filter: String,
    /// OTLP gRPC endpoint. Spans are exported only when set.
    pub otlp_endpoint: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Plain,
            filter: "warn,connector=info,http_transport=info".to_string(),
            otlp_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Path of the connector definition (TOML).
    pub definition: PathBuf,
    pub log: LogConfig,
    pub transport: TransportConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            definition: PathBuf::from("connector.toml"),
            log: LogConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl CliConfig {
    /// Loads defaults, then `path` (if given), then environment overrides
    /// read through `env`.
    pub fn load(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env(env)?;
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = env("CONNECTOR_DEFINITION") {
            self.definition = PathBuf::from(v);
        }
        if let Some(v) = env("CONNECTOR_LOG_FORMAT") {
            self.log.format = LogFormat::from_str(&v, true)
                .map_err(|e| anyhow::anyhow!("CONNECTOR_LOG_FORMAT: {e}"))?;
        }
        if let Some(v) = env("CONNECTOR_LOG_FILTER") {
            self.log.filter = v;
        }
        if let Some(v) = env("CONNECTOR_OTLP_ENDPOINT") {
            self.log.otlp_endpoint = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = env("CONNECTOR_TIMEOUT_SECS") {
            self.transport.timeout_secs = v
                .parse()
                .with_context(|| format!("CONNECTOR_TIMEOUT_SECS is not an integer: '{v}'"))?;
        }
        if let Some(v) = env("CONNECTOR_USER_AGENT") {
            self.transport.user_agent = v;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = CliConfig::load(None, no_env).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.transport.timeout_secs, 30);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            definition = "connectors/helpdesk.toml"
            [log]
            format = "json"
            [transport]
            timeout_secs = 5
            "#
        )
        .unwrap();

        let config = CliConfig::load(Some(file.path()), no_env).unwrap();
        assert_eq!(config.definition, PathBuf::from("connectors/helpdesk.toml"));
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.filter, LogConfig::default().filter);
        assert_eq!(config.transport.timeout_secs, 5);
    }

    #[test]
    fn env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transport]\ntimeout_secs = 5").unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("CONNECTOR_TIMEOUT_SECS", "9"),
            ("CONNECTOR_LOG_FORMAT", "JSON"),
            ("CONNECTOR_OTLP_ENDPOINT", "http://localhost:4317"),
        ]);

        let config =
            CliConfig::load(Some(file.path()), |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.transport.timeout_secs, 9);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(
            config.log.otlp_endpoint.as_deref(),
            Some("http://localhost:4317")
        );
    }

    #[test]
    fn bad_env_values_are_errors() {
        let err = CliConfig::load(None, |k| {
            (k == "CONNECTOR_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("CONNECTOR_TIMEOUT_SECS"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = CliConfig::load(Some(Path::new("/nonexistent/connector.toml")), no_env)
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
