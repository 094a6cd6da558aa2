//! Configuration for the x402 CRM server and CLI.

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// CLI arguments for the x402 CRM.
#[derive(Parser, Debug)]
#[command(name = "x402-crm")]
#[command(about = "x402 provider CRM and endpoint prober")]
pub struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Probe a single URL for x402 support and print the result as JSON
    Probe {
        /// Endpoint URL; `https://` is assumed when no scheme is given
        url: String,
    },
}

/// Server configuration.
///
/// Fields use serde defaults that fall back to environment variables,
/// then to hardcoded defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    port: u16,
    #[serde(default = "config_defaults::default_host")]
    host: IpAddr,
    #[serde(default = "config_defaults::default_probe_user_agent")]
    probe_user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: config_defaults::default_port(),
            host: config_defaults::default_host(),
            probe_user_agent: config_defaults::default_probe_user_agent(),
        }
    }
}

pub mod config_defaults {
    use std::env;
    use std::net::{IpAddr, Ipv4Addr};

    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    pub const DEFAULT_PROBE_USER_AGENT: &str =
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

    /// Returns the default port value with fallback: $PORT env var -> 8080
    pub fn default_port() -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }

    /// Returns the default host value with fallback: $HOST env var -> "0.0.0.0"
    pub fn default_host() -> IpAddr {
        env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HOST)
    }

    /// $PROBE_USER_AGENT env var -> "x402-crm/<version>"
    pub fn default_probe_user_agent() -> String {
        env::var("PROBE_USER_AGENT")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_PROBE_USER_AGENT.to_string())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// `User-Agent` sent with every probe request.
    pub fn probe_user_agent(&self) -> &str {
        &self.probe_user_agent
    }

    /// Loads the configuration named by `--config` / `$CONFIG`.
    ///
    /// Without a config file every value is resolved from environment variables or defaults.
    pub fn load(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        match &cli_args.config {
            Some(path) => Self::load_from_path(path),
            None => Self::from_json("{}"),
        }
    }

    fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        Self::from_json(&content)
    }

    fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_values() {
        let config =
            Config::from_json(r#"{"port": 3000, "host": "127.0.0.1", "probe_user_agent": "ua/1"}"#)
                .unwrap();
        assert_eq!(config.port(), 3000);
        assert_eq!(config.host(), "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(config.probe_user_agent(), "ua/1");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            Config::from_json("{port: }"),
            Err(ConfigError::JsonParse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("x402-crm-config-{}.json", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(br#"{"port": 4021}"#).unwrap();
        let cli_args = CliArgs::parse_from(["x402-crm", "--config", path.to_str().unwrap()]);
        let config = Config::load(&cli_args).unwrap();
        assert_eq!(config.port(), 4021);
        fs::remove_file(&path).unwrap();

        let err = Config::load(&cli_args).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(p, _) if p == path));
    }

    #[test]
    fn test_probe_subcommand() {
        let cli_args = CliArgs::parse_from(["x402-crm", "probe", "api.example.com/paid"]);
        assert_eq!(
            cli_args.command,
            Some(Command::Probe {
                url: "api.example.com/paid".to_string()
            })
        );
    }
}
