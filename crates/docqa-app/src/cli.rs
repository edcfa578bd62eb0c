//! CLI argument definitions for the docqa server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use docqa_core::config::DocqaConfig;

/// docqa - question answering over your own documents.
#[derive(Parser, Debug)]
#[command(name = "docqa", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the database, blobs and index snapshot.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Index every pending document before serving.
    #[arg(long = "rebuild-on-start")]
    pub rebuild_on_start: bool,
}

impl CliArgs {
    /// Priority: --config flag > DOCQA_CONFIG env var > ~/.docqa/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DOCQA_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --port flag > DOCQA_PORT env var > config file value > 8000.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("DOCQA_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        8000
    }

    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }

    /// Fold every CLI override into the loaded configuration.
    pub fn apply(&self, config: &mut DocqaConfig) {
        if let Some(dir) = self.resolve_data_dir() {
            config.general.data_dir = dir;
        }
        if let Some(level) = self.resolve_log_level() {
            config.general.log_level = level;
        }
        config.general.port = self.resolve_port(config.general.port);
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".docqa").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".docqa").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = CliArgs::try_parse_from([
            "docqa",
            "--port",
            "9100",
            "--data-dir",
            "/srv/docqa",
            "--log-level",
            "debug",
            "--rebuild-on-start",
        ])
        .unwrap();
        let mut config = DocqaConfig::default();
        args.apply(&mut config);

        assert_eq!(config.general.port, 9100);
        assert_eq!(config.general.data_dir, "/srv/docqa");
        assert_eq!(config.general.log_level, "debug");
        assert!(args.rebuild_on_start);
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let args = CliArgs::try_parse_from(["docqa", "-c", "/etc/docqa.toml"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/docqa.toml"));
    }

    #[test]
    fn test_port_falls_back_to_default() {
        let args = CliArgs::try_parse_from(["docqa", "-p", "7000"]).unwrap();
        assert_eq!(args.resolve_port(0), 7000);
        let args = CliArgs::try_parse_from(["docqa"]).unwrap();
        if std::env::var("DOCQA_PORT").is_err() {
            assert_eq!(args.resolve_port(0), 8000);
            assert_eq!(args.resolve_port(8123), 8123);
        }
    }
}
