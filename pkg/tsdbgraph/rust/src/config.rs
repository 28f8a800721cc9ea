// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "/etc/tsdb-graph/config.yaml";

fn default_base_read_url() -> String {
    "http://localhost:4242".to_string()
}

fn default_api_version() -> String {
    "2.3".to_string()
}

fn default_filters_since() -> String {
    "2.2".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_base_read_url")]
    pub tsdb_base_read_url: String,
    #[serde(default)]
    pub authenticated_reads: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Version of the backend's HTTP API, e.g. `"2.3"`.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// First API version that accepts filter blocks in `m=` parameters.
    #[serde(default = "default_filters_since")]
    pub filters_since: String,
    /// Forces filter blocks on or off regardless of `api_version`.
    pub filters_enabled: Option<bool>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tsdb_base_read_url: default_base_read_url(),
            authenticated_reads: false,
            username: None,
            password: None,
            api_version: default_api_version(),
            filters_since: default_filters_since(),
            filters_enabled: None,
            request_timeout_secs: default_request_timeout_secs(),
            log_level: None,
        }
    }
}

/// Resolves the config file: `--config`, then `TSDB_GRAPH_CONFIG`, then the
/// system default.
pub fn config_path(cli: Option<PathBuf>) -> PathBuf {
    cli.or_else(|| env::var("TSDB_GRAPH_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Loads the YAML config at `path`. A missing file gives the defaults; an
/// empty one too.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if contents.trim().is_empty() {
        debug!("config file {} is empty", path.display());
        return Ok(Config::default());
    }
    let config: Config =
        serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

/// Unknown levels silently default to Info
fn parse_log_level(level: &str) -> log::Level {
    match level.to_lowercase().as_str() {
        "trace" => log::Level::Trace,
        "debug" => log::Level::Debug,
        "info" => log::Level::Info,
        "warn" | "warning" => log::Level::Warn,
        "error" | "critical" | "off" => log::Level::Error,
        _ => log::Level::Info,
    }
}

/// Priority: TSDB_GRAPH_LOG_LEVEL > LOG_LEVEL > config file > Info
pub fn get_log_level(config: Option<&Config>) -> log::Level {
    if let Ok(level) = env::var("TSDB_GRAPH_LOG_LEVEL") {
        return parse_log_level(&level);
    }

    if let Ok(level) = env::var("LOG_LEVEL") {
        return parse_log_level(&level);
    }

    config
        .and_then(|c| c.log_level.as_deref())
        .map(parse_log_level)
        .unwrap_or(log::Level::Info)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_full_config() {
        let file = create_test_config(
            r#"
tsdb_base_read_url: http://tsdb.internal:4242
authenticated_reads: true
username: reader
password: secret
api_version: "2.1"
filters_since: "2.2"
filters_enabled: false
request_timeout_secs: 5
log_level: debug
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.tsdb_base_read_url, "http://tsdb.internal:4242");
        assert!(config.authenticated_reads);
        assert_eq!(config.username.as_deref(), Some("reader"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.api_version, "2.1");
        assert_eq!(config.filters_enabled, Some(false));
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_parse_minimal_config() {
        let file = create_test_config("tsdb_base_read_url: http://tsdb:4242\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(
            config,
            Config {
                tsdb_base_read_url: "http://tsdb:4242".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let file = create_test_config("");
        assert_eq!(load_config(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api_version, "2.3");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_yaml() {
        let file = create_test_config("request_timeout_secs: soon\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("parsing "));
    }

    #[test]
    fn test_config_path_priority() {
        temp_env::with_var("TSDB_GRAPH_CONFIG", Some("/tmp/from-env.yaml"), || {
            assert_eq!(
                config_path(Some(PathBuf::from("/tmp/from-cli.yaml"))),
                PathBuf::from("/tmp/from-cli.yaml")
            );
            assert_eq!(config_path(None), PathBuf::from("/tmp/from-env.yaml"));
        });
        temp_env::with_var_unset("TSDB_GRAPH_CONFIG", || {
            assert_eq!(config_path(None), PathBuf::from(DEFAULT_CONFIG_PATH));
        });
    }

    #[test]
    fn test_get_log_level_default_when_no_config() {
        temp_env::with_vars(
            vec![
                ("TSDB_GRAPH_LOG_LEVEL", None::<&str>),
                ("LOG_LEVEL", None::<&str>),
            ],
            || {
                assert_eq!(get_log_level(None), log::Level::Info);
            },
        );
    }

    #[test]
    fn test_get_log_level_env_priority() {
        temp_env::with_vars(
            vec![
                ("TSDB_GRAPH_LOG_LEVEL", Some("error")),
                ("LOG_LEVEL", Some("trace")),
            ],
            || {
                assert_eq!(get_log_level(None), log::Level::Error);
            },
        );
        temp_env::with_vars(
            vec![
                ("TSDB_GRAPH_LOG_LEVEL", None::<&str>),
                ("LOG_LEVEL", Some("trace")),
            ],
            || {
                assert_eq!(get_log_level(None), log::Level::Trace);
            },
        );
    }

    #[test]
    fn test_get_log_level_from_config() {
        let config = Config {
            log_level: Some("warning".to_string()),
            ..Default::default()
        };
        temp_env::with_vars(
            vec![
                ("TSDB_GRAPH_LOG_LEVEL", None::<&str>),
                ("LOG_LEVEL", None::<&str>),
            ],
            || {
                assert_eq!(get_log_level(Some(&config)), log::Level::Warn);
            },
        );
        temp_env::with_vars(
            vec![
                ("TSDB_GRAPH_LOG_LEVEL", None::<&str>),
                ("LOG_LEVEL", Some("debug")),
            ],
            || {
                assert_eq!(get_log_level(Some(&config)), log::Level::Debug);
            },
        );
    }

    #[test]
    fn test_unknown_log_level_is_info() {
        assert_eq!(parse_log_level("verbose"), log::Level::Info);
        assert_eq!(parse_log_level("OFF"), log::Level::Error);
    }
}
