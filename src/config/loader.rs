//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{AppConfig, Network};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Listener settings given outside the file, e.g. on the command line.
#[derive(Debug, Clone, Default)]
pub struct ListenerOverrides {
    pub network: Option<Network>,
    pub address: Option<String>,
}

/// Load an optional file, apply `overrides` on top, then validate.
///
/// The file may leave out the listener entirely when the overrides supply it.
pub fn load_with_overrides(
    path: Option<&Path>,
    overrides: ListenerOverrides,
) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => AppConfig::default(),
    };

    if let Some(network) = overrides.network {
        config.listener.network = Some(network);
    }
    if let Some(address) = overrides.address {
        config.listener.address = Some(address);
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("connhub-{name}-{}.toml", std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn parses_valid_document() {
        let config = parse_config(
            r#"
            [listener]
            network = "tcp"
            address = "127.0.0.1:7000"
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.network, Some(Network::Tcp));
    }

    #[test]
    fn syntax_error_is_parse_error() {
        let err = parse_config("[listener\nnetwork = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unknown_network_is_parse_error() {
        let err = parse_config("[listener]\nnetwork = \"udp\"\naddress = \"x:1\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_listener_fails_validation() {
        let err = parse_config("").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other}"),
        }
        assert!(parse_config("")
            .unwrap_err()
            .to_string()
            .contains("listener.network is required"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn overrides_complete_a_file_without_listener() {
        let path = write_temp("observability-only", "[observability]\nlog_level = \"debug\"\n");

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let overrides = ListenerOverrides {
            network: Some(Network::Tcp),
            address: Some("127.0.0.1:7000".into()),
        };
        let config = load_with_overrides(Some(&path), overrides).unwrap();
        assert_eq!(config.listener.network, Some(Network::Tcp));
        assert_eq!(config.listener.address.as_deref(), Some("127.0.0.1:7000"));
        assert_eq!(config.observability.log_level, "debug");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn overrides_replace_file_values() {
        let path = write_temp(
            "override-address",
            "[listener]\nnetwork = \"tcp\"\naddress = \"127.0.0.1:7000\"\n",
        );

        let overrides = ListenerOverrides {
            address: Some("127.0.0.1:7001".into()),
            ..ListenerOverrides::default()
        };
        let config = load_with_overrides(Some(&path), overrides).unwrap();
        assert_eq!(config.listener.network, Some(Network::Tcp));
        assert_eq!(config.listener.address.as_deref(), Some("127.0.0.1:7001"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn overrides_are_still_validated() {
        let err = load_with_overrides(None, ListenerOverrides::default()).unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(
                errors,
                vec![ValidationError::MissingNetwork, ValidationError::MissingAddress]
            ),
            other => panic!("expected validation error, got {other}"),
        }

        let overrides = ListenerOverrides {
            network: Some(Network::Tcp),
            address: Some("no-port".into()),
        };
        let err = load_with_overrides(None, overrides).unwrap_err();
        assert!(err.to_string().contains("no-port"));
    }
}
