//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{AppConfig, BrassConfig, LogOutput, LoggingConfig, ServerConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &BrassConfig) -> ConfigResult<()> {
    validate_app_config(&config.app)?;
    validate_server_config(&config.server)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_app_config(app: &AppConfig) -> ConfigResult<()> {
    if let Some(scope) = &app.scope
        && scope.trim().is_empty()
    {
        return Err(ConfigError::validation("Scope name cannot be empty"));
    }
    Ok(())
}

fn validate_server_config(server: &ServerConfig) -> ConfigResult<()> {
    if server.host.trim().is_empty() {
        return Err(ConfigError::missing_field("server.host"));
    }
    validate_port(server.port)
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter module name: {module:?}"
        )));
    }

    Ok(())
}

/// Validates a port number.
fn validate_port(port: u16) -> ConfigResult<()> {
    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&BrassConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero() {
        let mut config = BrassConfig::default();
        config.server.port = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPort(0))
        ));
    }

    #[test]
    fn test_validate_empty_scope() {
        let mut config = BrassConfig::default();
        config.app.scope = Some(String::new());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_file_output_without_path() {
        let mut config = BrassConfig::default();
        config.logging.output = LogOutput::File;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "logging.file_path"));

        config.logging.file_path = Some("logs/brass.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_filter_module() {
        let mut config = BrassConfig::default();
        config.logging.filters.insert(" ".to_string(), LogLevel::Debug);
        assert!(validate_config(&config).is_err());
    }
}
