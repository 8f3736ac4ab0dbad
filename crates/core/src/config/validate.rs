use super::{types::Config, ConfigError};
use crate::provisioner::ArtifactLayout;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Manifest is non-empty, every title maps to a destination, every URL is http(s)
/// - Checkpoint groups use distinct directories
/// - Chunk size and timeouts are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let checkpoints = &config.checkpoints;
    if checkpoints.chunk_size == 0 {
        return Err(ConfigError::ValidationError(
            "checkpoints.chunk_size cannot be 0".to_string(),
        ));
    }
    if checkpoints.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "checkpoints.timeout_secs cannot be 0".to_string(),
        ));
    }
    if checkpoints.group_a_dir == checkpoints.group_b_dir {
        return Err(ConfigError::ValidationError(format!(
            "checkpoints.group_a_dir and group_b_dir must differ (both '{}')",
            checkpoints.group_a_dir
        )));
    }

    ArtifactLayout::check_manifest(&checkpoints.artifacts)
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    if let Some(entry) = checkpoints
        .artifacts
        .iter()
        .find(|a| !a.url.starts_with("http://") && !a.url.starts_with("https://"))
    {
        return Err(ConfigError::ValidationError(format!(
            "artifact '{}' has a non-http url: {}",
            entry.title, entry.url
        )));
    }

    if config.pipeline.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::provisioner::ManifestEntry;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse().unwrap(),
                port: 0,
            },
            ..Default::default()
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_empty_manifest_fails() {
        let mut config = Config::default();
        config.checkpoints.artifacts.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_bad_title_fails() {
        let mut config = Config::default();
        config
            .checkpoints
            .artifacts
            .push(ManifestEntry::new("weights.h5", "https://example.com/w"));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("weights.h5"));
    }

    #[test]
    fn test_validate_non_http_url_fails() {
        let mut config = Config::default();
        config.checkpoints.artifacts[0].url = "ftp://example.com/model.onnx".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_same_group_dirs_fails() {
        let mut config = Config::default();
        config.checkpoints.group_b_dir = config.checkpoints.group_a_dir.clone();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_chunk_size_fails() {
        let mut config = Config::default();
        config.checkpoints.chunk_size = 0;
        assert!(validate_config(&config).is_err());
    }
}
