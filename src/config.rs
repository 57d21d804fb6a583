use serde::Deserialize;
use std::fs;

use crate::error::{RelayError, Result};
use crate::message::JsonMap;
use crate::routing::TrackingPlan;

/// Initialization settings for the facade: the global integrations map and
/// the tracking plan, plus the write key a deployment routes its primary
/// collection through.
#[derive(Debug, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub write_key: Option<String>,
    /// Initialization-time integrations map; set once at startup
    #[serde(default)]
    pub integrations: Option<JsonMap>,
    #[serde(default)]
    pub plan: TrackingPlan,
}

impl RelayConfig {
    pub fn load(path: &str) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("Failed to read config file '{}': {}", path, e))
        })?;

        let config: RelayConfig = toml::from_str(&config_content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_load_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
write_key = "wk_test"

[integrations]
All = true
Amplitude = false

[plan.track."Order Completed"]
enabled = true

[plan.track."Order Completed".integrations]
Amplitude = true

[plan.track.__default]
enabled = false
"#
        )
        .unwrap();

        let config = RelayConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.write_key.as_deref(), Some("wk_test"));

        let integrations = config.integrations.unwrap();
        assert_eq!(integrations.get("All"), Some(&json!(true)));
        assert_eq!(integrations.get("Amplitude"), Some(&json!(false)));

        let entry = config.plan.track.get("Order Completed").unwrap();
        assert!(entry.enabled);
        assert_eq!(entry.integrations.get("Amplitude"), Some(&json!(true)));
        assert!(!config.plan.track.get("__default").unwrap().enabled);
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let result = RelayConfig::load("does-not-exist.toml");
        assert!(matches!(result, Err(RelayError::Config(_))));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "").unwrap();
        let config = RelayConfig::load(file.path().to_str().unwrap()).unwrap();
        assert!(config.write_key.is_none());
        assert!(config.integrations.is_none());
        assert!(config.plan.track.is_empty());
    }
}
