use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for editor sessions.
///
/// Read from TOML; every key is optional and falls back to its default.
///
/// ```toml
/// history_capacity = 500
/// title_separator = " / "
/// redo_keys = ["CTRL Y"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Most instants the undo history keeps.
    pub history_capacity: usize,

    /// Edits closer together than this fold into one undo step. 0 disables.
    pub history_coalesce_ms: i64,

    pub title_separator: String,

    /// Title shown while the expedient has nothing to show.
    pub placeholder_title: String,

    /// Extra attempts after a failed update before giving up.
    pub update_retries: u32,

    pub suggestion_limit: usize,

    pub undo_keys: Vec<String>,
    pub redo_keys: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            history_coalesce_ms: 0,
            title_separator: "  -  ".to_string(),
            placeholder_title: "Nou Expedient".to_string(),
            update_retries: 1,
            suggestion_limit: 8,
            undo_keys: vec!["CTRL Z".to_string()],
            redo_keys: vec!["CTRL SHIFT Z".to_string(), "CTRL Y".to_string()],
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        crate::keys::KeyBindings::from_config(self)?;
        Ok(())
    }
}

impl FromStr for SessionConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let config: SessionConfig = toml::de::from_str(data)?;
        config.validate()?;
        Ok(config)
    }
}

impl fmt::Display for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&toml::ser::to_string_pretty(self).map_err(|_| fmt::Error)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config: SessionConfig = "".parse().unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn partial_override() {
        let config: SessionConfig = "history_capacity = 5\nredo_keys = [\"CTRL Y\"]\n"
            .parse()
            .unwrap();
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.redo_keys, vec!["CTRL Y".to_string()]);
        assert_eq!(config.placeholder_title, "Nou Expedient");
    }

    #[test]
    fn display_parses_back() {
        let config = SessionConfig {
            title_separator: " | ".into(),
            ..SessionConfig::default()
        };
        let parsed: SessionConfig = config.to_string().parse().unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            "history_capacity = 0".parse::<SessionConfig>(),
            Err(ConfigError::ZeroHistoryCapacity)
        ));
        assert!(matches!(
            "undo_keys = [\"CTRL\"]".parse::<SessionConfig>(),
            Err(ConfigError::InvalidChord(_))
        ));
        assert!(matches!(
            "history_capacity = \"many\"".parse::<SessionConfig>(),
            Err(ConfigError::Parse(_))
        ));
    }
}
