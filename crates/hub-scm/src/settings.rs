use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const GIT_INSECURE: &str = "git.insecure.enabled";
pub const SVN_INSECURE: &str = "svn.insecure.enabled";

/// Hub settings consulted by the drivers.
pub trait Settings: Send + Sync {
    /// Boolean setting; a missing key is an error.
    fn bool(&self, key: &str) -> Result<bool>;
}

/// In-memory settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SettingsMap(HashMap<String, bool>);

impl SettingsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: bool) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: bool) {
        self.0.insert(key.into(), value);
    }
}

impl Settings for SettingsMap {
    fn bool(&self, key: &str) -> Result<bool> {
        self.0
            .get(key)
            .copied()
            .ok_or_else(|| Error::SettingNotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let settings = SettingsMap::new().with(GIT_INSECURE, true);
        assert!(settings.bool(GIT_INSECURE).unwrap());
        assert!(matches!(
            settings.bool(SVN_INSECURE),
            Err(Error::SettingNotFound(key)) if key == SVN_INSECURE
        ));
    }

    #[test]
    fn test_deserialize() {
        let settings: SettingsMap =
            serde_json::from_str(r#"{"git.insecure.enabled":false,"svn.insecure.enabled":true}"#)
                .unwrap();
        assert!(!settings.bool(GIT_INSECURE).unwrap());
        assert!(settings.bool(SVN_INSECURE).unwrap());
    }
}
