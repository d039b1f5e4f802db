use dashmap::DashMap;
use std::env;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration service backed by process environment variables.
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Load every environment variable.
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// Read a flag. `1`, `true`, `yes` and `on` are truthy, `0`, `false`,
    /// `no` and `off` falsy; anything else yields `None`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let value = self.get(key)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            other => {
                tracing::warn!(key, value = other, "ignoring unparseable boolean setting");
                None
            }
        }
    }

    /// Parse `key`, falling back to `default` when it is unset or invalid.
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_bool_variants() {
        let config = ConfigService::default();
        config.set("A", "yes");
        config.set("B", " OFF ");
        config.set("C", "maybe");
        assert_eq!(config.get_bool("A"), Some(true));
        assert_eq!(config.get_bool("B"), Some(false));
        assert_eq!(config.get_bool("C"), None);
        assert_eq!(config.get_bool("MISSING"), None);
    }

    #[test]
    fn test_get_or_falls_back() {
        let config = ConfigService::default();
        config.set("PORT", "8080");
        config.set("BAD", "eighty");
        assert_eq!(config.get_or("PORT", 3000u16), 8080);
        assert_eq!(config.get_or("BAD", 3000u16), 3000);
        assert_eq!(config.get_or("MISSING", 3000u16), 3000);
    }
}
