//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend base URL, e.g. "http://panel.example.com:8000".
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub saved_username: String,
    #[serde(default)]
    pub remember_username: bool,
    #[serde(default = "default_true")]
    pub dark_mode: bool,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Dashboard service-panel refresh interval. 0 disables auto-refresh.
    #[serde(default = "default_service_refresh")]
    pub service_refresh_secs: u64,
    /// Last channel view (query-string form), restored on next launch.
    #[serde(default)]
    pub last_channel_view: String,
}

fn default_true() -> bool {
    true
}

fn default_per_page() -> u32 {
    20
}

fn default_service_refresh() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            saved_username: String::new(),
            remember_username: false,
            dark_mode: true,
            per_page: 20,
            service_refresh_secs: 30,
            last_channel_view: String::new(),
        }
    }
}

impl AppConfig {
    fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("streampanel");
        fs::create_dir_all(&path).ok();
        path.push("config.json");
        path
    }

    pub fn load() -> Self {
        let path = Self::config_path();

        if path.exists() {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(config) = serde_json::from_str(&content) {
                    return config;
                }
            }
        }

        Self::default()
    }

    pub fn save(&self) {
        let path = Self::config_path();
        if let Ok(content) = serde_json::to_string_pretty(self) {
            let _ = fs::write(path, content);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut config = AppConfig::default();
        config.server_url = "http://panel.local:8000".into();
        config.saved_username = "admin".into();
        config.remember_username = true;
        config.per_page = 50;

        let json = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server_url, config.server_url);
        assert_eq!(back.saved_username, "admin");
        assert_eq!(back.per_page, 50);
    }

    #[test]
    fn test_tolerates_unknown_and_missing_fields() {
        // Older/newer config files must still load.
        let config: AppConfig =
            serde_json::from_str(r#"{"server_url":"http://x","some_future_key":1}"#).unwrap();
        assert_eq!(config.server_url, "http://x");
        assert!(config.dark_mode);
        assert_eq!(config.per_page, 20);
        assert_eq!(config.service_refresh_secs, 30);
    }
}
