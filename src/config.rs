use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SabiaError};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 150;
const DEFAULT_MEMORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Placeholder connection settings kept for parity with the deployment
/// environment. Nothing in the application reads them yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "sabia".to_string(),
            user: "sabia".to_string(),
            password: String::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_memory_capacity() -> usize {
    DEFAULT_MEMORY_CAPACITY
}

impl Config {
    /// Loads `config.json` from the data directory when present, otherwise
    /// starts from defaults. Environment variables win over file values.
    pub fn new(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir
            .or_else(|| env::var("SABIA_DATA_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("sabia")
            });

        std::fs::create_dir_all(&data_dir)?;

        let config_path = data_dir.join("config.json");

        let mut config = if config_path.exists() {
            let config_str = std::fs::read_to_string(&config_path)?;
            serde_json::from_str::<Config>(&config_str).map_err(|e| {
                SabiaError::Config(format!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            Config::default_config()
        };

        config.data_dir = data_dir;
        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = self.data_dir.join("config.json");
        let json_str = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, json_str)?;
        Ok(())
    }

    fn default_config() -> Self {
        Config {
            data_dir: PathBuf::new(),
            debug: false,
            log_level: default_log_level(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            memory_capacity: default_memory_capacity(),
            database: DatabaseConfig::default(),
        }
    }

    fn apply_env(&mut self) {
        if let Ok(debug) = env::var("SABIA_DEBUG") {
            self.debug = matches!(debug.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(level) = env::var("SABIA_LOG_LEVEL") {
            self.log_level = level;
        }
        self.api_key = effective_api_key(self.api_key.take(), env::var("OPENAI_API_KEY").ok());
        if let Ok(host) = env::var("SABIA_DB_HOST") {
            self.database.host = host;
        }
        if let Ok(port) = env::var("SABIA_DB_PORT") {
            if let Ok(port) = port.parse() {
                self.database.port = port;
            }
        }
        if let Ok(name) = env::var("SABIA_DB_NAME") {
            self.database.name = name;
        }
        if let Ok(user) = env::var("SABIA_DB_USER") {
            self.database.user = user;
        }
        if let Ok(password) = env::var("SABIA_DB_PASSWORD") {
            self.database.password = password;
        }
    }

    pub fn memory_file(&self) -> PathBuf {
        self.data_dir.join("memoria.json")
    }

    pub fn map_file(&self) -> PathBuf {
        self.data_dir.join("mapa_mental.svg")
    }

    pub fn graph_file(&self) -> PathBuf {
        self.data_dir.join("mapa_conceitos.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// A non-empty environment credential overrides the file value, like the
/// other environment variables; the file is the fallback.
fn effective_api_key(file: Option<String>, env: Option<String>) -> Option<String> {
    env.filter(|k| !k.is_empty())
        .or(file)
        .filter(|k| !k.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_when_no_config_file() {
        let dir = tempdir().unwrap();
        let config = Config::new(Some(dir.path().to_path_buf())).unwrap();

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.memory_capacity, 100);
        assert_eq!(config.log_level, "info");
        assert!(!config.debug);
        assert_eq!(config.database.port, 5432);
    }

    #[test]
    fn creates_data_dir() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("sabia");
        let config = Config::new(Some(data_dir.clone())).unwrap();

        assert!(data_dir.exists());
        assert_eq!(config.data_dir, data_dir);
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = tempdir().unwrap();
        let mut config = Config::new(Some(dir.path().to_path_buf())).unwrap();
        config.model = "gpt-4o-mini".to_string();
        config.memory_capacity = 7;
        config.save().unwrap();

        let reloaded = Config::new(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(reloaded.model, "gpt-4o-mini");
        assert_eq!(reloaded.memory_capacity, 7);
    }

    #[test]
    fn rejects_corrupt_config_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{not json").unwrap();

        let err = Config::new(Some(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, SabiaError::Config(_)));
    }

    #[test]
    fn env_credential_overrides_the_file_value() {
        assert_eq!(
            effective_api_key(Some("file-key".to_string()), Some("env-key".to_string())),
            Some("env-key".to_string())
        );
        // empty or missing environment values fall back to the file
        assert_eq!(
            effective_api_key(Some("file-key".to_string()), Some(String::new())),
            Some("file-key".to_string())
        );
        assert_eq!(
            effective_api_key(Some("file-key".to_string()), None),
            Some("file-key".to_string())
        );
        assert_eq!(effective_api_key(None, None), None);
        assert_eq!(effective_api_key(Some(String::new()), None), None);
    }

    #[test]
    fn path_helpers_live_under_data_dir() {
        let dir = tempdir().unwrap();
        let config = Config::new(Some(dir.path().to_path_buf())).unwrap();

        assert_eq!(config.memory_file(), dir.path().join("memoria.json"));
        assert_eq!(config.map_file(), dir.path().join("mapa_mental.svg"));
        assert_eq!(config.graph_file(), dir.path().join("mapa_conceitos.json"));
        assert_eq!(config.log_dir(), dir.path().join("logs"));
    }
}
