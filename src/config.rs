use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ServiceError;

/// HuggingFace identifier of the assertion model this service wraps.
pub const MODEL_NAME: &str = "bvanaken/clinical-assertion-negation-bert";

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: MODEL_NAME.to_string(),
            dir: PathBuf::from("models/clinical-assertion-negation-bert"),
        }
    }
}

impl AppConfig {
    /// Reads the YAML config file if present, falls back to defaults
    /// otherwise, then applies environment overrides.
    pub fn load(path: &str) -> Result<Self, ServiceError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => serde_yaml::from_str(&content)
                .map_err(|e| ServiceError::Config(format!("{path}: {e}")))?,
            Err(_) => Self::default(),
        };
        config.apply_port_override(std::env::var("PORT").ok().as_deref())?;
        Ok(config)
    }

    /// `PORT` wins over the configured port when set. An unparseable
    /// value is a startup error rather than a silent fallback.
    fn apply_port_override(&mut self, raw: Option<&str>) -> Result<(), ServiceError> {
        if let Some(raw) = raw {
            self.server.port = raw
                .parse()
                .map_err(|_| ServiceError::Config(format!("invalid PORT value: {raw:?}")))?;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
