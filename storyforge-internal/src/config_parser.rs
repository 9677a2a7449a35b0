use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::error::{Error, ErrorDetails};

/// Top-level gateway configuration, loaded from a TOML file at startup.
///
/// Every store section is optional: a missing section selects the in-memory
/// mock implementation, which is only suitable for local development and
/// tests. The production sections carry base URLs for the REST collaborators.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub profile_store: Option<StoreConfig>,
    #[serde(default)]
    pub project_store: Option<StoreConfig>,
    #[serde(default)]
    pub usage_log: Option<StoreConfig>,
    #[serde(default)]
    pub generation: Option<GenerationConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Socket address to bind to. Defaults to 0.0.0.0:3000.
    pub bind_address: Option<SocketAddr>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// SHA-256 hashed session tokens mapped to the owning account id.
    /// Raw tokens never appear in the config file.
    #[serde(default)]
    pub sessions: HashMap<String, Uuid>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        // Running without authentication must be opt-in
        Self {
            enabled: true,
            sessions: HashMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub base_url: Url,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    pub base_url: Url,
    pub model_name: String,
    /// Name of the environment variable holding the backend API key.
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: String,
}

fn default_api_key_env_var() -> String {
    "STORYFORGE_GENERATION_API_KEY".to_string()
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Config, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to read config file `{}`: {e}", path.display()),
            })
        })?;
        Self::load_from_toml(&contents)
    }

    pub fn load_from_toml(contents: &str) -> Result<Config, Error> {
        let config: Config = toml::from_str(contents).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to parse config file: {e}"),
            })
        })?;
        config.verify()?;
        Ok(config)
    }

    fn verify(&self) -> Result<(), Error> {
        if self.auth.enabled && self.auth.sessions.is_empty() {
            tracing::warn!(
                "Authentication is enabled but no sessions are configured; every request will be rejected"
            );
        }
        if let Some(generation) = &self.generation {
            if generation.model_name.trim().is_empty() {
                return Err(Error::new(ErrorDetails::Config {
                    message: "`generation.model_name` must not be empty".to_string(),
                }));
            }
        }
        Ok(())
    }
}
