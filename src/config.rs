use std::path::PathBuf;

use crate::storage::Credentials;

const DEFAULT_REGION: &str = "auto";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_BYTES: usize = 2 * 1024 * 1024 * 1024;
const DEFAULT_LOCAL_DIR: &str = "./uploads";
const DEFAULT_LOCAL_PUBLIC_PREFIX: &str = "/uploads";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{name} has invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub uploads: UploadLimits,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub credentials: Credentials,
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_bytes: usize,
    pub fallback: Option<LocalFallbackConfig>,
}

#[derive(Debug, Clone)]
pub struct LocalFallbackConfig {
    pub dir: PathBuf,
    pub public_prefix: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let endpoint = required("R2_ENDPOINT")?;
        url::Url::parse(&endpoint).map_err(|e| ConfigError::Invalid {
            name: "R2_ENDPOINT",
            value: endpoint.clone(),
            reason: e.to_string(),
        })?;

        let storage = StorageConfig {
            endpoint,
            bucket: required("R2_BUCKET")?,
            credentials: Credentials::new(
                required("R2_ACCESS_KEY_ID")?,
                required("R2_SECRET_ACCESS_KEY")?,
                optional("R2_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            ),
            public_base_url: optional("R2_PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
        };

        let fallback_enabled = match optional("UPLOAD_FALLBACK_LOCAL") {
            Some(value) => parse_bool("UPLOAD_FALLBACK_LOCAL", &value)?,
            None => false,
        };
        let prefix = optional("UPLOAD_LOCAL_PUBLIC_PREFIX")
            .unwrap_or_else(|| DEFAULT_LOCAL_PUBLIC_PREFIX.to_string());
        // Cannot be mounted at the root next to the API routes.
        if prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid {
                name: "UPLOAD_LOCAL_PUBLIC_PREFIX",
                value: prefix,
                reason: "must not be the root path".to_string(),
            });
        }
        let fallback = fallback_enabled.then(|| LocalFallbackConfig {
            dir: PathBuf::from(
                optional("UPLOAD_LOCAL_DIR").unwrap_or_else(|| DEFAULT_LOCAL_DIR.to_string()),
            ),
            public_prefix: format!("/{}", prefix.trim_matches('/')),
        });

        let max_bytes = match optional("UPLOAD_MAX_BYTES") {
            Some(value) => value.parse::<usize>().map_err(|e| ConfigError::Invalid {
                name: "UPLOAD_MAX_BYTES",
                value: value.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_BYTES,
        };

        let port = match optional("APP_PORT") {
            Some(value) => value.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "APP_PORT",
                value: value.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Settings {
            server: ServerConfig {
                host: optional("APP_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port,
            },
            storage,
            uploads: UploadLimits {
                max_bytes,
                fallback,
            },
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
