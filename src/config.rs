use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::{ExposeSecret, Secret};
use tower_sessions::cookie::Key;

use crate::error::AppError;

pub const DEFAULT_GRANITE_MODEL: &str = "ibm-granite/granite-3.1-8b-instruct";
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com/identity/token";
const HF_INFERENCE_BASE: &str = "https://api-inference.huggingface.co/models";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub max_text_length: usize,
    pub max_upload_bytes: usize,
    pub session_secret: Option<Secret<String>>,
    pub granite: GraniteConfig,
    pub watson: WatsonConfig,
}

#[derive(Debug, Clone)]
pub struct GraniteConfig {
    pub api_token: Option<Secret<String>>,
    pub model: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct WatsonConfig {
    pub api_key: Option<Secret<String>>,
    pub tts_url: Option<String>,
    pub iam_url: String,
}

impl Config {
    /// Read configuration from the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, AppError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let model = var("GRANITE_MODEL_ID").unwrap_or_else(|| DEFAULT_GRANITE_MODEL.to_string());
        let api_url =
            var("HF_API_URL").unwrap_or_else(|| format!("{}/{}", HF_INFERENCE_BASE, model));

        let session_secret = var("SESSION_SECRET").map(Secret::new);
        if let Some(secret) = &session_secret {
            if secret.expose_secret().len() < 64 {
                return Err(AppError::config(
                    "SESSION_SECRET must be at least 64 bytes long",
                ));
            }
        }

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&var, "PORT", 5000)?,
            static_dir: var("STATIC_DIR")
                .unwrap_or_else(|| "./static".to_string())
                .into(),
            max_text_length: parse_or(&var, "MAX_TEXT_LENGTH", 5000)?,
            max_upload_bytes: parse_or(&var, "MAX_UPLOAD_BYTES", 1024 * 1024)?,
            session_secret,
            granite: GraniteConfig {
                api_token: var("HF_API_TOKEN").map(Secret::new),
                model,
                api_url,
            },
            watson: WatsonConfig {
                api_key: var("IBM_API_KEY").map(Secret::new),
                tts_url: var("IBM_TTS_URL").map(|u| u.trim_end_matches('/').to_string()),
                iam_url: var("IBM_IAM_URL").unwrap_or_else(|| DEFAULT_IAM_URL.to_string()),
            },
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, AppError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e| AppError::config(format!("Invalid HOST '{}': {}", self.host, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Cookie signing key. Without a configured secret every process start gets a fresh key.
    pub fn session_key(&self) -> Result<Key, AppError> {
        match &self.session_secret {
            Some(secret) => Key::try_from(secret.expose_secret().as_bytes())
                .map_err(|e| AppError::config(format!("Invalid SESSION_SECRET: {}", e))),
            None => {
                tracing::warn!("SESSION_SECRET is not set, using a random session key");
                Ok(Key::generate())
            }
        }
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("{} must be a number: {}", key, e))),
        None => Ok(default),
    }
}
