use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{self as core_config, get_env, is_production};
use service_core::error::AppError;

pub const DEFAULT_OLLAMA_HOST: &str = "https://api.ollama.ai";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen3-coder:480b-cloud";

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    pub host: String,
    pub api_key: Secret<String>,
    /// Used when a request does not name a model.
    pub model: String,
}

impl AiConfig {
    pub fn load() -> Result<Self, AppError> {
        Ok(AiConfig {
            common: core_config::Config::load()?,
            ollama: OllamaConfig::from_env()?,
        })
    }
}

impl OllamaConfig {
    /// Read `OLLAMA_HOST`, `OLLAMA_API_KEY` and `OLLAMA_MODEL`.
    ///
    /// Host and model fall back to the cloud defaults in every environment.
    /// A missing key is fatal.
    pub fn from_env() -> Result<Self, AppError> {
        let host = match get_env("OLLAMA_HOST", None, false) {
            Ok(host) => host,
            Err(_) => {
                tracing::warn!(
                    host = DEFAULT_OLLAMA_HOST,
                    "OLLAMA_HOST not set; defaulting to Ollama Cloud"
                );
                DEFAULT_OLLAMA_HOST.to_string()
            }
        };

        let api_key = get_env("OLLAMA_API_KEY", None, is_production()).map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!(
                "Missing OLLAMA_API_KEY (required for Ollama Cloud)"
            ))
        })?;

        let model = get_env("OLLAMA_MODEL", Some(DEFAULT_OLLAMA_MODEL), false)?;

        Ok(OllamaConfig {
            host,
            api_key: Secret::new(api_key),
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::sync::Mutex;

    // The three variables are process-wide, so these tests take turns.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn set(key: &str, value: Option<&str>) {
        match value {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        }
    }

    #[test]
    fn defaults_host_and_model() {
        let _guard = ENV_LOCK.lock().unwrap();
        set("OLLAMA_HOST", None);
        set("OLLAMA_MODEL", Some("   "));
        set("OLLAMA_API_KEY", Some(" secret-key "));

        let config = OllamaConfig::from_env().unwrap();

        assert_eq!(config.host, DEFAULT_OLLAMA_HOST);
        assert_eq!(config.model, DEFAULT_OLLAMA_MODEL);
        assert_eq!(config.api_key.expose_secret(), "secret-key");
    }

    #[test]
    fn explicit_values_are_trimmed() {
        let _guard = ENV_LOCK.lock().unwrap();
        set("OLLAMA_HOST", Some(" http://localhost:11434 "));
        set("OLLAMA_MODEL", Some("llama3 "));
        set("OLLAMA_API_KEY", Some("k"));

        let config = OllamaConfig::from_env().unwrap();

        assert_eq!(config.host, "http://localhost:11434");
        assert_eq!(config.model, "llama3");
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let _guard = ENV_LOCK.lock().unwrap();
        set("OLLAMA_API_KEY", None);

        let err = OllamaConfig::from_env().unwrap_err();

        assert!(err
            .to_string()
            .contains("Missing OLLAMA_API_KEY (required for Ollama Cloud)"));
    }
}
