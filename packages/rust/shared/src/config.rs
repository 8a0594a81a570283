//! Application configuration for Offer Copilot.
//!
//! User config lives at `~/.offercopilot/offercopilot.toml`.
//! Environment variables override endpoint URLs, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OfferCopilotError, Result};
use crate::types::AiProvider;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "offercopilot.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".offercopilot";

/// Database file name inside the data directory.
const DB_FILE_NAME: &str = "offercopilot.db";

// ---------------------------------------------------------------------------
// Config structs (matching offercopilot.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Provider and research endpoints.
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Env var names for company-provided API keys.
    #[serde(default)]
    pub company_keys: CompanyKeysConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding the settings database.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Provider used for tool runs until admin settings say otherwise.
    #[serde(default = "default_provider")]
    pub provider: AiProvider,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.offercopilot".into()
}
fn default_provider() -> AiProvider {
    AiProvider::Groq
}
fn default_model() -> String {
    AiProvider::Groq.default_model().into()
}
fn default_temperature() -> f32 {
    0.7
}

/// `[endpoints]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_deepseek_url")]
    pub deepseek_url: String,

    #[serde(default = "default_groq_url")]
    pub groq_url: String,

    /// Base URL; the model and `:generateContent` are appended per request.
    #[serde(default = "default_gemini_url")]
    pub gemini_url: String,

    #[serde(default = "default_tavily_url")]
    pub tavily_url: String,

    /// Reader base URL; the target page URL is appended as a path.
    #[serde(default = "default_jina_url")]
    pub jina_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            deepseek_url: default_deepseek_url(),
            groq_url: default_groq_url(),
            gemini_url: default_gemini_url(),
            tavily_url: default_tavily_url(),
            jina_url: default_jina_url(),
        }
    }
}

fn default_deepseek_url() -> String {
    "https://api.deepseek.com/v1/chat/completions".into()
}
fn default_groq_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".into()
}
fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_tavily_url() -> String {
    "https://api.tavily.com/search".into()
}
fn default_jina_url() -> String {
    "https://r.jina.ai".into()
}

/// `[company_keys]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyKeysConfig {
    /// Name of the env var holding the company Groq key (never store the key itself).
    #[serde(default = "default_groq_env")]
    pub groq_env: String,

    #[serde(default = "default_deepseek_env")]
    pub deepseek_env: String,

    #[serde(default = "default_gemini_env")]
    pub gemini_env: String,
}

impl Default for CompanyKeysConfig {
    fn default() -> Self {
        Self {
            groq_env: default_groq_env(),
            deepseek_env: default_deepseek_env(),
            gemini_env: default_gemini_env(),
        }
    }
}

fn default_groq_env() -> String {
    "OFFERCOPILOT_COMPANY_GROQ_KEY".into()
}
fn default_deepseek_env() -> String {
    "OFFERCOPILOT_COMPANY_DEEPSEEK_KEY".into()
}
fn default_gemini_env() -> String {
    "OFFERCOPILOT_COMPANY_GEMINI_KEY".into()
}

impl CompanyKeysConfig {
    /// Env var name for the given provider's company key.
    pub fn env_var(&self, provider: AiProvider) -> &str {
        match provider {
            AiProvider::Groq => &self.groq_env,
            AiProvider::DeepSeek => &self.deepseek_env,
            AiProvider::Gemini => &self.gemini_env,
        }
    }

    /// Company key for `provider`, if its env var is set and non-empty.
    pub fn key_for(&self, provider: AiProvider) -> Option<String> {
        std::env::var(self.env_var(provider))
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

/// Env vars that override endpoint URLs.
const ENDPOINT_OVERRIDES: [&str; 5] = [
    "OFFERCOPILOT_DEEPSEEK_API_URL",
    "OFFERCOPILOT_GROQ_API_URL",
    "OFFERCOPILOT_GEMINI_API_URL",
    "OFFERCOPILOT_TAVILY_API_URL",
    "OFFERCOPILOT_JINA_READER_URL",
];

impl AppConfig {
    /// Apply endpoint overrides from the environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for var in ENDPOINT_OVERRIDES {
            let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let slot = match var {
                "OFFERCOPILOT_DEEPSEEK_API_URL" => &mut self.endpoints.deepseek_url,
                "OFFERCOPILOT_GROQ_API_URL" => &mut self.endpoints.groq_url,
                "OFFERCOPILOT_GEMINI_API_URL" => &mut self.endpoints.gemini_url,
                "OFFERCOPILOT_TAVILY_API_URL" => &mut self.endpoints.tavily_url,
                _ => &mut self.endpoints.jina_url,
            };
            tracing::debug!(var, %value, "endpoint overridden from environment");
            *slot = value;
        }
    }

    /// Check every endpoint is an absolute http(s) URL.
    pub fn validate_endpoints(&self) -> Result<()> {
        let endpoints = [
            ("deepseek_url", &self.endpoints.deepseek_url),
            ("groq_url", &self.endpoints.groq_url),
            ("gemini_url", &self.endpoints.gemini_url),
            ("tavily_url", &self.endpoints.tavily_url),
            ("jina_url", &self.endpoints.jina_url),
        ];
        for (name, value) in endpoints {
            let parsed = Url::parse(value).map_err(|e| {
                OfferCopilotError::config(format!("endpoints.{name} is not a valid URL ({value}): {e}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(OfferCopilotError::config(format!(
                    "endpoints.{name} must use http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }

    /// Resolved data directory with a leading `~` expanded.
    pub fn data_dir(&self) -> Result<PathBuf> {
        expand_home(&self.defaults.data_dir)
    }

    /// Path of the settings database.
    pub fn db_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(DB_FILE_NAME))
    }
}

fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix('~') {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| OfferCopilotError::config("could not determine home directory"))?;
            Ok(home.join(rest.trim_start_matches(['/', '\\'])))
        }
        None => Ok(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.offercopilot/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| OfferCopilotError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.offercopilot/offercopilot.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk and apply env overrides.
/// Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    let mut config = if path.exists() {
        load_config_from(&path)?
    } else {
        tracing::debug!(?path, "config file not found, using defaults");
        AppConfig::default()
    };

    config.apply_env_overrides();
    config.validate_endpoints()?;
    Ok(config)
}

/// Load the application config from a specific file path (no env overrides).
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OfferCopilotError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        OfferCopilotError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| OfferCopilotError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| OfferCopilotError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| OfferCopilotError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("OFFERCOPILOT_COMPANY_GROQ_KEY"));
        assert!(toml_str.contains("https://r.jina.ai"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.provider, AiProvider::Groq);
        assert_eq!(parsed.endpoints.tavily_url, "https://api.tavily.com/search");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
provider = "deepseek"
model = "deepseek-chat"

[endpoints]
jina_url = "http://localhost:9000"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.provider, AiProvider::DeepSeek);
        assert_eq!(config.endpoints.jina_url, "http://localhost:9000");
        assert_eq!(
            config.endpoints.groq_url,
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert_eq!(config.company_keys.gemini_env, "OFFERCOPILOT_COMPANY_GEMINI_KEY");
    }

    #[test]
    fn env_overrides_replace_endpoints() {
        let mut config = AppConfig::default();
        config.apply_overrides_from(|name| match name {
            "OFFERCOPILOT_TAVILY_API_URL" => Some("http://127.0.0.1:1/search".into()),
            "OFFERCOPILOT_GROQ_API_URL" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(config.endpoints.tavily_url, "http://127.0.0.1:1/search");
        assert_eq!(
            config.endpoints.groq_url,
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn company_key_lookup() {
        let mut keys = CompanyKeysConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        keys.deepseek_env = "OC_TEST_NONEXISTENT_KEY_12345".into();
        assert_eq!(keys.env_var(AiProvider::DeepSeek), "OC_TEST_NONEXISTENT_KEY_12345");
        assert!(keys.key_for(AiProvider::DeepSeek).is_none());
    }

    #[test]
    fn absolute_data_dir_is_kept() {
        let mut config = AppConfig::default();
        config.defaults.data_dir = "/tmp/offercopilot".into();
        assert_eq!(
            config.db_path().unwrap(),
            PathBuf::from("/tmp/offercopilot/offercopilot.db")
        );
    }

    #[test]
    fn endpoint_validation() {
        let mut config = AppConfig::default();
        config.validate_endpoints().expect("defaults are valid");

        config.endpoints.jina_url = "r.jina.ai".into();
        let err = config.validate_endpoints().unwrap_err();
        assert!(err.to_string().contains("endpoints.jina_url"));

        config.endpoints.jina_url = "ftp://r.jina.ai".into();
        assert!(config.validate_endpoints().is_err());
    }
}
