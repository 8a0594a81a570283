//! Typed accessors over the key-value settings, and the stored-settings
//! implementation of [`SettingsSource`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use offercopilot_shared::{
    AdminSettings, AiProvider, CompanyKeysConfig, PipelineConfig, Result, SettingsSource,
    UserProfile,
};

use crate::Storage;

/// Well-known settings keys.
pub mod keys {
    pub const PIPELINE_CONFIG: &str = "pipeline_config";
    /// Map of provider name to the user's own API key.
    pub const API_KEYS: &str = "api_keys";
    pub const USE_COMPANY_API: &str = "use_company_api";
    pub const ADMIN_MODE: &str = "admin_mode";
    pub const ADMIN_SETTINGS: &str = "admin_settings";
    pub const USER_PROFILE: &str = "user_profile";
}

impl Storage {
    pub async fn pipeline_config(&self) -> Result<Option<PipelineConfig>> {
        self.get_json(keys::PIPELINE_CONFIG).await
    }

    pub async fn save_pipeline_config(&self, config: &PipelineConfig) -> Result<()> {
        self.set_json(keys::PIPELINE_CONFIG, config).await
    }

    /// The user's own API keys, keyed by provider name.
    pub async fn user_api_keys(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.get_json(keys::API_KEYS).await?.unwrap_or_default())
    }

    pub async fn user_api_key(&self, provider: AiProvider) -> Result<Option<String>> {
        Ok(self
            .user_api_keys()
            .await?
            .remove(provider.as_str())
            .filter(|k| !k.trim().is_empty()))
    }

    pub async fn set_user_api_key(&self, provider: AiProvider, key: &str) -> Result<()> {
        let mut all = self.user_api_keys().await?;
        all.insert(provider.as_str().to_string(), key.trim().to_string());
        self.set_json(keys::API_KEYS, &all).await
    }

    /// Returns whether a key was stored for `provider`.
    pub async fn remove_user_api_key(&self, provider: AiProvider) -> Result<bool> {
        let mut all = self.user_api_keys().await?;
        let existed = all.remove(provider.as_str()).is_some();
        if existed {
            self.set_json(keys::API_KEYS, &all).await?;
        }
        Ok(existed)
    }

    /// Whether company keys take precedence. Defaults to on.
    pub async fn use_company_api(&self) -> Result<bool> {
        Ok(self.get_json(keys::USE_COMPANY_API).await?.unwrap_or(true))
    }

    pub async fn set_use_company_api(&self, enabled: bool) -> Result<()> {
        self.set_json(keys::USE_COMPANY_API, &enabled).await
    }

    pub async fn is_admin(&self) -> Result<bool> {
        Ok(self.get_json(keys::ADMIN_MODE).await?.unwrap_or(false))
    }

    pub async fn set_admin(&self, enabled: bool) -> Result<()> {
        self.set_json(keys::ADMIN_MODE, &enabled).await
    }

    /// Flip admin mode and return the new value.
    pub async fn toggle_admin(&self) -> Result<bool> {
        let next = !self.is_admin().await?;
        self.set_admin(next).await?;
        Ok(next)
    }

    /// Stored admin settings, or `None` if never saved.
    pub async fn admin_settings(&self) -> Result<Option<AdminSettings>> {
        self.get_json(keys::ADMIN_SETTINGS).await
    }

    pub async fn save_admin_settings(&self, settings: &AdminSettings) -> Result<()> {
        self.set_json(keys::ADMIN_SETTINGS, settings).await
    }

    /// Stored profile, or the default profile if never saved.
    pub async fn user_profile(&self) -> Result<UserProfile> {
        Ok(self.get_json(keys::USER_PROFILE).await?.unwrap_or_default())
    }

    /// Validate and store the profile. Nothing is written when it is invalid.
    pub async fn save_user_profile(&self, profile: &UserProfile) -> Result<()> {
        profile.validate()?;
        self.set_json(keys::USER_PROFILE, profile).await
    }
}

// ---------------------------------------------------------------------------
// StoredSettings
// ---------------------------------------------------------------------------

/// [`SettingsSource`] backed by the database plus company keys from the environment.
///
/// In company mode (the default) a provider's company key wins when its env
/// var is set; otherwise the user's stored key is used.
pub struct StoredSettings {
    storage: Arc<Storage>,
    company_keys: CompanyKeysConfig,
}

impl StoredSettings {
    pub fn new(storage: Arc<Storage>, company_keys: CompanyKeysConfig) -> Self {
        Self {
            storage,
            company_keys,
        }
    }

    async fn resolve_key(
        &self,
        provider: AiProvider,
        company_key: impl FnOnce(AiProvider) -> Option<String>,
    ) -> Result<Option<String>> {
        if self.storage.use_company_api().await? {
            if let Some(key) = company_key(provider) {
                tracing::debug!(%provider, "using company API key");
                return Ok(Some(key));
            }
        }

        let user_key = self.storage.user_api_key(provider).await?;
        if user_key.is_some() {
            tracing::debug!(%provider, "using personal API key");
        } else {
            tracing::debug!(%provider, "no API key configured");
        }
        Ok(user_key)
    }
}

#[async_trait]
impl SettingsSource for StoredSettings {
    async fn pipeline_config(&self) -> Result<Option<PipelineConfig>> {
        self.storage.pipeline_config().await
    }

    async fn api_key(&self, provider: AiProvider) -> Result<Option<String>> {
        let company = &self.company_keys;
        self.resolve_key(provider, |p| company.key_for(p)).await
    }
}
