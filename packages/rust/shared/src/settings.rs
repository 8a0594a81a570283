//! Read-only view of stored settings.
//!
//! The context pipeline and tool runner never touch the database directly;
//! they read through [`SettingsSource`] so tests can inject fixed values.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AiProvider, PipelineConfig};

/// Narrow, read-only settings collaborator.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    /// Stored pipeline configuration, or `None` if the user never saved one.
    async fn pipeline_config(&self) -> Result<Option<PipelineConfig>>;

    /// API key to use for `provider`, or `None` if none is configured.
    async fn api_key(&self, provider: AiProvider) -> Result<Option<String>>;
}

/// Fixed settings held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    pub pipeline: Option<PipelineConfig>,
    pub keys: Vec<(AiProvider, String)>,
}

impl StaticSettings {
    pub fn new(pipeline: PipelineConfig) -> Self {
        Self {
            pipeline: Some(pipeline),
            keys: Vec::new(),
        }
    }

    pub fn with_key(mut self, provider: AiProvider, key: impl Into<String>) -> Self {
        self.keys.push((provider, key.into()));
        self
    }
}

#[async_trait]
impl SettingsSource for StaticSettings {
    async fn pipeline_config(&self) -> Result<Option<PipelineConfig>> {
        Ok(self.pipeline.clone())
    }

    async fn api_key(&self, provider: AiProvider) -> Result<Option<String>> {
        Ok(self
            .keys
            .iter()
            .find(|(p, _)| *p == provider)
            .map(|(_, k)| k.clone()))
    }
}
