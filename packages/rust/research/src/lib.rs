//! Context aggregation for research-backed tools.
//!
//! [`ContextAggregator`] queries up to three sources in a fixed sequence
//! (DeepSeek, Tavily, then Jina Reader on Tavily's top hit) and joins the
//! successful ones into one delimited string. Failures never escape: each
//! one becomes a failed [`SourceResult`] and contributes nothing.

mod jina;
mod report;
mod tavily;

use tracing::{debug, info, instrument, warn};

use offercopilot_providers::{AiClient, ChatMessage};
use offercopilot_shared::{AiProvider, EndpointsConfig, PipelineConfig, SettingsSource};

pub use jina::MAX_READER_CHARS;
pub use report::{ContextReport, SECTION_SEPARATOR, SourceKind, SourceOutcome, SourceResult};

/// Query used by [`test_pipeline`].
pub const TEST_QUERY: &str = "Empreendedores digitais no Brasil";

/// Error recorded when the DeepSeek step has no usable key.
pub const KEY_NOT_CONFIGURED: &str = "API key not configured";

const DEEPSEEK_SYSTEM_PROMPT: &str = "Você é um pesquisador especializado. Pesquise fontes variadas (notícias, fóruns, vídeos, artigos, estudos) e forneça informações detalhadas e contextualizadas.";

fn deepseek_user_prompt(query: &str) -> String {
    format!(
        "Faça uma pesquisa aprofundada sobre: {query}\n\nRetorne informações relevantes, dados demográficos, comportamentos, dores, desejos e fontes de informação do público."
    )
}

/// Search and reader endpoints.
#[derive(Debug, Clone)]
pub struct ResearchEndpoints {
    pub tavily_url: String,
    pub jina_url: String,
}

impl From<&EndpointsConfig> for ResearchEndpoints {
    fn from(config: &EndpointsConfig) -> Self {
        Self {
            tavily_url: config.tavily_url.clone(),
            jina_url: config.jina_url.clone(),
        }
    }
}

impl Default for ResearchEndpoints {
    fn default() -> Self {
        Self::from(&EndpointsConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Best-effort, sequential research pipeline.
///
/// Holds no state between calls; concurrent calls are independent.
pub struct ContextAggregator<'a> {
    settings: &'a dyn SettingsSource,
    ai: &'a AiClient,
    endpoints: ResearchEndpoints,
}

impl<'a> ContextAggregator<'a> {
    pub fn new(
        settings: &'a dyn SettingsSource,
        ai: &'a AiClient,
        endpoints: ResearchEndpoints,
    ) -> Self {
        Self {
            settings,
            ai,
            endpoints,
        }
    }

    /// Run every enabled source and return the combined context.
    ///
    /// Returns an empty string when no source succeeded.
    pub async fn build_context(&self, query: &str) -> String {
        self.collect(query).await.combined()
    }

    /// Run every enabled source, in order, and return the per-source results.
    #[instrument(skip_all, fields(query_chars = query.chars().count()))]
    pub async fn collect(&self, query: &str) -> ContextReport {
        let config = self.load_config().await;
        let mut report = ContextReport::default();

        if config.enable_deepseek {
            report.push(self.query_deepseek(query).await);
        }

        if config.enable_tavily {
            self.search_and_read(&config, query, &mut report).await;
        }

        info!(
            attempted = report.results.len(),
            succeeded = report.successes().count(),
            "context collected"
        );
        report
    }

    async fn load_config(&self) -> PipelineConfig {
        match self.settings.pipeline_config().await {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!("no stored pipeline config, using defaults");
                PipelineConfig::default()
            }
            Err(e) => {
                warn!(error = %e, "failed to read pipeline config, using defaults");
                PipelineConfig::default()
            }
        }
    }

    async fn query_deepseek(&self, query: &str) -> SourceResult {
        let source = SourceKind::DeepSeek;

        let key = match self.settings.api_key(AiProvider::DeepSeek).await {
            Ok(Some(key)) if !key.trim().is_empty() => key,
            Ok(_) => {
                warn!(%source, "skipping: no API key configured");
                return SourceResult::failed_with(source, KEY_NOT_CONFIGURED);
            }
            Err(e) => {
                warn!(%source, error = %e, "skipping: API key lookup failed");
                return SourceResult::failed_with(source, KEY_NOT_CONFIGURED);
            }
        };

        let messages = [
            ChatMessage::system(DEEPSEEK_SYSTEM_PROMPT),
            ChatMessage::user(deepseek_user_prompt(query)),
        ];

        match self
            .ai
            .run(
                AiProvider::DeepSeek,
                &key,
                AiProvider::DeepSeek.default_model(),
                &messages,
            )
            .await
        {
            Ok(response) => {
                info!(%source, chars = response.text.chars().count(), "source succeeded");
                SourceResult::succeeded_with(source, response.text)
            }
            Err(e) => {
                warn!(%source, error = %e, "source failed");
                SourceResult::failed_with(source, e.to_string())
            }
        }
    }

    /// Tavily, then Jina on the first hit. Jina is only reachable from a
    /// successful search with a first result carrying a URL.
    async fn search_and_read(
        &self,
        config: &PipelineConfig,
        query: &str,
        report: &mut ContextReport,
    ) {
        let Some(search_key) = config.search_key() else {
            warn!(source = %SourceKind::Tavily, "skipping: no search key configured");
            return;
        };

        let http = self.ai.http();
        let search = match tavily::search(http, &self.endpoints.tavily_url, search_key, query).await
        {
            Ok(search) => search,
            Err(e) => {
                warn!(source = %SourceKind::Tavily, error = %e, "source failed");
                report.push(SourceResult::failed_with(SourceKind::Tavily, e.to_string()));
                return;
            }
        };

        info!(
            source = %SourceKind::Tavily,
            results = search.results.len(),
            answered = search.answer.as_deref().is_some_and(|a| !a.is_empty()),
            "source succeeded"
        );
        report.push(SourceResult::succeeded_with(SourceKind::Tavily, search.data()));

        if !config.effective_jina() {
            return;
        }

        let Some(page_url) = search.first_url() else {
            debug!(source = %SourceKind::Jina, "skipping: no search result to read");
            return;
        };

        let result = match jina::read(http, &self.endpoints.jina_url, page_url).await {
            Ok(content) => {
                info!(
                    source = %SourceKind::Jina,
                    page_url,
                    chars = content.chars().count(),
                    "source succeeded"
                );
                SourceResult::succeeded_with(SourceKind::Jina, content)
            }
            Err(e) => {
                warn!(source = %SourceKind::Jina, page_url, error = %e, "source failed");
                SourceResult::failed_with(SourceKind::Jina, e.to_string())
            }
        };
        report.push(result);
    }
}

/// Smoke-test the pipeline with a fixed query. Returns whether any source
/// contributed context.
pub async fn test_pipeline(aggregator: &ContextAggregator<'_>) -> bool {
    let context = aggregator.build_context(TEST_QUERY).await;
    info!(chars = context.chars().count(), "pipeline test finished");
    !context.is_empty()
}
