//! AI adapter: one entry point for every supported chat provider.
//!
//! [`AiClient::run`] maps a provider name to its request/response shape:
//! Groq and DeepSeek speak the OpenAI chat-completions protocol, Gemini
//! uses `generateContent`. Every provider returns a normalized [`AiResponse`].

mod types;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use offercopilot_shared::{AiProvider, EndpointsConfig, OfferCopilotError, Result};

pub use types::{AiResponse, ChatMessage};
use types::{ChatCompletionRequest, ChatCompletionResponse, GeminiRequest, GeminiResponse};

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("OfferCopilot/", env!("CARGO_PKG_VERSION"));

/// Sampling temperature used when the caller does not override it.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Chat endpoints for each provider.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    /// Full chat-completions URL.
    pub groq_url: String,
    /// Full chat-completions URL.
    pub deepseek_url: String,
    /// API base; `/models/<model>:generateContent` is appended.
    pub gemini_url: String,
}

impl From<&EndpointsConfig> for ProviderEndpoints {
    fn from(config: &EndpointsConfig) -> Self {
        Self {
            groq_url: config.groq_url.clone(),
            deepseek_url: config.deepseek_url.clone(),
            gemini_url: config.gemini_url.clone(),
        }
    }
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self::from(&EndpointsConfig::default())
    }
}

/// HTTP client for the chat providers.
#[derive(Debug, Clone)]
pub struct AiClient {
    client: Client,
    endpoints: ProviderEndpoints,
    temperature: f32,
}

impl AiClient {
    /// Create a client for the given endpoints.
    pub fn new(endpoints: ProviderEndpoints) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| OfferCopilotError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoints,
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Override the sampling temperature sent to OpenAI-compatible providers.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Shared HTTP client, for collaborators that call non-chat endpoints.
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Run a chat completion against `provider`.
    ///
    /// An empty `model` selects the provider's default model.
    #[instrument(skip_all, fields(%provider, model = %model, messages = messages.len()))]
    pub async fn run(
        &self,
        provider: AiProvider,
        api_key: &str,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<AiResponse> {
        if api_key.trim().is_empty() {
            return Err(OfferCopilotError::config(format!(
                "{} API key not configured",
                provider.display_name()
            )));
        }

        let model = if model.trim().is_empty() {
            provider.default_model()
        } else {
            model
        };

        let response = match provider {
            AiProvider::Groq => {
                self.run_openai_compatible(provider, &self.endpoints.groq_url, api_key, model, messages)
                    .await?
            }
            AiProvider::DeepSeek => {
                self.run_openai_compatible(
                    provider,
                    &self.endpoints.deepseek_url,
                    api_key,
                    model,
                    messages,
                )
                .await?
            }
            AiProvider::Gemini => self.run_gemini(api_key, model, messages).await?,
        };

        debug!(
            chars = response.text.len(),
            tokens = response.tokens,
            "completion received"
        );
        Ok(response)
    }

    async fn run_openai_compatible(
        &self,
        provider: AiProvider,
        url: &str,
        api_key: &str,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<AiResponse> {
        let body = ChatCompletionRequest {
            model,
            messages,
            temperature: self.temperature,
        };

        let request = self.client.post(url).bearer_auth(api_key).json(&body);
        let raw: ChatCompletionResponse = send_json(provider, request).await?;
        Ok(raw.into_response())
    }

    async fn run_gemini(
        &self,
        api_key: &str,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<AiResponse> {
        let url = format!(
            "{}/models/{model}:generateContent",
            self.endpoints.gemini_url.trim_end_matches('/')
        );
        let body = GeminiRequest::from_messages(messages);

        let request = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body);
        let raw: GeminiResponse = send_json(AiProvider::Gemini, request).await?;
        Ok(raw.into_response())
    }
}

/// Send a request and decode a JSON success body.
async fn send_json<T: DeserializeOwned>(
    provider: AiProvider,
    request: reqwest::RequestBuilder,
) -> Result<T> {
    let name = provider.display_name();

    let response = request
        .send()
        .await
        .map_err(|e| OfferCopilotError::Network(format!("{name}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(OfferCopilotError::Provider(format!("{name} API error: {body}")));
    }

    response
        .json()
        .await
        .map_err(|e| OfferCopilotError::parse(format!("{name}: invalid response body: {e}")))
}
