//! Tool runner: validate inputs, optionally gather research context, call
//! the configured provider, and record the execution.

use tracing::{info, instrument};

use offercopilot_providers::{AiClient, ChatMessage};
use offercopilot_research::{ContextAggregator, ResearchEndpoints};
use offercopilot_shared::{
    AdminSettings, AiProvider, InputKind, InputValues, OfferCopilotError, Result, SettingsSource,
    ToolDefinition, ToolExecution,
};
use offercopilot_storage::Storage;

/// Value submitted for `id`, if any.
fn value_of<'v>(inputs: &'v InputValues, id: &str) -> Option<&'v str> {
    inputs
        .iter()
        .find(|(key, _)| key == id)
        .map(|(_, value)| value.as_str())
}

/// Check submitted values against the tool's input definitions.
pub fn validate_inputs(tool: &ToolDefinition, inputs: &InputValues) -> Result<()> {
    if let Some((unknown, _)) = inputs
        .iter()
        .find(|(key, _)| !tool.inputs.iter().any(|field| &field.id == key))
    {
        return Err(OfferCopilotError::validation(format!(
            "unknown input '{unknown}' for tool '{}'",
            tool.id
        )));
    }

    let missing: Vec<&str> = tool
        .inputs
        .iter()
        .filter(|field| field.required)
        .filter(|field| value_of(inputs, &field.id).is_none_or(|v| v.trim().is_empty()))
        .map(|field| field.label.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(OfferCopilotError::validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    for field in &tool.inputs {
        let Some(value) = value_of(inputs, &field.id).map(str::trim) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        match field.kind {
            InputKind::Number if value.replace(',', ".").parse::<f64>().is_err() => {
                return Err(OfferCopilotError::validation(format!(
                    "{} must be a number, got '{value}'",
                    field.label
                )));
            }
            InputKind::Select
                if !field.options.is_empty() && !field.options.iter().any(|o| o == value) =>
            {
                return Err(OfferCopilotError::validation(format!(
                    "{} must be one of: {}",
                    field.label,
                    field.options.join(", ")
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

/// Research query for a tool run: the submitted values, in the tool's input
/// order, joined by single spaces. Blank values are left out.
pub fn build_research_query(tool: &ToolDefinition, inputs: &InputValues) -> String {
    tool.inputs
        .iter()
        .filter_map(|field| value_of(inputs, &field.id))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// System prompt with research context appended.
pub fn research_prompt(prompt: &str, context: &str) -> String {
    format!(
        "{prompt}\n\nVocê tem acesso ao seguinte contexto de pesquisa profunda:\n\n{context}\n\nUse essas informações para gerar uma análise completa e aprofundada."
    )
}

/// User message listing every submitted input as `id: value`.
pub fn inputs_message(inputs: &InputValues) -> String {
    let lines: Vec<String> = inputs.iter().map(|(k, v)| format!("{k}: {v}")).collect();
    format!("Inputs:\n{}", lines.join("\n"))
}

/// Provider and model from the stored admin settings, else the fallback.
/// An empty model means the provider's default.
pub(crate) async fn provider_and_model(
    storage: &Storage,
    fallback_provider: AiProvider,
    fallback_model: &str,
) -> Result<(AiProvider, String)> {
    let (provider, model) = match storage.admin_settings().await? {
        Some(admin) => (admin.default_provider, admin.default_model),
        None => (fallback_provider, fallback_model.to_string()),
    };

    let model = if model.trim().is_empty() {
        provider.default_model().to_string()
    } else {
        model
    };
    Ok((provider, model))
}

/// Runs tools against the configured provider.
pub struct ToolRunner<'a> {
    storage: &'a Storage,
    settings: &'a dyn SettingsSource,
    ai: &'a AiClient,
    research: ResearchEndpoints,
    fallback_provider: AiProvider,
    fallback_model: String,
}

impl<'a> ToolRunner<'a> {
    pub fn new(
        storage: &'a Storage,
        settings: &'a dyn SettingsSource,
        ai: &'a AiClient,
        research: ResearchEndpoints,
    ) -> Self {
        let defaults = AdminSettings::default();
        Self {
            storage,
            settings,
            ai,
            research,
            fallback_provider: defaults.default_provider,
            fallback_model: defaults.default_model,
        }
    }

    /// Provider and model to use when no admin settings are stored.
    pub fn with_fallback(mut self, provider: AiProvider, model: impl Into<String>) -> Self {
        self.fallback_provider = provider;
        self.fallback_model = model.into();
        self
    }

    /// Run `tool` with `inputs` and record the execution.
    #[instrument(skip_all, fields(tool = %tool.id))]
    pub async fn run(&self, tool: &ToolDefinition, inputs: InputValues) -> Result<ToolExecution> {
        validate_inputs(tool, &inputs)?;

        let (provider, model) =
            provider_and_model(self.storage, self.fallback_provider, &self.fallback_model).await?;
        let api_key = self
            .settings
            .api_key(provider)
            .await?
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                OfferCopilotError::config(format!(
                    "API key not configured for {}",
                    provider.display_name()
                ))
            })?;

        let system = if tool.research_context {
            let query = build_research_query(tool, &inputs);
            let aggregator = ContextAggregator::new(self.settings, self.ai, self.research.clone());
            let context = aggregator.build_context(&query).await;
            info!(context_chars = context.chars().count(), "research context gathered");
            research_prompt(&tool.prompt, &context)
        } else {
            tool.prompt.clone()
        };

        let messages = [
            ChatMessage::system(system),
            ChatMessage::user(inputs_message(&inputs)),
        ];
        let response = self.ai.run(provider, &api_key, &model, &messages).await?;

        let mut execution = ToolExecution::new(tool, inputs, provider, &model);
        execution.output = response.text;
        execution.tokens = response.tokens;
        self.storage.insert_execution(&execution).await?;

        info!(
            %provider,
            model = %execution.model,
            tokens = execution.tokens,
            "tool run recorded"
        );
        Ok(execution)
    }
}
