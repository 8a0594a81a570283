//! Core domain types for Offer Copilot.
//!
//! Field names serialize in camelCase so records stay compatible with the
//! JSON shapes the settings page and tool editor have always written.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OfferCopilotError;

// ---------------------------------------------------------------------------
// AiProvider
// ---------------------------------------------------------------------------

/// Chat-completion providers the AI adapter knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Groq,
    DeepSeek,
    Gemini,
}

impl AiProvider {
    /// All providers, in display order.
    pub const ALL: [AiProvider; 3] = [AiProvider::Groq, AiProvider::DeepSeek, AiProvider::Gemini];

    /// Storage key / CLI name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::DeepSeek => "deepseek",
            Self::Gemini => "gemini",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Groq => "Groq",
            Self::DeepSeek => "DeepSeek",
            Self::Gemini => "Gemini",
        }
    }

    /// Model used when a caller passes an empty model name.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Groq => "llama-3.3-70b-versatile",
            Self::DeepSeek => "deepseek-chat",
            Self::Gemini => "gemini-2.0-flash-exp",
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiProvider {
    type Err = OfferCopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "deepseek" => Ok(Self::DeepSeek),
            "gemini" => Ok(Self::Gemini),
            other => Err(OfferCopilotError::validation(format!(
                "unknown provider '{other}': expected groq, deepseek, or gemini"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Which research sources the context pipeline may query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    #[serde(rename = "enableDeepSeek")]
    pub enable_deepseek: bool,

    #[serde(rename = "enableTavily")]
    pub enable_tavily: bool,

    /// Only honored when Tavily is enabled; the reader follows the top search hit.
    #[serde(rename = "enableJina")]
    pub enable_jina: bool,

    #[serde(rename = "tavilyApiKey", skip_serializing_if = "Option::is_none")]
    pub tavily_search_key: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_deepseek: true,
            enable_tavily: false,
            enable_jina: false,
            tavily_search_key: None,
        }
    }
}

impl PipelineConfig {
    /// Whether the deep reader can ever run under this config.
    pub fn effective_jina(&self) -> bool {
        self.enable_jina && self.enable_tavily
    }

    /// The search key, if set to something non-blank.
    pub fn search_key(&self) -> Option<&str> {
        self.tavily_search_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// Form control used to collect a tool input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Textarea,
    Select,
    Number,
}

/// Shape the tool's output is expected to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Text,
    List,
    Json,
}

/// One input field of a tool form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInput {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: InputKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Allowed values for `select` inputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// A prompt template the user can run against an AI provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    /// System prompt sent with every run.
    pub prompt: String,
    pub inputs: Vec<ToolInput>,
    pub output_type: OutputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Run the context pipeline on the inputs and inject the result into the prompt.
    #[serde(default)]
    pub research_context: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ordered `(input id, value)` pairs submitted for a tool run.
pub type InputValues = Vec<(String, String)>;

/// A recorded tool run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecution {
    pub id: String,
    pub tool_id: String,
    pub tool_name: String,
    pub inputs: InputValues,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    pub provider: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

impl ToolExecution {
    /// Start a new execution record stamped with a fresh UUID v7 and the current time.
    pub fn new(tool: &ToolDefinition, inputs: InputValues, provider: AiProvider, model: &str) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            tool_id: tool.id.clone(),
            tool_name: tool.name.clone(),
            inputs,
            output: String::new(),
            tokens: None,
            provider: provider.as_str().to_string(),
            model: model.to_string(),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

/// Preferences edited from admin mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSettings {
    pub theme: Theme,
    pub default_provider: AiProvider,
    pub default_model: String,
    pub auto_save: bool,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            default_provider: AiProvider::Groq,
            default_model: AiProvider::Groq.default_model().to_string(),
            auto_save: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Clients and agents
// ---------------------------------------------------------------------------

/// A customer the user writes copy for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub segment: String,
    #[serde(default)]
    pub persona: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub voice_tone: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// A client with only a name, stamped with a fresh UUID v7.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            segment: String::new(),
            persona: String::new(),
            notes: String::new(),
            voice_tone: String::new(),
            objectives: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Temperature given to agents created without one.
pub const DEFAULT_AGENT_TEMPERATURE: f32 = 0.7;

/// A saved model + prompt preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub model: String,
    pub temperature: f32,
    #[serde(default)]
    pub prompt_base: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// An agent on the Groq default model at the default temperature.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            model: AiProvider::Groq.default_model().to_string(),
            temperature: DEFAULT_AGENT_TEMPERATURE,
            prompt_base: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// User profile
// ---------------------------------------------------------------------------

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("valid regex")
});

static INSTAGRAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@?[a-zA-Z0-9._]{1,30}$").expect("valid regex"));

/// The local user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub email: String,
    pub full_name: String,
    pub bio: String,
    /// Image URL (or data URL).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub timezone: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram_handle: Option<String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            email: String::new(),
            full_name: String::new(),
            bio: String::new(),
            avatar: None,
            timezone: "America/Sao_Paulo".into(),
            language: "pt-BR".into(),
            instagram_handle: None,
        }
    }
}

impl UserProfile {
    /// Field-level problems as `(field, message)`, at most one per field.
    pub fn issues(&self) -> Vec<(&'static str, &'static str)> {
        let mut issues = Vec::new();

        let email = self.email.as_str();
        if email.is_empty() {
            issues.push(("email", "Email é obrigatório"));
        } else if email.starts_with('.') || email.contains("..") || !EMAIL_RE.is_match(email) {
            issues.push(("email", "Email inválido"));
        }

        let name_len = self.full_name.chars().count();
        if name_len < 2 {
            issues.push(("fullName", "Nome deve ter pelo menos 2 caracteres"));
        } else if name_len > 100 {
            issues.push(("fullName", "Nome muito longo"));
        }

        if self.bio.chars().count() > 500 {
            issues.push(("bio", "Bio deve ter no máximo 500 caracteres"));
        }
        if self.timezone.is_empty() {
            issues.push(("timezone", "Selecione um timezone"));
        }
        if self.language.is_empty() {
            issues.push(("language", "Selecione um idioma"));
        }

        if let Some(handle) = self.instagram_handle.as_deref() {
            if !handle.is_empty() && !INSTAGRAM_RE.is_match(handle) {
                issues.push(("instagramHandle", "Handle do Instagram inválido"));
            }
        }
        issues
    }

    pub fn validate(&self) -> Result<(), OfferCopilotError> {
        let issues = self.issues();
        if issues.is_empty() {
            return Ok(());
        }
        let listed: Vec<String> = issues
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        Err(OfferCopilotError::validation(listed.join("; ")))
    }

    /// Up to two uppercase initials from the full name, or `U` when unnamed.
    pub fn initials(&self) -> String {
        let initials: String = self
            .full_name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect();
        if initials.is_empty() {
            "U".into()
        } else {
            initials
        }
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// How often a tool has been run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub name: String,
    pub count: u64,
}

/// Aggregate usage numbers shown on the dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_executions: u64,
    pub total_tokens: u64,
    pub top_tools: Vec<ToolUsage>,
    pub recent_executions: Vec<ToolExecution>,
}
