//! Chat request and response types for the supported providers.

use serde::{Deserialize, Serialize};

// =============================================================================
// Common
// =============================================================================

/// Chat message, in the OpenAI-compatible shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Normalized completion result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiResponse {
    /// Response text (empty if the provider returned no content)
    pub text: String,

    /// Total tokens billed, when reported
    pub tokens: Option<u64>,
}

// =============================================================================
// OpenAI-compatible (Groq, DeepSeek)
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Usage {
    pub total_tokens: Option<u64>,
}

impl ChatCompletionResponse {
    pub(crate) fn into_response(self) -> AiResponse {
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        AiResponse {
            text,
            tokens: self.usage.and_then(|u| u.total_tokens),
        }
    }
}

// =============================================================================
// Gemini
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GeminiContent {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GeminiPart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    pub usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiCandidate {
    pub content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiUsage {
    pub total_token_count: Option<u64>,
}

impl GeminiRequest {
    /// Gemini only knows "user" and "model"; system prompts travel as user turns.
    pub(crate) fn from_messages(messages: &[ChatMessage]) -> Self {
        let contents = messages
            .iter()
            .map(|m| GeminiContent {
                role: Some(if m.role == "assistant" { "model" } else { "user" }.to_string()),
                parts: vec![GeminiPart {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();
        Self { contents }
    }
}

impl GeminiResponse {
    pub(crate) fn into_response(self) -> AiResponse {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default();

        AiResponse {
            text,
            tokens: self.usage_metadata.and_then(|u| u.total_token_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_maps_roles() {
        let request = GeminiRequest::from_messages(&[
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ]);
        let json = serde_json::to_value(&request).unwrap();
        let roles: Vec<&str> = json["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "user", "model"]);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "be brief");
    }

    #[test]
    fn chat_response_missing_content_is_empty() {
        let raw: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{}}]}"#).unwrap();
        let response = raw.into_response();
        assert_eq!(response.text, "");
        assert_eq!(response.tokens, None);
    }

    #[test]
    fn chat_response_extracts_text_and_tokens() {
        let raw: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"ok"}}],"usage":{"total_tokens":42}}"#,
        )
        .unwrap();
        assert_eq!(
            raw.into_response(),
            AiResponse {
                text: "ok".into(),
                tokens: Some(42)
            }
        );
    }

    #[test]
    fn gemini_response_extracts_text_and_tokens() {
        let raw: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"olá"}]}}],"usageMetadata":{"totalTokenCount":7}}"#,
        )
        .unwrap();
        let response = raw.into_response();
        assert_eq!(response.text, "olá");
        assert_eq!(response.tokens, Some(7));
    }
}
