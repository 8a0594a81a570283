//! The Copilot chat assistant: a multi-turn conversation about the app,
//! replayed in full to the configured provider on every message.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use offercopilot_providers::{AiClient, ChatMessage};
use offercopilot_shared::{AdminSettings, AiProvider, OfferCopilotError, Result, SettingsSource};
use offercopilot_storage::Storage;

use crate::runner::provider_and_model;

pub const COPILOT_GREETING: &str = "Olá! Sou seu Copilot. Como posso ajudar você hoje?";

pub const COPILOT_SYSTEM_PROMPT: &str = "Você é o Copilot do Offer Copilot, um assistente de IA especializado em marketing e copywriting.

Você tem acesso à estrutura do app:
- Dashboard: estatísticas e métricas de uso
- Agentes: configuração de agentes de IA personalizados
- Clientes: gestão de clientes e personas
- Ferramentas: geradores de headlines, VSL, hooks, ofertas, etc.
- API: configuração de provedores (Groq, DeepSeek, Gemini)
- Configurações: parâmetros padrão de IA

Suas capacidades:
1. Explicar funcionalidades do app
2. Sugerir melhorias de prompts e estratégias
3. Orientar sobre como usar as ferramentas
4. Analisar dados e métricas
5. Recomendar melhores práticas de copywriting

Seja conciso, direto e sempre focado em ajudar o usuário a criar ofertas e conteúdos melhores.";

/// One message of the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct CopilotTurn {
    pub message: ChatMessage,
    /// Names of files attached to this message.
    pub files: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl CopilotTurn {
    fn new(message: ChatMessage, files: Vec<String>) -> Self {
        Self {
            message,
            files,
            timestamp: Utc::now(),
        }
    }

    /// The message as replayed in later requests, with attachments listed.
    fn replayed(&self) -> ChatMessage {
        if self.files.is_empty() {
            return self.message.clone();
        }
        ChatMessage {
            role: self.message.role.clone(),
            content: format!("{}\n[Arquivos: {}]", self.message.content, self.files.join(", ")),
        }
    }
}

/// A Copilot conversation. History lives in memory for the session.
pub struct CopilotChat<'a> {
    storage: &'a Storage,
    settings: &'a dyn SettingsSource,
    ai: &'a AiClient,
    fallback_provider: AiProvider,
    fallback_model: String,
    history: Vec<CopilotTurn>,
}

impl<'a> CopilotChat<'a> {
    pub fn new(storage: &'a Storage, settings: &'a dyn SettingsSource, ai: &'a AiClient) -> Self {
        let defaults = AdminSettings::default();
        Self {
            storage,
            settings,
            ai,
            fallback_provider: defaults.default_provider,
            fallback_model: defaults.default_model,
            history: vec![CopilotTurn::new(ChatMessage::assistant(COPILOT_GREETING), Vec::new())],
        }
    }

    /// Provider and model to use when no admin settings are stored.
    pub fn with_fallback(mut self, provider: AiProvider, model: impl Into<String>) -> Self {
        self.fallback_provider = provider;
        self.fallback_model = model.into();
        self
    }

    /// Every turn so far, starting with the greeting.
    pub fn history(&self) -> &[CopilotTurn] {
        &self.history
    }

    /// Drop the conversation and start over from the greeting.
    pub fn clear(&mut self) {
        self.history = vec![CopilotTurn::new(ChatMessage::assistant(COPILOT_GREETING), Vec::new())];
    }

    /// Request messages: the system prompt, the replayed history, then the new message.
    fn request(&self, content: &str, files: &[String]) -> Vec<ChatMessage> {
        let mut full = content.to_string();
        if !files.is_empty() {
            full.push_str(&format!("\n\n[Arquivos anexados: {}]", files.join(", ")));
        }

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(COPILOT_SYSTEM_PROMPT));
        messages.extend(self.history.iter().map(CopilotTurn::replayed));
        messages.push(ChatMessage::user(full));
        messages
    }

    /// Send a message and return the reply.
    ///
    /// Both the message and the outcome are appended to the history; a
    /// failure is recorded as an assistant turn reading `Erro: ...`.
    #[instrument(skip_all, fields(turns = self.history.len()))]
    pub async fn send(&mut self, content: &str, files: &[String]) -> Result<String> {
        let messages = self.request(content, files);
        self.history.push(CopilotTurn::new(ChatMessage::user(content), files.to_vec()));

        match self.complete(&messages).await {
            Ok(reply) => {
                self.history
                    .push(CopilotTurn::new(ChatMessage::assistant(reply.clone()), Vec::new()));
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "copilot reply failed");
                self.history.push(CopilotTurn::new(
                    ChatMessage::assistant(format!("Erro: {e}")),
                    Vec::new(),
                ));
                Err(e)
            }
        }
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let (provider, model) =
            provider_and_model(self.storage, self.fallback_provider, &self.fallback_model).await?;
        let api_key = self
            .settings
            .api_key(provider)
            .await?
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                OfferCopilotError::config(format!(
                    "Configure a chave de API do {provider} com `offercopilot keys set {provider}`"
                ))
            })?;

        let response = self.ai.run(provider, &api_key, &model, messages).await?;
        info!(%provider, model = %model, tokens = response.tokens, "copilot replied");
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offercopilot_providers::ProviderEndpoints;
    use offercopilot_shared::StaticSettings;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("oc_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn client_for(server: &MockServer) -> AiClient {
        AiClient::new(ProviderEndpoints {
            groq_url: format!("{}/groq", server.uri()),
            deepseek_url: format!("{}/deepseek", server.uri()),
            gemini_url: format!("{}/gemini", server.uri()),
        })
        .unwrap()
    }

    fn completion(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": text}}],
            "usage": {"total_tokens": 12}
        }))
    }

    #[test]
    fn starts_with_greeting() {
        let turn = CopilotTurn::new(ChatMessage::assistant(COPILOT_GREETING), Vec::new());
        assert_eq!(turn.replayed(), ChatMessage::assistant(COPILOT_GREETING));

        let with_files = CopilotTurn::new(
            ChatMessage::user("veja"),
            vec!["briefing.pdf".into(), "logo.png".into()],
        );
        assert_eq!(
            with_files.replayed().content,
            "veja\n[Arquivos: briefing.pdf, logo.png]"
        );
    }

    #[tokio::test]
    async fn conversation_is_replayed_each_turn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/groq"))
            .and(body_partial_json(json!({
                "model": "llama-3.3-70b-versatile",
                "messages": [
                    {"role": "system", "content": COPILOT_SYSTEM_PROMPT},
                    {"role": "assistant", "content": COPILOT_GREETING},
                    {"role": "user", "content": "Oi"}
                ]
            })))
            .respond_with(completion("Olá!"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/groq"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "system", "content": COPILOT_SYSTEM_PROMPT},
                    {"role": "assistant", "content": COPILOT_GREETING},
                    {"role": "user", "content": "Oi"},
                    {"role": "assistant", "content": "Olá!"},
                    {"role": "user", "content": "Crie um hook\n\n[Arquivos anexados: oferta.txt]"}
                ]
            })))
            .respond_with(completion("Pare de rolar!"))
            .expect(1)
            .mount(&server)
            .await;

        let storage = test_storage().await;
        let settings = StaticSettings::default().with_key(AiProvider::Groq, "gsk");
        let ai = client_for(&server);
        let mut chat = CopilotChat::new(&storage, &settings, &ai);

        assert_eq!(chat.send("Oi", &[]).await.unwrap(), "Olá!");
        let reply = chat.send("Crie um hook", &["oferta.txt".into()]).await.unwrap();
        assert_eq!(reply, "Pare de rolar!");

        let history = chat.history();
        assert_eq!(history.len(), 5);
        assert_eq!(history[3].files, vec!["oferta.txt"]);
        assert_eq!(history[3].message.content, "Crie um hook");
        assert_eq!(history[4].message, ChatMessage::assistant("Pare de rolar!"));

        chat.clear();
        assert_eq!(chat.history().len(), 1);
        assert_eq!(chat.history()[0].message.content, COPILOT_GREETING);
    }

    #[tokio::test]
    async fn uses_stored_admin_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deepseek"))
            .and(body_partial_json(json!({"model": "deepseek-reasoner"})))
            .respond_with(completion("resposta"))
            .expect(1)
            .mount(&server)
            .await;

        let storage = test_storage().await;
        storage
            .save_admin_settings(&AdminSettings {
                default_provider: AiProvider::DeepSeek,
                default_model: "deepseek-reasoner".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let settings = StaticSettings::default().with_key(AiProvider::DeepSeek, "sk");
        let ai = client_for(&server);
        let mut chat = CopilotChat::new(&storage, &settings, &ai)
            .with_fallback(AiProvider::Gemini, "gemini-2.0-flash-exp");

        assert_eq!(chat.send("Oi", &[]).await.unwrap(), "resposta");
    }

    #[tokio::test]
    async fn missing_key_is_recorded_as_error_turn() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let storage = test_storage().await;
        let settings = StaticSettings::default();
        let ai = client_for(&server);
        let mut chat = CopilotChat::new(&storage, &settings, &ai);

        let err = chat.send("Oi", &[]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "config error: Configure a chave de API do groq com `offercopilot keys set groq`"
        );

        let history = chat.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].message, ChatMessage::user("Oi"));
        assert_eq!(history[2].message.role, "assistant");
        assert_eq!(history[2].message.content, format!("Erro: {err}"));
    }
}
