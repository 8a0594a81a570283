//! Agent presets: a named model, temperature, and base prompt.

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};

use offercopilot_shared::{Agent, OfferCopilotError, Result};
use offercopilot_storage::Storage;

/// Accepted temperature range.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// Fields for a new agent. Model and temperature fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewAgent {
    pub name: String,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub prompt_base: String,
}

/// Partial agent edit; `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub prompt_base: Option<String>,
}

fn check_agent(agent: &Agent) -> Result<()> {
    if agent.name.trim().is_empty() {
        return Err(OfferCopilotError::validation("agent name must not be empty"));
    }
    if agent.model.trim().is_empty() {
        return Err(OfferCopilotError::validation("agent model must not be empty"));
    }
    if !TEMPERATURE_RANGE.contains(&agent.temperature) {
        return Err(OfferCopilotError::validation(format!(
            "temperature must be between {} and {}, got {}",
            TEMPERATURE_RANGE.start(),
            TEMPERATURE_RANGE.end(),
            agent.temperature
        )));
    }
    Ok(())
}

/// CRUD over the stored agents.
pub struct AgentRegistry<'a> {
    storage: &'a Storage,
}

impl<'a> AgentRegistry<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn all(&self) -> Result<Vec<Agent>> {
        self.storage.list_agents().await
    }

    pub async fn get(&self, id: &str) -> Result<Agent> {
        self.storage
            .get_agent(id)
            .await?
            .ok_or_else(|| OfferCopilotError::not_found("agent", id))
    }

    #[instrument(skip_all)]
    pub async fn create(&self, new: NewAgent) -> Result<Agent> {
        let mut agent = Agent::new(new.name.trim());
        if let Some(model) = new.model.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()) {
            agent.model = model;
        }
        if let Some(temperature) = new.temperature {
            agent.temperature = temperature;
        }
        agent.prompt_base = new.prompt_base;
        check_agent(&agent)?;

        self.storage.insert_agent(&agent).await?;
        info!(id = %agent.id, model = %agent.model, "agent created");
        Ok(agent)
    }

    #[instrument(skip_all, fields(id = %id))]
    pub async fn update(&self, id: &str, update: AgentUpdate) -> Result<Agent> {
        let mut agent = self.get(id).await?;

        if let Some(name) = update.name {
            agent.name = name.trim().to_string();
        }
        if let Some(model) = update.model {
            agent.model = model.trim().to_string();
        }
        if let Some(temperature) = update.temperature {
            agent.temperature = temperature;
        }
        if let Some(prompt_base) = update.prompt_base {
            agent.prompt_base = prompt_base;
        }
        agent.updated_at = Utc::now();
        check_agent(&agent)?;

        if !self.storage.update_agent(&agent).await? {
            return Err(OfferCopilotError::not_found("agent", id));
        }
        info!("agent updated");
        Ok(agent)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.storage.delete_agent(id).await? {
            return Err(OfferCopilotError::not_found("agent", id));
        }
        info!(id, "agent deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offercopilot_shared::DEFAULT_AGENT_TEMPERATURE;
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("oc_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn named(name: &str) -> NewAgent {
        NewAgent {
            name: name.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let storage = test_storage().await;
        let registry = AgentRegistry::new(&storage);

        let agent = registry.create(named("Redator")).await.unwrap();
        assert_eq!(agent.model, "llama-3.3-70b-versatile");
        assert_eq!(agent.temperature, DEFAULT_AGENT_TEMPERATURE);

        let cold = registry
            .create(NewAgent {
                model: Some("deepseek-chat".into()),
                temperature: Some(0.0),
                ..named("Analista")
            })
            .await
            .unwrap();
        assert_eq!(cold.model, "deepseek-chat");
        assert_eq!(cold.temperature, 0.0);

        let names: Vec<String> = registry.all().await.unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["Redator", "Analista"]);
    }

    #[tokio::test]
    async fn invalid_agents_are_rejected() {
        let storage = test_storage().await;
        let registry = AgentRegistry::new(&storage);

        assert!(registry.create(named("  ")).await.is_err());
        let hot = registry
            .create(NewAgent {
                temperature: Some(2.5),
                ..named("Caótico")
            })
            .await
            .unwrap_err();
        assert!(hot.to_string().contains("temperature must be between 0 and 2"));
        assert!(registry.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete() {
        let storage = test_storage().await;
        let registry = AgentRegistry::new(&storage);
        let agent = registry.create(named("Redator")).await.unwrap();

        let updated = registry
            .update(
                &agent.id,
                AgentUpdate {
                    temperature: Some(1.1),
                    prompt_base: Some("Escreva e-mails de vendas.".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.model, agent.model);
        assert_eq!(updated.temperature, 1.1);
        assert_eq!(registry.get(&agent.id).await.unwrap(), updated);

        let bad = AgentUpdate {
            model: Some(String::new()),
            ..Default::default()
        };
        assert!(registry.update(&agent.id, bad).await.is_err());
        assert_eq!(registry.get(&agent.id).await.unwrap(), updated);

        registry.delete(&agent.id).await.unwrap();
        assert!(matches!(
            registry.get(&agent.id).await,
            Err(OfferCopilotError::NotFound { kind: "agent", .. })
        ));
    }
}
