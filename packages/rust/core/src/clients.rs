//! Client records: who the copy is written for.

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};

use offercopilot_shared::{Client, OfferCopilotError, Result};
use offercopilot_storage::Storage;

/// Split a comma-separated objectives field, dropping blanks.
pub fn parse_objectives(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn clean_objectives(objectives: Vec<String>) -> Vec<String> {
    objectives
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

/// Fields for a new client. Everything but the name may be left out.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewClient {
    pub name: String,
    pub segment: String,
    pub persona: String,
    pub notes: String,
    pub voice_tone: String,
    pub objectives: Vec<String>,
}

/// Partial client edit; `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub segment: Option<String>,
    pub persona: Option<String>,
    pub notes: Option<String>,
    pub voice_tone: Option<String>,
    pub objectives: Option<Vec<String>>,
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(OfferCopilotError::validation("client name must not be empty"));
    }
    Ok(())
}

/// CRUD over the stored clients.
pub struct ClientRegistry<'a> {
    storage: &'a Storage,
}

impl<'a> ClientRegistry<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn all(&self) -> Result<Vec<Client>> {
        self.storage.list_clients().await
    }

    pub async fn get(&self, id: &str) -> Result<Client> {
        self.storage
            .get_client(id)
            .await?
            .ok_or_else(|| OfferCopilotError::not_found("client", id))
    }

    #[instrument(skip_all)]
    pub async fn create(&self, new: NewClient) -> Result<Client> {
        check_name(&new.name)?;

        let mut client = Client::new(new.name.trim());
        client.segment = new.segment;
        client.persona = new.persona;
        client.notes = new.notes;
        client.voice_tone = new.voice_tone;
        client.objectives = clean_objectives(new.objectives);

        self.storage.insert_client(&client).await?;
        info!(id = %client.id, name = %client.name, "client created");
        Ok(client)
    }

    #[instrument(skip_all, fields(id = %id))]
    pub async fn update(&self, id: &str, update: ClientUpdate) -> Result<Client> {
        let mut client = self.get(id).await?;

        if let Some(name) = update.name {
            check_name(&name)?;
            client.name = name.trim().to_string();
        }
        if let Some(segment) = update.segment {
            client.segment = segment;
        }
        if let Some(persona) = update.persona {
            client.persona = persona;
        }
        if let Some(notes) = update.notes {
            client.notes = notes;
        }
        if let Some(voice_tone) = update.voice_tone {
            client.voice_tone = voice_tone;
        }
        if let Some(objectives) = update.objectives {
            client.objectives = clean_objectives(objectives);
        }
        client.updated_at = Utc::now();

        if !self.storage.update_client(&client).await? {
            return Err(OfferCopilotError::not_found("client", id));
        }
        info!("client updated");
        Ok(client)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.storage.delete_client(id).await? {
            return Err(OfferCopilotError::not_found("client", id));
        }
        info!(id, "client deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("oc_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[test]
    fn objectives_split_on_commas() {
        assert_eq!(
            parse_objectives(" vender mais, ,fidelizar ,"),
            vec!["vender mais", "fidelizar"]
        );
        assert!(parse_objectives("").is_empty());
    }

    #[tokio::test]
    async fn create_fills_blank_fields() {
        let storage = test_storage().await;
        let registry = ClientRegistry::new(&storage);

        let client = registry
            .create(NewClient {
                name: "  Acme  ".into(),
                objectives: vec!["lançar curso".into(), "  ".into()],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(client.name, "Acme");
        assert_eq!(client.segment, "");
        assert_eq!(client.objectives, vec!["lançar curso"]);
        assert_eq!(registry.get(&client.id).await.unwrap(), client);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let storage = test_storage().await;
        let registry = ClientRegistry::new(&storage);
        let err = registry.create(NewClient::default()).await.unwrap_err();
        assert!(matches!(err, OfferCopilotError::Validation { .. }));
        assert!(registry.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_is_partial_and_delete_reports_missing() {
        let storage = test_storage().await;
        let registry = ClientRegistry::new(&storage);
        let created = registry
            .create(NewClient {
                name: "Acme".into(),
                persona: "Mães empreendedoras".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = registry
            .update(
                &created.id,
                ClientUpdate {
                    voice_tone: Some("acolhedor".into()),
                    objectives: Some(parse_objectives("vender, engajar")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.persona, "Mães empreendedoras");
        assert_eq!(updated.voice_tone, "acolhedor");
        assert_eq!(updated.objectives, vec!["vender", "engajar"]);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        let blank = ClientUpdate {
            name: Some(" ".into()),
            ..Default::default()
        };
        assert!(registry.update(&created.id, blank).await.is_err());

        registry.delete(&created.id).await.unwrap();
        let gone = registry.get(&created.id).await.unwrap_err();
        assert_eq!(gone.to_string(), format!("client not found: {}", created.id));
        assert!(matches!(
            registry.delete(&created.id).await,
            Err(OfferCopilotError::NotFound { .. })
        ));
    }
}
