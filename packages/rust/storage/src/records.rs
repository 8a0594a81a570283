//! Clients and agents: JSON records kept in insertion order.

use chrono::{DateTime, Utc};
use libsql::params;
use serde::Serialize;
use serde::de::DeserializeOwned;

use offercopilot_shared::{Agent, Client, OfferCopilotError, Result};

use crate::{Storage, db_err, timestamp};

/// A row type stored as `(id, name, record_json, created_at, updated_at)`.
trait Record: Serialize + DeserializeOwned {
    const TABLE: &'static str;
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn created_at(&self) -> &DateTime<Utc>;
    fn updated_at(&self) -> &DateTime<Utc>;
}

impl Record for Client {
    const TABLE: &'static str = "clients";
    const KIND: &'static str = "client";

    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }
    fn updated_at(&self) -> &DateTime<Utc> {
        &self.updated_at
    }
}

impl Record for Agent {
    const TABLE: &'static str = "agents";
    const KIND: &'static str = "agent";

    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }
    fn updated_at(&self) -> &DateTime<Utc> {
        &self.updated_at
    }
}

fn record_json<R: Record>(record: &R) -> Result<String> {
    serde_json::to_string(record).map_err(|e| {
        OfferCopilotError::parse(format!("failed to serialize {} {}: {e}", R::KIND, record.id()))
    })
}

fn row_to_record<R: Record>(row: &libsql::Row) -> Result<R> {
    let json: String = row.get(0).map_err(db_err)?;
    serde_json::from_str(&json)
        .map_err(|e| OfferCopilotError::Storage(format!("corrupt {} record: {e}", R::KIND)))
}

impl Storage {
    async fn insert_record<R: Record>(&self, record: &R) -> Result<()> {
        self.check_writable()?;
        let json = record_json(record)?;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} (id, name, record_json, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    R::TABLE
                ),
                params![
                    record.id(),
                    record.name(),
                    json.as_str(),
                    timestamp(record.created_at()).as_str(),
                    timestamp(record.updated_at()).as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_record<R: Record>(&self, id: &str) -> Result<Option<R>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT record_json FROM {} WHERE id = ?1", R::TABLE),
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn list_records<R: Record>(&self) -> Result<Vec<R>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT record_json FROM {} ORDER BY seq", R::TABLE),
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_record(&row)?);
        }
        Ok(results)
    }

    async fn update_record<R: Record>(&self, record: &R) -> Result<bool> {
        self.check_writable()?;
        let json = record_json(record)?;
        let affected = self
            .conn
            .execute(
                &format!(
                    "UPDATE {} SET name = ?1, record_json = ?2, updated_at = ?3 WHERE id = ?4",
                    R::TABLE
                ),
                params![
                    record.name(),
                    json.as_str(),
                    timestamp(record.updated_at()).as_str(),
                    record.id(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    async fn delete_record<R: Record>(&self, id: &str) -> Result<bool> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute(
                &format!("DELETE FROM {} WHERE id = ?1", R::TABLE),
                params![id],
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Clients
    // -----------------------------------------------------------------------

    pub async fn insert_client(&self, client: &Client) -> Result<()> {
        self.insert_record(client).await
    }

    pub async fn get_client(&self, id: &str) -> Result<Option<Client>> {
        self.get_record(id).await
    }

    /// All clients in the order they were added.
    pub async fn list_clients(&self) -> Result<Vec<Client>> {
        self.list_records().await
    }

    /// Replace a stored client. Returns `false` if no client has that id.
    pub async fn update_client(&self, client: &Client) -> Result<bool> {
        self.update_record(client).await
    }

    pub async fn delete_client(&self, id: &str) -> Result<bool> {
        self.delete_record::<Client>(id).await
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    pub async fn insert_agent(&self, agent: &Agent) -> Result<()> {
        self.insert_record(agent).await
    }

    pub async fn get_agent(&self, id: &str) -> Result<Option<Agent>> {
        self.get_record(id).await
    }

    /// All agents in the order they were added.
    pub async fn list_agents(&self) -> Result<Vec<Agent>> {
        self.list_records().await
    }

    /// Replace a stored agent. Returns `false` if no agent has that id.
    pub async fn update_agent(&self, agent: &Agent) -> Result<bool> {
        self.update_record(agent).await
    }

    pub async fn delete_agent(&self, id: &str) -> Result<bool> {
        self.delete_record::<Agent>(id).await
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

    #[tokio::test]
    async fn client_crud_keeps_insertion_order() {
        let storage = test_storage().await;
        let mut acme = Client::new("Acme");
        acme.objectives = vec!["vender mais".into()];
        let beta = Client::new("Beta");
        storage.insert_client(&acme).await.unwrap();
        storage.insert_client(&beta).await.unwrap();

        let names: Vec<String> = storage
            .list_clients()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Acme", "Beta"]);

        acme.voice_tone = "descontraído".into();
        assert!(storage.update_client(&acme).await.unwrap());
        let stored = storage.get_client(&acme.id).await.unwrap().unwrap();
        assert_eq!(stored.voice_tone, "descontraído");
        assert_eq!(stored.objectives, vec!["vender mais"]);

        assert!(storage.delete_client(&acme.id).await.unwrap());
        assert!(!storage.delete_client(&acme.id).await.unwrap());
        assert!(storage.get_client(&acme.id).await.unwrap().is_none());
        assert_eq!(storage.list_clients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn agent_crud() {
        let storage = test_storage().await;
        let mut agent = Agent::new("Redator");
        storage.insert_agent(&agent).await.unwrap();

        agent.temperature = 1.2;
        agent.prompt_base = "Você escreve e-mails.".into();
        assert!(storage.update_agent(&agent).await.unwrap());
        assert_eq!(storage.get_agent(&agent.id).await.unwrap().unwrap(), agent);

        assert!(!storage.update_agent(&Agent::new("Fantasma")).await.unwrap());
        assert!(storage.delete_agent(&agent.id).await.unwrap());
        assert!(storage.list_agents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_client_id_is_a_storage_error() {
        let storage = test_storage().await;
        let client = Client::new("Acme");
        storage.insert_client(&client).await.unwrap();
        assert!(matches!(
            storage.insert_client(&client).await,
            Err(OfferCopilotError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn clients_and_agents_are_separate_tables() {
        let storage = test_storage().await;
        let client = Client::new("Acme");
        storage.insert_client(&client).await.unwrap();
        assert!(storage.get_agent(&client.id).await.unwrap().is_none());
        assert!(!storage.delete_agent(&client.id).await.unwrap());
    }
}
