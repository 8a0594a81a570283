//! Embedded libSQL storage layer.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the JSON
//! key-value settings (pipeline config, API keys, admin flag, user profile),
//! the tool registry, the tool execution history, and the client and agent
//! records.
//!
//! **Access rules:**
//! - CLI commands that change settings or run tools: read-write via [`Storage::open`]
//! - Read-only inspection: [`Storage::open_readonly`]

mod migrations;
mod records;
mod settings;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use offercopilot_shared::{OfferCopilotError, Result, ToolDefinition, ToolExecution, ToolUsage};

pub use settings::{StoredSettings, keys};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| OfferCopilotError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        OfferCopilotError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(OfferCopilotError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Key-value settings
    // -----------------------------------------------------------------------

    /// Raw JSON stored under `key`.
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value_json FROM settings_kv WHERE key = ?1",
                params![key],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<String>(0).map_err(db_err)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Deserialize the value stored under `key`.
    ///
    /// A value that no longer parses as `T` is logged and treated as absent.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_raw(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring unparsable stored value");
                Ok(None)
            }
        }
    }

    /// Store `value` as JSON under `key` (upserts).
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.check_writable()?;
        let json = serde_json::to_string(value)
            .map_err(|e| OfferCopilotError::parse(format!("failed to serialize {key}: {e}")))?;
        self.conn
            .execute(
                "INSERT INTO settings_kv (key, value_json, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                   value_json = excluded.value_json,
                   updated_at = excluded.updated_at",
                params![key, json.as_str(), now().as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Remove the value stored under `key`. Returns whether a value existed.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute("DELETE FROM settings_kv WHERE key = ?1", params![key])
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    /// Remove every stored setting. Tools and history are kept.
    pub async fn clear(&self) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM settings_kv", params![])
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tools
    // -----------------------------------------------------------------------

    /// Insert a new tool. Fails if a tool with the same id exists.
    pub async fn insert_tool(&self, tool: &ToolDefinition) -> Result<()> {
        self.check_writable()?;
        if self.get_tool(&tool.id).await?.is_some() {
            return Err(OfferCopilotError::validation(format!(
                "a tool with id '{}' already exists",
                tool.id
            )));
        }

        let json = tool_json(tool)?;
        self.conn
            .execute(
                "INSERT INTO tools (id, name, category, definition_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    tool.id.as_str(),
                    tool.name.as_str(),
                    tool.category.as_deref(),
                    json.as_str(),
                    timestamp(&tool.created_at).as_str(),
                    timestamp(&tool.updated_at).as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get a tool by id.
    pub async fn get_tool(&self, id: &str) -> Result<Option<ToolDefinition>> {
        let mut rows = self
            .conn
            .query(
                "SELECT definition_json FROM tools WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_tool(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// List all tools in the order they were added.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        let mut rows = self
            .conn
            .query("SELECT definition_json FROM tools ORDER BY seq", params![])
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_tool(&row)?);
        }
        Ok(results)
    }

    /// Replace a stored tool. Returns `false` if no tool has that id.
    pub async fn update_tool(&self, tool: &ToolDefinition) -> Result<bool> {
        self.check_writable()?;
        let json = tool_json(tool)?;
        let affected = self
            .conn
            .execute(
                "UPDATE tools SET name = ?1, category = ?2, definition_json = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    tool.name.as_str(),
                    tool.category.as_deref(),
                    json.as_str(),
                    timestamp(&tool.updated_at).as_str(),
                    tool.id.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    /// Delete a tool by id. Returns `false` if no tool has that id.
    pub async fn delete_tool(&self, id: &str) -> Result<bool> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute("DELETE FROM tools WHERE id = ?1", params![id])
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    pub async fn count_tools(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM tools", params![])
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(db_err)? as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(db_err(e)),
        }
    }

    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    /// Record a tool run.
    pub async fn insert_execution(&self, execution: &ToolExecution) -> Result<()> {
        self.check_writable()?;
        let inputs_json = serde_json::to_string(&execution.inputs)
            .map_err(|e| OfferCopilotError::parse(format!("failed to serialize inputs: {e}")))?;
        self.conn
            .execute(
                "INSERT INTO executions (id, tool_id, tool_name, inputs_json, output, tokens, provider, model, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    execution.id.as_str(),
                    execution.tool_id.as_str(),
                    execution.tool_name.as_str(),
                    inputs_json.as_str(),
                    execution.output.as_str(),
                    execution.tokens.map(|t| t as i64),
                    execution.provider.as_str(),
                    execution.model.as_str(),
                    timestamp(&execution.timestamp).as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Most recent executions first.
    pub async fn list_executions(&self, limit: u32) -> Result<Vec<ToolExecution>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, tool_id, tool_name, inputs_json, output, tokens, provider, model, created_at
                 FROM executions ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_execution(&row)?);
        }
        Ok(results)
    }

    /// `(execution count, summed tokens)` across the whole history.
    pub async fn execution_totals(&self) -> Result<(u64, u64)> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*), COALESCE(SUM(tokens), 0) FROM executions",
                params![],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count = row.get::<i64>(0).map_err(db_err)?;
                let tokens = row.get::<i64>(1).map_err(db_err)?;
                Ok((count as u64, tokens as u64))
            }
            Ok(None) => Ok((0, 0)),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Most-run tools by name, most frequent first (ties broken by name).
    pub async fn top_tools(&self, limit: u32) -> Result<Vec<ToolUsage>> {
        let mut rows = self
            .conn
            .query(
                "SELECT tool_name, COUNT(*) AS runs FROM executions
                 GROUP BY tool_name ORDER BY runs DESC, tool_name ASC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(ToolUsage {
                name: row.get::<String>(0).map_err(db_err)?,
                count: row.get::<i64>(1).map_err(db_err)? as u64,
            });
        }
        Ok(results)
    }
}

fn db_err(e: libsql::Error) -> OfferCopilotError {
    OfferCopilotError::Storage(e.to_string())
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn now() -> String {
    timestamp(&Utc::now())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OfferCopilotError::Storage(format!("invalid date: {e}")))
}

fn tool_json(tool: &ToolDefinition) -> Result<String> {
    serde_json::to_string(tool)
        .map_err(|e| OfferCopilotError::parse(format!("failed to serialize tool {}: {e}", tool.id)))
}

fn row_to_tool(row: &libsql::Row) -> Result<ToolDefinition> {
    let json: String = row.get(0).map_err(db_err)?;
    serde_json::from_str(&json)
        .map_err(|e| OfferCopilotError::Storage(format!("corrupt tool record: {e}")))
}

fn row_to_execution(row: &libsql::Row) -> Result<ToolExecution> {
    let inputs_json: String = row.get(3).map_err(db_err)?;
    let created_at: String = row.get(8).map_err(db_err)?;
    Ok(ToolExecution {
        id: row.get::<String>(0).map_err(db_err)?,
        tool_id: row.get::<String>(1).map_err(db_err)?,
        tool_name: row.get::<String>(2).map_err(db_err)?,
        inputs: serde_json::from_str(&inputs_json)
            .map_err(|e| OfferCopilotError::Storage(format!("corrupt execution inputs: {e}")))?,
        output: row.get::<String>(4).map_err(db_err)?,
        tokens: row.get::<i64>(5).ok().map(|t| t as u64),
        provider: row.get::<String>(6).map_err(db_err)?,
        model: row.get::<String>(7).map_err(db_err)?,
        timestamp: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use offercopilot_shared::{AiProvider, InputKind, OutputType, ToolInput};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("oc_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn sample_tool(id: &str, category: Option<&str>) -> ToolDefinition {
        ToolDefinition {
            id: id.into(),
            name: format!("Tool {id}"),
            description: "desc".into(),
            icon: "sparkles".into(),
            prompt: "You write copy.".into(),
            inputs: vec![ToolInput {
                id: "produto".into(),
                label: "Produto".into(),
                kind: InputKind::Text,
                placeholder: None,
                required: true,
                options: vec![],
            }],
            output_type: OutputType::Text,
            category: category.map(String::from),
            research_context: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_execution(tool_name: &str, tokens: Option<u64>, offset_secs: i64) -> ToolExecution {
        ToolExecution {
            id: Uuid::now_v7().to_string(),
            tool_id: tool_name.to_lowercase(),
            tool_name: tool_name.into(),
            inputs: vec![("produto".into(), "Curso".into())],
            output: "out".into(),
            tokens,
            provider: AiProvider::Groq.as_str().into(),
            model: "llama".into(),
            timestamp: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("oc_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn kv_set_get_remove() {
        let storage = test_storage().await;
        assert!(storage.get_json::<bool>("flag").await.unwrap().is_none());

        storage.set_json("flag", &true).await.unwrap();
        assert_eq!(storage.get_json::<bool>("flag").await.unwrap(), Some(true));

        storage.set_json("flag", &false).await.unwrap();
        assert_eq!(storage.get_json::<bool>("flag").await.unwrap(), Some(false));

        assert!(storage.remove("flag").await.unwrap());
        assert!(!storage.remove("flag").await.unwrap());
        assert!(storage.get_json::<bool>("flag").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unparsable_value_reads_as_none() {
        let storage = test_storage().await;
        storage.set_json("flag", "not a bool").await.unwrap();
        assert!(storage.get_json::<bool>("flag").await.unwrap().is_none());
        assert_eq!(
            storage.get_raw("flag").await.unwrap().as_deref(),
            Some(r#""not a bool""#)
        );
    }

    #[tokio::test]
    async fn clear_removes_settings_only() {
        let storage = test_storage().await;
        storage.set_json("a", &1).await.unwrap();
        storage.set_json("b", &2).await.unwrap();
        storage.insert_tool(&sample_tool("vsl", None)).await.unwrap();

        storage.clear().await.unwrap();
        assert!(storage.get_raw("a").await.unwrap().is_none());
        assert!(storage.get_raw("b").await.unwrap().is_none());
        assert_eq!(storage.count_tools().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn tool_crud() {
        let storage = test_storage().await;
        storage
            .insert_tool(&sample_tool("headline", Some("Copywriting")))
            .await
            .expect("insert tool");
        storage
            .insert_tool(&sample_tool("vsl", Some("Video")))
            .await
            .expect("insert tool");

        let listed = storage.list_tools().await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["headline", "vsl"]);

        let mut tool = storage.get_tool("vsl").await.unwrap().expect("tool exists");
        tool.name = "VSL Generator".into();
        assert!(storage.update_tool(&tool).await.unwrap());
        assert_eq!(
            storage.get_tool("vsl").await.unwrap().unwrap().name,
            "VSL Generator"
        );

        assert!(storage.delete_tool("vsl").await.unwrap());
        assert!(!storage.delete_tool("vsl").await.unwrap());
        assert!(storage.get_tool("vsl").await.unwrap().is_none());
        assert_eq!(storage.count_tools().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_tool_id_rejected() {
        let storage = test_storage().await;
        storage.insert_tool(&sample_tool("hooks", None)).await.unwrap();
        let err = storage
            .insert_tool(&sample_tool("hooks", None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn update_missing_tool_returns_false() {
        let storage = test_storage().await;
        assert!(!storage.update_tool(&sample_tool("ghost", None)).await.unwrap());
    }

    #[tokio::test]
    async fn execution_history_and_stats() {
        let storage = test_storage().await;
        storage
            .insert_execution(&sample_execution("Headline Generator", Some(100), 0))
            .await
            .unwrap();
        storage
            .insert_execution(&sample_execution("VSL Generator", None, 1))
            .await
            .unwrap();
        storage
            .insert_execution(&sample_execution("Headline Generator", Some(50), 2))
            .await
            .unwrap();

        let recent = storage.list_executions(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].tokens, Some(50));
        assert_eq!(recent[1].tool_name, "VSL Generator");
        assert_eq!(recent[1].tokens, None);
        assert_eq!(recent[0].inputs, vec![("produto".to_string(), "Curso".to_string())]);

        assert_eq!(storage.execution_totals().await.unwrap(), (3, 150));

        let top = storage.top_tools(5).await.unwrap();
        assert_eq!(top[0].name, "Headline Generator");
        assert_eq!(top[0].count, 2);
        assert_eq!(top[1].name, "VSL Generator");
    }

    #[tokio::test]
    async fn readonly_mode_prevents_writes() {
        let tmp = std::env::temp_dir().join(format!("oc_test_{}.db", Uuid::now_v7()));
        let _rw = Storage::open(&tmp).await.expect("rw open");
        let ro = Storage::open_readonly(&tmp).await.expect("ro open");

        let result = ro.set_json("flag", &true).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }
}
