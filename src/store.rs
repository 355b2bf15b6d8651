//! Lead and conversation persistence (SQLite).

use crate::SenderMeta;
use crate::error::StoreError;
use async_trait::async_trait;
use sqlx::{Row as _, SqlitePool};

/// A persisted conversation turn, oldest-first when listed.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTurn {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

/// One knowledge-base fact surfaced into a persona prompt.
#[derive(Debug, Clone)]
pub struct KnowledgeFact {
    pub category: String,
    pub fact: String,
}

/// Aggregate lead counters for the supervisor's report.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadStats {
    pub total_leads: i64,
    pub leads_today: i64,
    pub interactions: i64,
}

/// Persistence capability consumed by the orchestrator and tools.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Find or create the lead for a sender. Returns `(lead_id, is_new)`.
    async fn get_or_create_lead(
        &self,
        sender: &str,
        meta: &SenderMeta,
    ) -> Result<(i64, bool), StoreError>;

    /// Append one turn to the lead's long-term history.
    async fn log_interaction(
        &self,
        lead_id: i64,
        role: &str,
        content: &str,
    ) -> Result<(), StoreError>;

    /// Recent turns for a sender, oldest-first, at most `limit`.
    async fn get_history(&self, sender: &str, limit: u32) -> Result<Vec<StoredTurn>, StoreError>;

    /// Knowledge-base facts, optionally filtered by category.
    async fn get_knowledge(&self, category: Option<&str>)
    -> Result<Vec<KnowledgeFact>, StoreError>;

    /// Record a new knowledge-base fact (e.g. an approved promotion).
    async fn record_knowledge(&self, category: &str, fact: &str) -> Result<(), StoreError>;

    /// Lead counters for business reporting.
    async fn lead_stats(&self) -> Result<LeadStats, StoreError>;

    /// Run an arbitrary read-only SELECT and render the rows as JSON.
    /// Capped at 20 rows to keep tool output small.
    async fn read_only_query(&self, sql: &str) -> Result<String, StoreError>;
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and bootstrap the schema. Seeds the default service catalog
    /// into the knowledge base on first run.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr as _;

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // In-memory databases exist per-connection; one connection keeps the
        // schema visible to every query.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS leads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phone TEXT NOT NULL UNIQUE,
                name TEXT,
                source TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                lead_id INTEGER NOT NULL REFERENCES leads(id),
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS knowledge_base (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                fact TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await?;

        let store = Self { pool };
        store.seed_default_knowledge().await?;
        Ok(store)
    }

    async fn seed_default_knowledge(&self) -> Result<(), StoreError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM knowledge_base")
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;
        if count > 0 {
            return Ok(());
        }
        for fact in [
            "Microblading de cejas: $215",
            "Perfilado de labios: $170",
            "Delineado de ojos: $145",
        ] {
            self.record_knowledge("services", fact).await?;
        }
        tracing::info!("seeded default service catalog");
        Ok(())
    }
}

#[async_trait]
impl LeadStore for SqliteStore {
    async fn get_or_create_lead(
        &self,
        sender: &str,
        meta: &SenderMeta,
    ) -> Result<(i64, bool), StoreError> {
        if let Some(row) = sqlx::query("SELECT id FROM leads WHERE phone = ?")
            .bind(sender)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok((row.try_get("id")?, false));
        }

        let name = meta.get("name").and_then(|v| v.as_str());
        let source = meta.get("source").and_then(|v| v.as_str());
        let result = sqlx::query("INSERT INTO leads (phone, name, source) VALUES (?, ?, ?)")
            .bind(sender)
            .bind(name)
            .bind(source)
            .execute(&self.pool)
            .await?;

        tracing::info!(sender = %sender, "new lead created");
        Ok((result.last_insert_rowid(), true))
    }

    async fn log_interaction(
        &self,
        lead_id: i64,
        role: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO interactions (lead_id, role, content) VALUES (?, ?, ?)")
            .bind(lead_id)
            .bind(role)
            .bind(content)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_history(&self, sender: &str, limit: u32) -> Result<Vec<StoredTurn>, StoreError> {
        let rows = sqlx::query(
            "SELECT i.role, i.content
             FROM interactions i
             JOIN leads l ON l.id = i.lead_id
             WHERE l.phone = ?
             ORDER BY i.id DESC
             LIMIT ?",
        )
        .bind(sender)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut turns: Vec<StoredTurn> = rows
            .into_iter()
            .map(|row| {
                Ok(StoredTurn {
                    role: row.try_get("role")?,
                    content: row.try_get("content")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn get_knowledge(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<KnowledgeFact>, StoreError> {
        let rows = match category {
            Some(category) => {
                sqlx::query("SELECT category, fact FROM knowledge_base WHERE category = ? ORDER BY id")
                    .bind(category)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT category, fact FROM knowledge_base ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter()
            .map(|row| {
                Ok(KnowledgeFact {
                    category: row.try_get("category")?,
                    fact: row.try_get("fact")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    async fn record_knowledge(&self, category: &str, fact: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO knowledge_base (category, fact) VALUES (?, ?)")
            .bind(category)
            .bind(fact)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn lead_stats(&self) -> Result<LeadStats, StoreError> {
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM leads) AS total_leads,
                (SELECT COUNT(*) FROM leads WHERE created_at >= date('now')) AS leads_today,
                (SELECT COUNT(*) FROM interactions) AS interactions",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(LeadStats {
            total_leads: row.try_get("total_leads")?,
            leads_today: row.try_get("leads_today")?,
            interactions: row.try_get("interactions")?,
        })
    }

    async fn read_only_query(&self, sql: &str) -> Result<String, StoreError> {
        if !sql.trim_start().to_uppercase().starts_with("SELECT") {
            return Err(StoreError::Rejected("only SELECT queries are allowed".into()));
        }

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Ok("Query returned 0 results.".into());
        }

        use sqlx::Column as _;
        let rendered: Vec<serde_json::Value> = rows
            .iter()
            .take(20)
            .map(|row| {
                let mut object = serde_json::Map::new();
                for (index, column) in row.columns().iter().enumerate() {
                    object.insert(column.name().to_string(), column_value(row, index));
                }
                serde_json::Value::Object(object)
            })
            .collect();

        serde_json::to_string(&rendered)
            .map_err(|error| StoreError::Rejected(format!("unserializable result: {error}")))
    }
}

/// Best-effort dynamic column decode: integer, then float, then text.
fn column_value(row: &sqlx::sqlite::SqliteRow, index: usize) -> serde_json::Value {
    if let Ok(value) = row.try_get::<i64, _>(index) {
        return serde_json::Value::from(value);
    }
    if let Ok(value) = row.try_get::<f64, _>(index) {
        return serde_json::Value::from(value);
    }
    if let Ok(value) = row.try_get::<String, _>(index) {
        return serde_json::Value::from(value);
    }
    serde_json::Value::Null
}
