use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{FailureReason, FailureRecord, Lookup, ResultDocument};
use crate::storage::ResultStore;

/// SQLite-backed store. Statements run on the blocking pool so a slow disk
/// never stalls the runtime or the caller's write deadline.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| Error::StorageWrite("connection lock poisoned".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| Error::StorageWrite(format!("database task failed: {}", e)))?
    }
}

fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_results (
            task_id TEXT PRIMARY KEY,
            repo_url TEXT NOT NULL,
            processed_at TEXT NOT NULL,
            document_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS task_failures (
            task_id TEXT PRIMARY KEY,
            reason TEXT NOT NULL,
            message TEXT NOT NULL,
            failed_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_results_processed_at ON analysis_results(processed_at);
        "#,
    )?;

    Ok(())
}

fn get_result(conn: &Connection, task_id: &str) -> Result<Option<ResultDocument>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT document_json FROM analysis_results WHERE task_id = ?1",
            params![task_id],
            |row| row.get(0),
        )
        .optional()?;

    match json {
        Some(json) => Ok(Some(serde_json::from_str::<ResultDocument>(&json)?)),
        None => Ok(None),
    }
}

fn get_failure(conn: &Connection, task_id: &str) -> Result<Option<FailureRecord>> {
    let row = conn
        .query_row(
            "SELECT reason, message, failed_at FROM task_failures WHERE task_id = ?1",
            params![task_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?, // reason
                    row.get::<_, String>(1)?, // message
                    row.get::<_, String>(2)?, // failed_at
                ))
            },
        )
        .optional()?;

    let Some((reason, message, failed_at)) = row else {
        return Ok(None);
    };

    let reason = FailureReason::parse(&reason)
        .ok_or_else(|| Error::MalformedInput(format!("unknown failure reason: {}", reason)))?;
    let failed_at = DateTime::parse_from_rfc3339(&failed_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::MalformedInput(format!("bad failure timestamp: {}", e)))?;

    Ok(Some(FailureRecord {
        task_id: task_id.to_string(),
        reason,
        message,
        failed_at,
    }))
}

#[async_trait]
impl ResultStore for SqliteStore {
    async fn put_result(&self, document: &ResultDocument) -> Result<()> {
        let document_json = serde_json::to_string(document)?;
        let task_id = document.task_id.clone();
        let repo_url = document.repo_url.clone();
        let processed_at = document.processed_at.to_rfc3339();

        self.run(move |conn| {
            conn.execute(
                r#"
                INSERT INTO analysis_results (task_id, repo_url, processed_at, document_json)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(task_id) DO UPDATE SET
                    repo_url = excluded.repo_url,
                    processed_at = excluded.processed_at,
                    document_json = excluded.document_json
                "#,
                params![task_id, repo_url, processed_at, document_json],
            )
            .map_err(|e| Error::StorageWrite(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn put_failure(&self, record: &FailureRecord) -> Result<()> {
        let record = record.clone();
        self.run(move |conn| {
            conn.execute(
                r#"
                INSERT INTO task_failures (task_id, reason, message, failed_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(task_id) DO UPDATE SET
                    reason = excluded.reason,
                    message = excluded.message,
                    failed_at = excluded.failed_at
                "#,
                params![
                    record.task_id,
                    record.reason.as_str(),
                    record.message,
                    record.failed_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn lookup(&self, task_id: &str) -> Result<Lookup> {
        let task_id = task_id.to_string();
        self.run(move |conn| {
            if let Some(document) = get_result(conn, &task_id)? {
                return Ok(Lookup::Found(document));
            }
            Ok(get_failure(conn, &task_id)?
                .map(Lookup::Failed)
                .unwrap_or(Lookup::NotFound))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::models::{ContributorEntry, ResultSummary};

    fn document(task_id: &str, total_commits: u32) -> ResultDocument {
        ResultDocument {
            task_id: task_id.to_string(),
            repo_url: "https://github.com/acme/widgets".to_string(),
            processed_at: Utc::now(),
            summary: ResultSummary {
                total_commits,
                total_issues: 1,
                total_prs: 2,
                top_contributors: vec![ContributorEntry {
                    user: "alice".to_string(),
                    commits: total_commits,
                    pull_requests: 2,
                    issues: 1,
                    total: total_commits + 3,
                }],
                incomplete: Vec::new(),
            },
        }
    }

    #[tokio::test]
    async fn test_store_and_lookup() {
        let store = SqliteStore::in_memory().unwrap();
        let doc = document("t-1", 5);
        store.put_result(&doc).await.unwrap();

        assert_eq!(store.lookup("t-1").await.unwrap(), Lookup::Found(doc));
        assert_eq!(store.lookup("t-2").await.unwrap(), Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_rewrite_replaces_document() {
        let store = SqliteStore::in_memory().unwrap();
        store.put_result(&document("t-1", 5)).await.unwrap();
        store.put_result(&document("t-1", 8)).await.unwrap();

        match store.lookup("t-1").await.unwrap() {
            Lookup::Found(doc) => assert_eq!(doc.summary.total_commits, 8),
            other => panic!("unexpected lookup: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_records() {
        let store = SqliteStore::in_memory().unwrap();
        let record = FailureRecord {
            task_id: "t-9".to_string(),
            reason: FailureReason::BadReference,
            message: "repo URL must have the form".to_string(),
            failed_at: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        store.put_failure(&record).await.unwrap();
        assert_eq!(store.lookup("t-9").await.unwrap(), Lookup::Failed(record));

        // A later successful run takes precedence.
        let doc = document("t-9", 1);
        store.put_result(&doc).await.unwrap();
        assert_eq!(store.lookup("t-9").await.unwrap(), Lookup::Found(doc));
    }

    #[tokio::test]
    async fn test_write_yields_while_connection_busy() {
        let store = SqliteStore::in_memory().unwrap();
        let doc = document("t-3", 2);

        let guard = store.conn.lock().unwrap();
        let write = tokio::time::timeout(Duration::from_millis(50), store.put_result(&doc)).await;
        assert!(write.is_err(), "a held connection must not block the caller's deadline");
        drop(guard);

        store.put_result(&doc).await.unwrap();
        assert_eq!(store.lookup("t-3").await.unwrap(), Lookup::Found(doc));
    }
}
