pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FailureRecord, Lookup, ResultDocument};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Document store holding one result per task id.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Writes `document`, replacing any earlier document for the same task id.
    async fn put_result(&self, document: &ResultDocument) -> Result<()>;

    async fn put_failure(&self, record: &FailureRecord) -> Result<()>;

    /// A stored result wins over a failure record for the same task id.
    async fn lookup(&self, task_id: &str) -> Result<Lookup>;
}
