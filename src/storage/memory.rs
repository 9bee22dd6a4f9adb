use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{FailureRecord, Lookup, ResultDocument};
use crate::storage::ResultStore;

#[derive(Default)]
pub struct MemoryStore {
    results: RwLock<HashMap<String, ResultDocument>>,
    failures: RwLock<HashMap<String, FailureRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn result_count(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn failure_count(&self) -> usize {
        self.failures.read().await.len()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn put_result(&self, document: &ResultDocument) -> Result<()> {
        self.results
            .write()
            .await
            .insert(document.task_id.clone(), document.clone());
        Ok(())
    }

    async fn put_failure(&self, record: &FailureRecord) -> Result<()> {
        self.failures
            .write()
            .await
            .insert(record.task_id.clone(), record.clone());
        Ok(())
    }

    async fn lookup(&self, task_id: &str) -> Result<Lookup> {
        if let Some(document) = self.results.read().await.get(task_id) {
            return Ok(Lookup::Found(document.clone()));
        }
        Ok(self
            .failures
            .read()
            .await
            .get(task_id)
            .cloned()
            .map(Lookup::Failed)
            .unwrap_or(Lookup::NotFound))
    }
}
