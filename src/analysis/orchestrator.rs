use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::analysis::aggregator::{Aggregate, ContributorAggregator};
use crate::analysis::ranker::Ranker;
use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::github::{ActivityProvider, FetchOutcome, PaginatedFetcher};
use crate::models::{
    ActivityItem, AggregationResult, FailureReason, FailureRecord, RepoRef, ResourceKind,
    TaskMessage,
};
use crate::storage::ResultStore;

/// Pages buffered between the fetchers and the aggregator.
const PAGE_CHANNEL_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Received,
    Fetching,
    Aggregating,
    Ranking,
    Stored,
    Failed(FailureReason),
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Received => write!(f, "received"),
            TaskState::Fetching => write!(f, "fetching"),
            TaskState::Aggregating => write!(f, "aggregating"),
            TaskState::Ranking => write!(f, "ranking"),
            TaskState::Stored => write!(f, "stored"),
            TaskState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Drives one task from message to stored result. The only place that
/// decides whether a task is dropped, continued with partial data, or failed.
pub struct Orchestrator {
    provider: Arc<dyn ActivityProvider>,
    store: Arc<dyn ResultStore>,
    ranker: Ranker,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ActivityProvider>,
        store: Arc<dyn ResultStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            store,
            ranker: Ranker,
            config,
        }
    }

    /// Entry point for raw queue payloads.
    pub async fn handle_message(&self, payload: &[u8]) -> Result<AggregationResult> {
        tracing::info!("Received task: {}", String::from_utf8_lossy(payload));

        match TaskMessage::from_slice(payload) {
            Ok(task) => self.process(task).await,
            Err(e) => {
                // Without a task id there is nothing to key a failure record on.
                tracing::warn!("Dropping unparseable task: {}", e);
                Err(e)
            }
        }
    }

    pub async fn process(&self, task: TaskMessage) -> Result<AggregationResult> {
        self.transition(&task.task_id, TaskState::Received);
        tracing::info!("Processing task {} for repo {}", task.task_id, task.repo_url);

        let repo = match task.repo_ref() {
            Ok(repo) => repo,
            Err(e) => return Err(self.drop_task(&task, FailureReason::BadReference, e).await),
        };

        if !self.provider.has_credential() {
            return Err(self
                .drop_task(&task, FailureReason::MissingCredential, Error::MissingCredential)
                .await);
        }

        self.transition(&task.task_id, TaskState::Fetching);
        tracing::info!(
            "Task {}: fetching activity for {} from {}",
            task.task_id,
            repo,
            self.provider.name()
        );
        let (aggregate, outcomes) = self.collect_activity(&task.task_id, &repo).await;

        let incomplete: Vec<ResourceKind> = outcomes
            .iter()
            .filter(|outcome| !outcome.is_complete())
            .map(|outcome| outcome.kind)
            .collect();
        for outcome in &outcomes {
            match &outcome.error {
                Some(e) => tracing::warn!(
                    "Task {}: {} fetch for {} stopped after {} pages ({}), continuing with {} items ({})",
                    task.task_id,
                    outcome.kind,
                    repo,
                    outcome.pages,
                    e,
                    outcome.items,
                    FailureReason::FetchErrorPartialUsed
                ),
                None => tracing::debug!(
                    "Task {}: fetched {} {} in {} pages",
                    task.task_id,
                    outcome.items,
                    outcome.kind,
                    outcome.pages
                ),
            }
        }

        self.transition(&task.task_id, TaskState::Ranking);
        let top_contributors = self.ranker.rank(aggregate.contributors.into_values());

        let result = AggregationResult {
            task_id: task.task_id.clone(),
            repo_url: task.repo_url.clone(),
            repo,
            processed_at: Utc::now(),
            total_commits: aggregate.total_commits,
            total_pull_requests: aggregate.total_pull_requests,
            total_issues: aggregate.total_issues,
            top_contributors,
            incomplete,
        };

        if let Err(e) = self.store_result(&result).await {
            tracing::error!("Failed to store result for task {}: {}", task.task_id, e);
            self.transition(&task.task_id, TaskState::Failed(FailureReason::StoreWriteError));
            self.record_failure(&task.task_id, FailureReason::StoreWriteError, &e)
                .await;
            return Err(e);
        }

        self.transition(&task.task_id, TaskState::Stored);
        tracing::info!(
            "Successfully processed and stored result for task {} ({} commits, {} PRs, {} issues)",
            task.task_id,
            result.total_commits,
            result.total_pull_requests,
            result.total_issues
        );

        Ok(result)
    }

    /// Runs the three fetchers concurrently and feeds every page through a
    /// channel to a single aggregator.
    async fn collect_activity(&self, task_id: &str, repo: &RepoRef) -> (Aggregate, Vec<FetchOutcome>) {
        let (tx, mut rx) = mpsc::channel::<Vec<ActivityItem>>(PAGE_CHANNEL_CAPACITY);
        let provider = self.provider.as_ref();

        let commits = PaginatedFetcher::new(provider, repo, ResourceKind::Commits);
        let pull_requests = PaginatedFetcher::new(provider, repo, ResourceKind::PullRequests);
        let issues = PaginatedFetcher::new(provider, repo, ResourceKind::Issues);

        let fetch = async {
            let (commits, pull_requests, issues) = tokio::join!(
                commits.drain_into(tx.clone()),
                pull_requests.drain_into(tx.clone()),
                issues.drain_into(tx),
            );
            vec![commits, pull_requests, issues]
        };

        let aggregate = async {
            let mut aggregator = ContributorAggregator::new();
            let mut announced = false;
            while let Some(items) = rx.recv().await {
                if !announced {
                    self.transition(task_id, TaskState::Aggregating);
                    announced = true;
                }
                aggregator.record_all(&items);
            }
            tracing::debug!(
                "Task {}: {} distinct contributors",
                task_id,
                aggregator.contributor_count()
            );
            let aggregate = aggregator.finish();
            if aggregate.unattributed > 0 {
                tracing::info!(
                    "Task {}: {} items had no login or email and were counted in totals only",
                    task_id,
                    aggregate.unattributed
                );
            }
            aggregate
        };

        let (outcomes, aggregate) = tokio::join!(fetch, aggregate);
        (aggregate, outcomes)
    }

    async fn store_result(&self, result: &AggregationResult) -> Result<()> {
        let document = result.to_document();
        match tokio::time::timeout(self.config.store_timeout, self.store.put_result(&document)).await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(Error::StorageWrite(msg))) => Err(Error::StorageWrite(msg)),
            Ok(Err(e)) => Err(Error::StorageWrite(e.to_string())),
            Err(_) => Err(Error::StorageWrite(format!(
                "write timed out after {:?}",
                self.config.store_timeout
            ))),
        }
    }

    async fn drop_task(&self, task: &TaskMessage, reason: FailureReason, error: Error) -> Error {
        tracing::warn!(
            "Dropping task {} for repo {}: {}",
            task.task_id,
            task.repo_url,
            error
        );
        self.transition(&task.task_id, TaskState::Failed(reason));
        self.record_failure(&task.task_id, reason, &error).await;
        error
    }

    async fn record_failure(&self, task_id: &str, reason: FailureReason, error: &Error) {
        if !self.config.record_failures {
            return;
        }

        let record = FailureRecord {
            task_id: task_id.to_string(),
            reason,
            message: error.to_string(),
            failed_at: Utc::now(),
        };

        match tokio::time::timeout(self.config.store_timeout, self.store.put_failure(&record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Failed to record failure for task {}: {}", task_id, e),
            Err(_) => tracing::error!("Timed out recording failure for task {}", task_id),
        }
    }

    fn transition(&self, task_id: &str, state: TaskState) {
        tracing::debug!(task_id, state = %state, "task state changed");
    }
}
