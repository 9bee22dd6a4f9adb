use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activity::ResourceKind;
use super::contributor::ContributorStats;
use super::task::RepoRef;

/// Outcome of one task run, built once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub task_id: String,
    pub repo_url: String,
    pub repo: RepoRef,
    pub processed_at: DateTime<Utc>,
    pub total_commits: u32,
    pub total_pull_requests: u32,
    pub total_issues: u32,
    pub top_contributors: Vec<ContributorStats>,
    /// Resource kinds whose fetch stopped early on a provider error.
    pub incomplete: Vec<ResourceKind>,
}

impl AggregationResult {
    pub fn is_partial(&self) -> bool {
        !self.incomplete.is_empty()
    }

    pub fn to_document(&self) -> ResultDocument {
        ResultDocument::from(self)
    }
}

/// Stored shape of a result, keyed by `task_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub task_id: String,
    pub repo_url: String,
    pub processed_at: DateTime<Utc>,
    pub summary: ResultSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total_commits: u32,
    pub total_issues: u32,
    pub total_prs: u32,
    pub top_contributors: Vec<ContributorEntry>,
    #[serde(default)]
    pub incomplete: Vec<ResourceKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorEntry {
    pub user: String,
    pub commits: u32,
    pub pull_requests: u32,
    pub issues: u32,
    pub total: u32,
}

impl From<&ContributorStats> for ContributorEntry {
    fn from(stats: &ContributorStats) -> Self {
        Self {
            user: stats.identity.clone(),
            commits: stats.commit_count,
            pull_requests: stats.pull_request_count,
            issues: stats.issue_count,
            total: stats.total_count,
        }
    }
}

impl From<&AggregationResult> for ResultDocument {
    fn from(result: &AggregationResult) -> Self {
        Self {
            task_id: result.task_id.clone(),
            repo_url: result.repo_url.clone(),
            processed_at: result.processed_at,
            summary: ResultSummary {
                total_commits: result.total_commits,
                total_issues: result.total_issues,
                total_prs: result.total_pull_requests,
                top_contributors: result.top_contributors.iter().map(Into::into).collect(),
                incomplete: result.incomplete.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    BadReference,
    MissingCredential,
    FetchErrorPartialUsed,
    StoreWriteError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::BadReference => "bad-reference",
            FailureReason::MissingCredential => "missing-credential",
            FailureReason::FetchErrorPartialUsed => "fetch-error-partial-used",
            FailureReason::StoreWriteError => "store-write-error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bad-reference" => Some(FailureReason::BadReference),
            "missing-credential" => Some(FailureReason::MissingCredential),
            "fetch-error-partial-used" => Some(FailureReason::FetchErrorPartialUsed),
            "store-write-error" => Some(FailureReason::StoreWriteError),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub task_id: String,
    pub reason: FailureReason,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

/// Answer to a retrieval by task id.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(ResultDocument),
    Failed(FailureRecord),
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_shape() {
        let mut alice = ContributorStats::new("alice");
        alice.record(ResourceKind::Commits);
        alice.record(ResourceKind::Issues);

        let result = AggregationResult {
            task_id: "t-1".to_string(),
            repo_url: "https://github.com/acme/widgets".to_string(),
            repo: RepoRef {
                owner: "acme".to_string(),
                name: "widgets".to_string(),
            },
            processed_at: Utc::now(),
            total_commits: 3,
            total_pull_requests: 0,
            total_issues: 1,
            top_contributors: vec![alice],
            incomplete: vec![ResourceKind::PullRequests],
        };

        let json = serde_json::to_value(result.to_document()).unwrap();
        assert_eq!(json["task_id"], "t-1");
        assert_eq!(json["summary"]["total_commits"], 3);
        assert_eq!(json["summary"]["total_prs"], 0);
        assert_eq!(json["summary"]["total_issues"], 1);
        assert_eq!(json["summary"]["top_contributors"][0]["user"], "alice");
        assert_eq!(json["summary"]["top_contributors"][0]["total"], 2);
        assert_eq!(json["summary"]["incomplete"][0], "pull_requests");
    }

    #[test]
    fn test_failure_reason_round_trips_through_str() {
        for reason in [
            FailureReason::BadReference,
            FailureReason::MissingCredential,
            FailureReason::FetchErrorPartialUsed,
            FailureReason::StoreWriteError,
        ] {
            assert_eq!(FailureReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(FailureReason::parse("unknown"), None);
    }
}
