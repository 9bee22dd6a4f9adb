use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three activity types that are aggregated per contributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Commits,
    PullRequests,
    Issues,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Commits,
        ResourceKind::PullRequests,
        ResourceKind::Issues,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Commits => "commits",
            ResourceKind::PullRequests => "pull_requests",
            ResourceKind::Issues => "issues",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRef {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCommit {
    pub sha: String,
    pub commit: CommitDetails,
    /// Platform account linked to the commit, if GitHub could match one.
    #[serde(default)]
    pub author: Option<AccountRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitDetails {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<GitSignature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitSignature {
    pub name: Option<String>,
    pub email: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPullRequest {
    pub number: u64,
    #[serde(default)]
    pub user: Option<AccountRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIssue {
    pub number: u64,
    #[serde(default)]
    pub user: Option<AccountRef>,
    /// Present when the issue is a pull request. Such issues are still counted
    /// as issues, the way the issues endpoint reports them.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

/// Provider-native record of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityItem {
    Commit(RawCommit),
    PullRequest(RawPullRequest),
    Issue(RawIssue),
}

impl ActivityItem {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ActivityItem::Commit(_) => ResourceKind::Commits,
            ActivityItem::PullRequest(_) => ResourceKind::PullRequests,
            ActivityItem::Issue(_) => ResourceKind::Issues,
        }
    }
}

/// One page of provider results.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<ActivityItem>,
    pub next_page: Option<u32>,
}
