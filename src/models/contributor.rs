use serde::{Deserialize, Serialize};

use super::activity::ResourceKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorStats {
    pub identity: String,
    pub commit_count: u32,
    pub pull_request_count: u32,
    pub issue_count: u32,
    pub total_count: u32,
}

impl ContributorStats {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            commit_count: 0,
            pull_request_count: 0,
            issue_count: 0,
            total_count: 0,
        }
    }

    pub fn record(&mut self, kind: ResourceKind) {
        match kind {
            ResourceKind::Commits => self.commit_count += 1,
            ResourceKind::PullRequests => self.pull_request_count += 1,
            ResourceKind::Issues => self.issue_count += 1,
        }
        self.total_count += 1;
    }
}
