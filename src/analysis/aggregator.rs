use std::collections::HashMap;

use crate::models::{ActivityItem, ContributorStats, ResourceKind};

/// Per-contributor counters plus raw per-kind totals for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub contributors: HashMap<String, ContributorStats>,
    pub total_commits: u32,
    pub total_pull_requests: u32,
    pub total_issues: u32,
    /// Items that counted toward the totals but had no resolvable identity.
    pub unattributed: u32,
}

#[derive(Debug, Default)]
pub struct ContributorAggregator {
    aggregate: Aggregate,
}

impl ContributorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, item: &ActivityItem) {
        let kind = item.kind();
        match kind {
            ResourceKind::Commits => self.aggregate.total_commits += 1,
            ResourceKind::PullRequests => self.aggregate.total_pull_requests += 1,
            ResourceKind::Issues => self.aggregate.total_issues += 1,
        }

        let Some(identity) = resolve_identity(item) else {
            self.aggregate.unattributed += 1;
            return;
        };

        self.aggregate
            .contributors
            .entry(identity.to_string())
            .or_insert_with(|| ContributorStats::new(identity))
            .record(kind);
    }

    pub fn record_all<'i>(&mut self, items: impl IntoIterator<Item = &'i ActivityItem>) {
        for item in items {
            self.record(item);
        }
    }

    pub fn contributor_count(&self) -> usize {
        self.aggregate.contributors.len()
    }

    pub fn finish(self) -> Aggregate {
        self.aggregate
    }
}

/// Contributor key for an item.
///
/// Commits use the linked account handle and fall back to the git author
/// email. The two are never merged, so one person can appear twice.
pub fn resolve_identity(item: &ActivityItem) -> Option<&str> {
    match item {
        ActivityItem::Commit(commit) => commit
            .author
            .as_ref()
            .map(|a| a.login.as_str())
            .and_then(non_blank)
            .or_else(|| {
                commit
                    .commit
                    .author
                    .as_ref()
                    .and_then(|sig| sig.email.as_deref())
                    .and_then(non_blank)
            }),
        ActivityItem::PullRequest(pr) => pr.user.as_ref().map(|u| u.login.as_str()).and_then(non_blank),
        ActivityItem::Issue(issue) => issue
            .user
            .as_ref()
            .map(|u| u.login.as_str())
            .and_then(non_blank),
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::paginator::testing::{commit, issue, pull_request};

    fn aggregate(items: &[ActivityItem]) -> Aggregate {
        let mut aggregator = ContributorAggregator::new();
        aggregator.record_all(items);
        aggregator.finish()
    }

    #[test]
    fn test_commit_identity_prefers_handle() {
        assert_eq!(
            resolve_identity(&commit(Some("alice"), Some("alice@example.com"))),
            Some("alice")
        );
        assert_eq!(
            resolve_identity(&commit(None, Some("ghost@example.com"))),
            Some("ghost@example.com")
        );
        assert_eq!(
            resolve_identity(&commit(Some("  "), Some("ghost@example.com"))),
            Some("ghost@example.com")
        );
        assert_eq!(resolve_identity(&commit(None, None)), None);
    }

    #[test]
    fn test_unresolved_items_still_count_toward_totals() {
        let result = aggregate(&[
            commit(None, None),
            commit(Some("alice"), None),
            pull_request(None),
            issue(None),
            issue(Some("bob")),
        ]);

        assert_eq!(result.total_commits, 2);
        assert_eq!(result.total_pull_requests, 1);
        assert_eq!(result.total_issues, 2);
        assert_eq!(result.unattributed, 3);
        assert_eq!(result.contributors.len(), 2);
    }

    #[test]
    fn test_counts_per_category() {
        let result = aggregate(&[
            commit(Some("alice"), None),
            commit(Some("alice"), None),
            pull_request(Some("alice")),
            issue(Some("alice")),
            commit(None, Some("alice@example.com")),
        ]);

        let alice = &result.contributors["alice"];
        assert_eq!(alice.commit_count, 2);
        assert_eq!(alice.pull_request_count, 1);
        assert_eq!(alice.issue_count, 1);
        assert_eq!(alice.total_count, 4);

        // Email fallback stays a separate contributor.
        assert_eq!(result.contributors["alice@example.com"].total_count, 1);
    }

    #[test]
    fn test_total_is_sum_of_categories() {
        let result = aggregate(&[
            commit(Some("a"), None),
            commit(Some("b"), None),
            pull_request(Some("a")),
            pull_request(Some("c")),
            issue(Some("b")),
            issue(Some("b")),
            commit(None, Some("d@example.com")),
        ]);

        for stats in result.contributors.values() {
            assert_eq!(
                stats.total_count,
                stats.commit_count + stats.pull_request_count + stats.issue_count
            );
        }
    }

    #[test]
    fn test_order_of_sequences_does_not_matter() {
        let commits = vec![commit(Some("a"), None), commit(None, Some("x@example.com"))];
        let prs = vec![pull_request(Some("a")), pull_request(Some("b"))];
        let issues = vec![issue(Some("b")), issue(None), issue(Some("c"))];

        let forward: Vec<_> = commits.iter().chain(&prs).chain(&issues).cloned().collect();
        let mut backward: Vec<_> = issues.iter().chain(&prs).chain(&commits).cloned().collect();
        let interleaved: Vec<_> = vec![
            issues[0].clone(),
            commits[0].clone(),
            prs[1].clone(),
            issues[2].clone(),
            commits[1].clone(),
            issues[1].clone(),
            prs[0].clone(),
        ];
        backward.reverse();

        let expected = aggregate(&forward);
        assert_eq!(aggregate(&backward), expected);
        assert_eq!(aggregate(&interleaved), expected);
    }
}
