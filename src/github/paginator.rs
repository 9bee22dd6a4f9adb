use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::github::provider::ActivityProvider;
use crate::models::{ActivityItem, RepoRef, ResourceKind};

pub const PAGE_SIZE: u32 = 100;

/// How a fetch of one resource kind ended.
#[derive(Debug)]
pub struct FetchOutcome {
    pub kind: ResourceKind,
    pub pages: u32,
    pub items: u32,
    /// Set when the provider failed; everything counted above was still delivered.
    pub error: Option<Error>,
}

impl FetchOutcome {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            pages: 0,
            items: 0,
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Walks every page of one resource kind, starting at page 1.
pub struct PaginatedFetcher<'a> {
    provider: &'a dyn ActivityProvider,
    repo: &'a RepoRef,
    kind: ResourceKind,
    per_page: u32,
}

impl<'a> PaginatedFetcher<'a> {
    pub fn new(provider: &'a dyn ActivityProvider, repo: &'a RepoRef, kind: ResourceKind) -> Self {
        Self {
            provider,
            repo,
            kind,
            per_page: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Lazy page stream. The first error is yielded and ends the stream.
    pub fn pages(&self) -> impl Stream<Item = Result<Vec<ActivityItem>>> + 'a {
        let provider = self.provider;
        let repo = self.repo;
        let kind = self.kind;
        let per_page = self.per_page;

        stream::unfold(Some(1u32), move |next| async move {
            let Some(page) = next else {
                return None;
            };
            tracing::debug!("Fetching {} page {} for {}", kind, page, repo);

            match provider.fetch_page(repo, kind, page, per_page).await {
                // A provider pointing backwards would loop forever.
                Ok(fetched) => {
                    let following = fetched.next_page.filter(|n| *n > page);
                    Some((Ok(fetched.items), following))
                }
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Sends every page to `tx` until exhaustion, a provider error, or the
    /// receiver going away.
    pub async fn drain_into(&self, tx: mpsc::Sender<Vec<ActivityItem>>) -> FetchOutcome {
        let mut outcome = FetchOutcome::new(self.kind);
        let pages = self.pages();
        futures::pin_mut!(pages);

        while let Some(page) = pages.next().await {
            match page {
                Ok(items) => {
                    outcome.pages += 1;
                    outcome.items += items.len() as u32;
                    if tx.send(items).await.is_err() {
                        tracing::debug!("Receiver closed, stopping {} fetch", self.kind);
                        break;
                    }
                }
                Err(e) => {
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        outcome
    }

    /// Collects everything into memory, keeping the items fetched before an error.
    pub async fn collect(&self) -> (Vec<ActivityItem>, FetchOutcome) {
        let mut outcome = FetchOutcome::new(self.kind);
        let mut all_items = Vec::new();
        let pages = self.pages();
        futures::pin_mut!(pages);

        while let Some(page) = pages.next().await {
            match page {
                Ok(items) => {
                    outcome.pages += 1;
                    outcome.items += items.len() as u32;
                    all_items.extend(items);
                }
                Err(e) => {
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        (all_items, outcome)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn repo() -> RepoRef {
        RepoRef {
            owner: "acme".to_string(),
            name: "widgets".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetches_until_last_page() {
        let provider = FakeProvider::new().with_pages(
            ResourceKind::Commits,
            vec![
                vec![commit(Some("alice"), None), commit(Some("bob"), None)],
                vec![commit(Some("alice"), None)],
            ],
        );
        let repo = repo();

        let (items, outcome) = PaginatedFetcher::new(&provider, &repo, ResourceKind::Commits)
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert_eq!(outcome.pages, 2);
        assert!(outcome.is_complete());

        let requests = provider.requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![
                (ResourceKind::Commits, 1, PAGE_SIZE),
                (ResourceKind::Commits, 2, PAGE_SIZE)
            ]
        );
    }

    #[tokio::test]
    async fn test_error_keeps_earlier_pages() {
        let provider = FakeProvider::new()
            .with_pages(
                ResourceKind::Issues,
                vec![vec![issue(Some("carol"))], vec![issue(Some("dave"))]],
            )
            .failing_after(ResourceKind::Issues, 1);
        let repo = repo();

        let (items, outcome) = PaginatedFetcher::new(&provider, &repo, ResourceKind::Issues)
            .collect()
            .await;

        assert_eq!(items, vec![issue(Some("carol"))]);
        assert_eq!(outcome.pages, 1);
        assert!(matches!(outcome.error, Some(Error::GitHubApi(_))));
        assert_eq!(provider.request_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_resource_makes_one_request() {
        let provider = FakeProvider::new();
        let repo = repo();

        let (items, outcome) = PaginatedFetcher::new(&provider, &repo, ResourceKind::PullRequests)
            .with_page_size(10)
            .collect()
            .await;

        assert!(items.is_empty());
        assert_eq!(outcome.pages, 1);
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_drain_into_channel() {
        let provider = FakeProvider::new().with_pages(
            ResourceKind::PullRequests,
            vec![vec![pull_request(Some("erin"))], vec![pull_request(None)]],
        );
        let repo = repo();
        let (tx, mut rx) = mpsc::channel(4);

        let outcome = PaginatedFetcher::new(&provider, &repo, ResourceKind::PullRequests)
            .drain_into(tx)
            .await;

        let mut received = Vec::new();
        while let Some(items) = rx.recv().await {
            received.extend(items);
        }
        assert_eq!(received.len(), 2);
        assert_eq!(outcome.items, 2);
    }
}
