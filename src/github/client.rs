use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::{Config, DEFAULT_API_URL};
use crate::error::{Error, Result};
use crate::github::provider::ActivityProvider;
use crate::github::rate_limiter::RateLimiter;
use crate::models::{ActivityItem, Page, RawCommit, RawIssue, RawPullRequest, RepoRef, ResourceKind};

pub struct GitHubClient {
    client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
    authenticated: bool,
}

impl GitHubClient {
    pub fn new(token: Option<&str>) -> Result<Self> {
        Self::with_options(token, DEFAULT_API_URL, Duration::from_secs(30))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_options(
            config.github_token.as_deref(),
            &config.github_api_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_options(token: Option<&str>, base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("contribpulse/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            authenticated: token.is_some(),
        })
    }

    fn page_url(&self, repo: &RepoRef, kind: ResourceKind, page: u32, per_page: u32) -> String {
        let (path, filter) = match kind {
            ResourceKind::Commits => ("commits", ""),
            ResourceKind::PullRequests => ("pulls", "state=all&"),
            ResourceKind::Issues => ("issues", "state=all&"),
        };
        format!(
            "{}/repos/{}/{}/{}?{}per_page={}&page={}",
            self.base_url, repo.owner, repo.name, path, filter, per_page, page
        )
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        repo: &RepoRef,
        kind: ResourceKind,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<T>, Option<u32>)> {
        self.rate_limiter.check()?;

        let url = self.page_url(repo, kind, page, per_page);
        tracing::debug!("Fetching: {}", url);

        let response = self.client.get(&url).send().await?;
        self.rate_limiter.update_from_headers(response.headers());

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::RepoNotFound(repo.to_string()));
        }
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            if let Some(retry_after) = self.rate_limiter.retry_after() {
                return Err(Error::RateLimited(retry_after));
            }
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch {} for {}: {} - {}",
                kind, repo, status, body
            )));
        }

        // Pagination follows the Link header only; page length is not a signal.
        let next_page = next_page_of(response.headers());
        let items: Vec<T> = response.json().await?;

        Ok((items, next_page))
    }
}

#[async_trait]
impl ActivityProvider for GitHubClient {
    async fn fetch_page(
        &self,
        repo: &RepoRef,
        kind: ResourceKind,
        page: u32,
        per_page: u32,
    ) -> Result<Page> {
        let (items, next_page) = match kind {
            ResourceKind::Commits => {
                let (items, next) = self.get_page::<RawCommit>(repo, kind, page, per_page).await?;
                (items.into_iter().map(ActivityItem::Commit).collect(), next)
            }
            ResourceKind::PullRequests => {
                let (items, next) = self
                    .get_page::<RawPullRequest>(repo, kind, page, per_page)
                    .await?;
                (items.into_iter().map(ActivityItem::PullRequest).collect(), next)
            }
            ResourceKind::Issues => {
                let (items, next) = self.get_page::<RawIssue>(repo, kind, page, per_page).await?;
                (items.into_iter().map(ActivityItem::Issue).collect(), next)
            }
        };

        Ok(Page { items, next_page })
    }

    fn has_credential(&self) -> bool {
        self.authenticated
    }

    fn name(&self) -> &str {
        "github"
    }
}

fn next_page_of(headers: &header::HeaderMap) -> Option<u32> {
    headers
        .get(header::LINK)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_next_page)
}

/// Extracts the `page` query parameter of the `rel="next"` entry of a
/// GitHub `Link` header.
pub fn parse_next_page(link: &str) -> Option<u32> {
    link.split(',')
        .map(str::trim)
        .find(|entry| entry.contains("rel=\"next\""))
        .and_then(|entry| {
            let start = entry.find('<')? + 1;
            let end = entry.find('>')?;
            let url = entry.get(start..end)?;
            let query = url.split_once('?')?.1;
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "page")
                .and_then(|(_, value)| value.parse().ok())
        })
}
