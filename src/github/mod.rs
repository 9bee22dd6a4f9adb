pub mod client;
pub mod provider;
pub mod rate_limiter;
pub mod paginator;

pub use client::GitHubClient;
pub use provider::ActivityProvider;
pub use rate_limiter::RateLimiter;
pub use paginator::{FetchOutcome, PaginatedFetcher, PAGE_SIZE};
