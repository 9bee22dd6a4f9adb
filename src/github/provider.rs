use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Page, RepoRef, ResourceKind};

/// Source of paginated repository activity.
#[async_trait]
pub trait ActivityProvider: Send + Sync {
    /// Fetches page `page` (1-based) of `kind` for `repo`.
    async fn fetch_page(
        &self,
        repo: &RepoRef,
        kind: ResourceKind,
        page: u32,
        per_page: u32,
    ) -> Result<Page>;

    fn has_credential(&self) -> bool;

    fn name(&self) -> &str;
}
