use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Work item delivered by the queue: analyze one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_id: String,
    pub repo_url: String,
}

impl TaskMessage {
    pub fn new(task_id: impl Into<String>, repo_url: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            repo_url: repo_url.into(),
        }
    }

    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| Error::MalformedInput(format!("unparseable task body: {}", e)))
    }

    pub fn repo_ref(&self) -> Result<RepoRef> {
        RepoRef::parse(&self.repo_url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parses `https://host/<owner>/<name>[.git]`. Extra trailing path
    /// segments (e.g. `/tree/main`) are ignored.
    pub fn parse(repo_url: &str) -> Result<Self> {
        let url = Url::parse(repo_url.trim())
            .map_err(|e| Error::MalformedInput(format!("invalid repo URL {}: {}", repo_url, e)))?;

        let mut segments = url.path().split('/').skip(1);
        let owner = segments.next().unwrap_or_default();
        let name = segments
            .next()
            .map(|s| s.strip_suffix(".git").unwrap_or(s))
            .unwrap_or_default();

        if owner.is_empty() || name.is_empty() {
            return Err(Error::MalformedInput(format!(
                "repo URL must have the form https://host/<owner>/<name>: {}",
                repo_url
            )));
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
