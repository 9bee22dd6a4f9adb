pub mod config;
pub mod error;
pub mod models;
pub mod github;
pub mod analysis;
pub mod storage;
pub mod queue;

pub use config::{Config, OrchestratorConfig};
pub use error::{Error, Result};
pub use github::{ActivityProvider, GitHubClient};
pub use analysis::Orchestrator;
pub use storage::{MemoryStore, ResultStore, SqliteStore};
pub use queue::{TaskQueue, Worker};
