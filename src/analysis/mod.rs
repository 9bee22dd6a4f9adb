pub mod aggregator;
pub mod ranker;
pub mod orchestrator;

pub use aggregator::{Aggregate, ContributorAggregator};
pub use ranker::{Ranker, TOP_N};
pub use orchestrator::{Orchestrator, TaskState};
