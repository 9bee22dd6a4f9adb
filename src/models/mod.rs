pub mod task;
pub mod activity;
pub mod contributor;
pub mod result;

pub use task::*;
pub use activity::*;
pub use contributor::*;
pub use result::*;
