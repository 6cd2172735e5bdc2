pub mod downloader;
pub mod executor;
pub mod plan;
pub mod types;

pub use executor::DownloadExecutor;
pub use plan::PlanBuilder;
pub use types::{CancelHandle, CancelToken, DownloadPlan, PendingFile, ProgressFn};
