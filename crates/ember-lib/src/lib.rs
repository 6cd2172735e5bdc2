pub mod game;
pub mod store;

// Re-export commonly used types
pub use game::config::LauncherConfig;
pub use game::error::LauncherError;
pub use game::installer::{CancelHandle, CancelToken, DownloadExecutor, DownloadPlan, PlanBuilder};
pub use game::launcher::{LaunchCommand, LaunchOptions};
pub use game::profiles::{ProfileDescriptor, ProfileOrchestrator};
pub use game::runtime::{RuntimeProvisioner, RuntimeState};
pub use game::versions::{Resolution, VersionDescriptor, VersionResolver, VersionSummary};
pub use game::Launcher;
pub use store::LocalStore;
