pub mod resolver;
pub mod types;

pub use resolver::{Resolution, VersionResolver, VersionSummary};
pub use types::*;
