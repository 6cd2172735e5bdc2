//! Centralized launcher settings.
//! URL constants and tunables used by the resolver, plan builder and executors.

use std::path::PathBuf;
use std::time::Duration;

pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Files downloaded concurrently within one executor batch.
pub const DOWNLOAD_CONCURRENCY: usize = 10;

/// Attempts per file before a transfer is abandoned.
pub const DOWNLOAD_RETRIES: u32 = 3;

/// Inheritance chains longer than this are treated as cycles.
pub const MAX_INHERITANCE_DEPTH: u32 = 20;

// URL Constants
pub const VERSION_CATALOG_URL: &str = "https://meta.emberlauncher.net/versions/catalog.json";
pub const PROFILE_CATALOG_URL: &str = "https://meta.emberlauncher.net/profiles/profiles.json";
pub const RUNTIME_INDEX_URL: &str = "https://meta.emberlauncher.net/runtime/index.json";
pub const ASSET_BASE_URL: &str = "https://resources.download.minecraft.net";

pub const LAUNCHER_NAME: &str = "EmberLauncher";
pub const LAUNCHER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime majors we publish builds for in the runtime index.
pub const SUPPORTED_RUNTIME_MAJORS: &[u32] = &[8, 11, 17, 21];

/// Substituted when a descriptor declares an unsupported runtime major.
pub const DEFAULT_RUNTIME_MAJOR: u32 = 17;

/// Process-scoped launcher configuration, constructed once and shared by
/// every component instance.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Root of the on-disk store (versions/, libraries/, assets/, ...).
    pub base_dir: PathBuf,

    /// Remote version catalog document.
    pub catalog_url: String,

    /// Remote profile catalog document.
    pub profiles_url: String,

    /// Remote runtime distribution index.
    pub runtime_index_url: String,

    /// Base URL content-addressed asset objects are served from.
    pub asset_base_url: String,

    /// Concurrent file transfers per batch.
    pub concurrency: usize,

    /// HTTP request timeout.
    pub request_timeout: Duration,

    /// Runtime majors the runtime index is expected to carry.
    pub supported_runtime_majors: Vec<u32>,

    /// Fallback when a descriptor asks for an unsupported major.
    pub default_runtime_major: u32,
}

impl LauncherConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            catalog_url: VERSION_CATALOG_URL.to_string(),
            profiles_url: PROFILE_CATALOG_URL.to_string(),
            runtime_index_url: RUNTIME_INDEX_URL.to_string(),
            asset_base_url: ASSET_BASE_URL.to_string(),
            concurrency: DOWNLOAD_CONCURRENCY,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            supported_runtime_majors: SUPPORTED_RUNTIME_MAJORS.to_vec(),
            default_runtime_major: DEFAULT_RUNTIME_MAJOR,
        }
    }

    /// Map a descriptor's declared runtime major onto a major we can
    /// actually provision. Unsupported or absent majors fall back to the
    /// configured default.
    pub fn effective_runtime_major(&self, declared: Option<u32>) -> u32 {
        match declared {
            Some(major) if self.supported_runtime_majors.contains(&major) => major,
            _ => self.default_runtime_major,
        }
    }
}
