//! Managed runtime provisioning: resolves the right build for the current
//! platform/arch/major triple, downloads it and installs it atomically.

use crate::game::config::LauncherConfig;
use crate::game::error::LauncherError;
use crate::game::installer::downloader::{download_to_path, extract_archive};
use crate::game::rules::{host_arch, host_os_name};
use crate::store::LocalStore;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Runtime state as reported to callers. `Outdated` is derived, never
/// stored: a persisted `Downloaded` state becomes `Outdated` when the
/// runtime index carries a newer publish date for this platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RuntimeState {
    Absent {
        total_size: u64,
    },
    Downloading {
        downloaded_size: u64,
        total_size: u64,
    },
    Downloaded {
        install_date: DateTime<Utc>,
        total_size: u64,
    },
    Outdated {
        update_size: u64,
    },
}

/// One entry of the remote runtime index, keyed `{major}_{os}_{arch}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeBuild {
    pub url: String,
    pub size: u64,
    pub sha1: String,
    pub date: DateTime<Utc>,
}

/// Durable state written next to an installed runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRuntimeState {
    install_date: DateTime<Utc>,
    total_size: u64,
}

pub type ProgressFn<'a> = dyn Fn(u64, &RuntimeState) + Send + Sync + 'a;

pub struct RuntimeProvisioner {
    store: Arc<LocalStore>,
    http: Client,
    config: Arc<LauncherConfig>,
    index: Mutex<HashMap<String, RuntimeBuild>>,
    states: Mutex<HashMap<u32, RuntimeState>>,
}

impl RuntimeProvisioner {
    pub fn new(store: Arc<LocalStore>, http: Client, config: Arc<LauncherConfig>) -> Self {
        Self {
            store,
            http,
            config,
            index: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the runtime index wholesale from the remote document.
    /// On failure the previous index stays intact.
    pub async fn refresh_index(&self) -> Result<(), LauncherError> {
        let url = self.config.runtime_index_url.clone();
        log::info!("Refreshing runtime index from {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LauncherError::catalog_fetch(&url, e))?;
        if !response.status().is_success() {
            return Err(LauncherError::catalog_fetch(
                &url,
                format!("HTTP error {}", response.status()),
            ));
        }
        let parsed: HashMap<String, RuntimeBuild> = response
            .json()
            .await
            .map_err(|e| LauncherError::catalog_fetch(&url, e))?;

        log::info!("Runtime index loaded: {} builds", parsed.len());
        *self.index.lock().unwrap() = parsed;
        Ok(())
    }

    /// The index entry for this major on the current platform, if any.
    pub fn build_for(&self, major: u32) -> Option<RuntimeBuild> {
        let key = format!("{}_{}_{}", major, host_os_name(), host_arch());
        self.index.lock().unwrap().get(&key).cloned()
    }

    /// Current state for a runtime major. Reads the persisted install
    /// record on first access, then answers from memory.
    pub async fn state(&self, major: u32) -> RuntimeState {
        let build = self.build_for(major);

        let known = self.states.lock().unwrap().get(&major).cloned();
        let state = match known {
            Some(state) => state,
            None => match self.load_persisted_state(major).await {
                Some(persisted) => {
                    let state = RuntimeState::Downloaded {
                        install_date: persisted.install_date,
                        total_size: persisted.total_size,
                    };
                    self.states.lock().unwrap().insert(major, state.clone());
                    state
                }
                None => {
                    return RuntimeState::Absent {
                        total_size: build.map(|b| b.size).unwrap_or(0),
                    }
                }
            },
        };

        if let (RuntimeState::Downloaded { install_date, .. }, Some(build)) = (&state, &build) {
            if *install_date < build.date {
                return RuntimeState::Outdated {
                    update_size: build.size,
                };
            }
        }

        state
    }

    async fn load_persisted_state(&self, major: u32) -> Option<PersistedRuntimeState> {
        let path = self.store.runtime_state_path(major);
        if !path.exists() {
            return None;
        }
        match self.store.read_to_string(&path).await {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(persisted) => Some(persisted),
                Err(e) => {
                    log::warn!("Ignoring unreadable runtime state {:?}: {}", path, e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read runtime state {:?}: {}", path, e);
                None
            }
        }
    }

    /// Download and install the runtime for a major version.
    ///
    /// Returns `Ok(false)` without side effects when the current state is
    /// neither absent nor outdated, or when the index has no build for
    /// this platform. Concurrent calls for the same major are expected to
    /// be serialized by the download executor's per-id guard.
    pub async fn download(
        &self,
        major: u32,
        on_progress: &ProgressFn<'_>,
    ) -> Result<bool, LauncherError> {
        let state = self.state(major).await;
        if !matches!(
            state,
            RuntimeState::Absent { .. } | RuntimeState::Outdated { .. }
        ) {
            log::debug!("Runtime {} not downloadable in state {:?}", major, state);
            return Ok(false);
        }

        let Some(build) = self.build_for(major) else {
            log::warn!(
                "No runtime build for major {} on {}/{}",
                major,
                host_os_name(),
                host_arch()
            );
            return Ok(false);
        };

        match self.install(major, &build, on_progress).await {
            Ok(()) => Ok(true),
            Err(e) => {
                // Forget the transient Downloading state so the next call
                // re-derives from disk.
                self.states.lock().unwrap().remove(&major);
                Err(e)
            }
        }
    }

    async fn install(
        &self,
        major: u32,
        build: &RuntimeBuild,
        on_progress: &ProgressFn<'_>,
    ) -> Result<(), LauncherError> {
        log::info!(
            "Installing runtime {} from {} ({} bytes)",
            major,
            build.url,
            build.size
        );

        let staging = tempfile::tempdir().map_err(LauncherError::Io)?;
        let archive_path = staging.path().join("runtime-archive");

        let downloaded = AtomicU64::new(0);
        let total = build.size;
        let on_chunk = |len: u64| {
            let running = downloaded.fetch_add(len, Ordering::SeqCst) + len;
            let snapshot = RuntimeState::Downloading {
                downloaded_size: running.min(total),
                total_size: total,
            };
            self.states.lock().unwrap().insert(major, snapshot.clone());
            on_progress(len, &snapshot);
        };

        download_to_path(
            &self.http,
            &build.url,
            &archive_path,
            Some(&build.sha1),
            on_chunk,
        )
        .await
        .map_err(|e| LauncherError::transfer(&build.url, e))?;

        let extract_dir = staging.path().join("extracted");
        extract_archive(&archive_path, &build.url, &extract_dir)
            .await
            .map_err(|e| LauncherError::transfer(&build.url, e))?;

        // Some archives wrap the runtime root in a single top-level
        // directory; detect that by looking for `bin` directly.
        let runtime_root = if extract_dir.join("bin").exists() {
            extract_dir.clone()
        } else {
            first_subdirectory(&extract_dir)?.ok_or_else(|| {
                LauncherError::transfer(&build.url, "archive contained no runtime root")
            })?
        };

        let target = self.store.runtime_dir(major);
        self.store
            .install_directory_atomic(&runtime_root, &target)
            .await
            .map_err(|e| LauncherError::Io(std::io::Error::other(e.to_string())))?;

        let persisted = PersistedRuntimeState {
            install_date: build.date,
            total_size: build.size,
        };
        let body = serde_json::to_vec_pretty(&persisted).map_err(|e| LauncherError::Parse {
            what: "runtime state".to_string(),
            source: e,
        })?;
        self.store
            .write_atomic(&self.store.runtime_state_path(major), &body)
            .await
            .map_err(|e| LauncherError::Io(std::io::Error::other(e.to_string())))?;

        let state = RuntimeState::Downloaded {
            install_date: build.date,
            total_size: build.size,
        };
        self.states.lock().unwrap().insert(major, state.clone());
        on_progress(0, &state);

        log::info!("Runtime {} installed at {:?}", major, target);
        Ok(())
    }
}

/// Path of the runtime's java executable once installed.
pub fn runtime_executable(store: &LocalStore, major: u32) -> PathBuf {
    let executable = if cfg!(windows) { "java.exe" } else { "java" };
    store.runtime_dir(major).join("bin").join(executable)
}

fn first_subdirectory(dir: &std::path::Path) -> Result<Option<PathBuf>, LauncherError> {
    for entry in std::fs::read_dir(dir).map_err(LauncherError::Io)? {
        let entry = entry.map_err(LauncherError::Io)?;
        if entry.path().is_dir() {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}
