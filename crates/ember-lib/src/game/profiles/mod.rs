//! Profile orchestration: composes a named configuration (selected
//! version plus optional bundled game data) on top of the version
//! resolver and download executor.

use crate::game::config::LauncherConfig;
use crate::game::error::LauncherError;
use crate::game::installer::downloader::{download_to_path, extract_zip_sync};
use crate::game::installer::plan::PlanBuilder;
use crate::game::installer::types::{CancelToken, FlightSet, ProgressFn};
use crate::game::installer::DownloadExecutor;
use crate::store::LocalStore;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// One profile of the remote profile catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDescriptor {
    pub id: String,
    pub name: String,

    /// Target version id.
    pub version: String,

    /// Optional bundled game data extracted into the profile directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundled_data: Option<BundleRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleRef {
    pub url: String,
    pub sha1: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCatalogFile {
    pub profiles: Vec<ProfileDescriptor>,
}

/// Byte-accurate account of what a profile still needs: the version plan
/// totals plus the bundle, when one is declared.
#[derive(Debug, Clone, Default)]
pub struct ProfileDownloadState {
    pub total_size: u64,
    pub downloaded_size: u64,
    pub pending_version: Option<String>,
    pub pending_bundle: Option<BundleRef>,
}

impl ProfileDownloadState {
    pub fn is_complete(&self) -> bool {
        self.pending_version.is_none() && self.pending_bundle.is_none()
    }
}

pub struct ProfileOrchestrator {
    store: Arc<LocalStore>,
    http: Client,
    config: Arc<LauncherConfig>,
    plans: Arc<PlanBuilder>,
    executor: Arc<DownloadExecutor>,
    profiles: Mutex<HashMap<String, ProfileDescriptor>>,
    // Separate lock keyspace from the executor's per-version guard.
    in_flight: FlightSet,
}

impl ProfileOrchestrator {
    pub fn new(
        store: Arc<LocalStore>,
        http: Client,
        config: Arc<LauncherConfig>,
        plans: Arc<PlanBuilder>,
        executor: Arc<DownloadExecutor>,
    ) -> Self {
        Self {
            store,
            http,
            config,
            plans,
            executor,
            profiles: Mutex::new(HashMap::new()),
            in_flight: FlightSet::new(),
        }
    }

    /// Replace the in-memory profile catalog wholesale from the remote
    /// document. On failure the previous catalog stays intact.
    pub async fn reload_profiles(&self) -> Result<(), LauncherError> {
        let url = self.config.profiles_url.clone();
        log::info!("Reloading profile catalog from {}", url);

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
        let body = response
            .text()
            .await
            .map_err(|e| LauncherError::catalog_fetch(&url, e))?;
        let parsed: ProfileCatalogFile =
            serde_json::from_str(&body).map_err(|e| LauncherError::catalog_fetch(&url, e))?;

        if let Err(e) = self
            .store
            .write_atomic(&self.store.profile_catalog_path(), body.as_bytes())
            .await
        {
            log::warn!("Failed to persist profile catalog: {}", e);
        }

        let mut profiles = HashMap::new();
        for profile in parsed.profiles {
            profiles.insert(profile.id.clone(), profile);
        }
        let count = profiles.len();
        *self.profiles.lock().unwrap() = profiles;
        log::info!("Profile catalog loaded: {} profiles", count);
        Ok(())
    }

    pub fn profile_ids(&self) -> Vec<String> {
        self.profiles.lock().unwrap().keys().cloned().collect()
    }

    pub fn profile(&self, id: &str) -> Option<ProfileDescriptor> {
        self.profiles.lock().unwrap().get(id).cloned()
    }

    /// Whether a download for this profile is currently running.
    pub fn is_downloading(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    /// Sum the selected version's plan with the bundle verification.
    /// `None` when the profile id is unknown or its version cannot be
    /// resolved.
    pub async fn download_state(
        &self,
        id: &str,
    ) -> Result<Option<ProfileDownloadState>, LauncherError> {
        let Some(profile) = self.profile(id) else {
            return Ok(None);
        };

        let mut state = ProfileDownloadState::default();

        match self.plans.build_plan(&profile.version).await? {
            Some(plan) => {
                state.total_size += plan.total_size;
                state.downloaded_size += plan.downloaded_size;
                if !plan.is_complete() {
                    state.pending_version = Some(profile.version.clone());
                }
            }
            None => {
                log::error!(
                    "Could not compute download state of version {} for profile {}",
                    profile.version,
                    id
                );
                return Ok(None);
            }
        }

        if let Some(bundle) = &profile.bundled_data {
            state.total_size += bundle.size;
            let path = self.store.profile_bundle_path(id);
            if self.store.verify(&path, &bundle.sha1).await {
                state.downloaded_size += bundle.size;
            } else {
                state.pending_bundle = Some(bundle.clone());
            }
        }

        Ok(Some(state))
    }

    /// Download the profile's version and bundle, concurrently when both
    /// are needed, aggregating progress into one callback. Single-flight
    /// per profile id; a rejected duplicate returns false immediately.
    pub async fn download_profile(
        &self,
        id: &str,
        on_progress: &ProgressFn<'_>,
        cancel: &CancelToken,
    ) -> bool {
        let Some(profile) = self.profile(id) else {
            log::warn!("Unknown profile {}", id);
            return false;
        };

        let state = match self.download_state(id).await {
            Ok(Some(state)) => state,
            Ok(None) => return false,
            Err(e) => {
                log::error!("Failed to compute download state for profile {}: {}", id, e);
                return false;
            }
        };
        if state.is_complete() {
            return true;
        }

        let Some(_guard) = self.in_flight.try_acquire(id) else {
            log::info!("Profile {} download already in flight, rejecting", id);
            return false;
        };
        log::info!("Started profile {} download", id);

        let total = state.total_size;
        let downloaded = AtomicU64::new(state.downloaded_size);
        let report = |chunk: u64| {
            let running = downloaded.fetch_add(chunk, Ordering::SeqCst) + chunk;
            on_progress(chunk, total, running.min(total));
        };

        let version_task = async {
            match &state.pending_version {
                Some(version) => {
                    self.executor
                        .download_version(version, &|chunk, _total, _running| report(chunk), cancel)
                        .await
                }
                None => true,
            }
        };

        let bundle_task = async {
            match &state.pending_bundle {
                Some(bundle) => {
                    let path = self.store.profile_bundle_path(id);
                    match download_to_path(&self.http, &bundle.url, &path, Some(&bundle.sha1), |c| {
                        report(c)
                    })
                    .await
                    {
                        Ok(()) => true,
                        Err(e) => {
                            log::error!("Bundle download for profile {} failed: {}", id, e);
                            false
                        }
                    }
                }
                None => true,
            }
        };

        let (version_ok, bundle_ok) = tokio::join!(version_task, bundle_task);
        if !version_ok || !bundle_ok {
            log::warn!("Profile {} download failed", id);
            return false;
        }

        if state.pending_bundle.is_some() {
            if let Err(e) = self.extract_bundle(&profile).await {
                log::error!("Failed to extract bundle for profile {}: {}", id, e);
                return false;
            }
        }

        log::info!("Finished profile {} download", id);
        true
    }

    /// Unpack the downloaded bundle into the profile's private working
    /// directory, creating it first.
    async fn extract_bundle(&self, profile: &ProfileDescriptor) -> anyhow::Result<()> {
        let profile_dir = self.store.profile_dir(&profile.id);
        tokio::fs::create_dir_all(&profile_dir).await?;

        let bundle_path = self.store.profile_bundle_path(&profile.id);
        let bytes = tokio::fs::read(&bundle_path).await?;
        tokio::task::spawn_blocking(move || extract_zip_sync(&bytes, &profile_dir)).await??;
        Ok(())
    }
}
