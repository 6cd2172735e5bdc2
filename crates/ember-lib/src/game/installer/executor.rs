//! Download execution: runs a plan in bounded, strictly sequential batches
//! under a per-id single-flight guard.

use crate::game::config::LauncherConfig;
use crate::game::error::LauncherError;
use crate::game::installer::downloader::{download_to_path, extract_zip_sync};
use crate::game::installer::plan::PlanBuilder;
use crate::game::installer::types::{CancelToken, FlightSet, PendingFile, ProgressFn};
use crate::game::runtime::RuntimeProvisioner;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct DownloadExecutor {
    http: Client,
    config: Arc<LauncherConfig>,
    plans: Arc<PlanBuilder>,
    runtime: Arc<RuntimeProvisioner>,
    in_flight: FlightSet,
}

impl DownloadExecutor {
    pub fn new(
        http: Client,
        config: Arc<LauncherConfig>,
        plans: Arc<PlanBuilder>,
        runtime: Arc<RuntimeProvisioner>,
    ) -> Self {
        Self {
            http,
            config,
            plans,
            runtime,
            in_flight: FlightSet::new(),
        }
    }

    /// Whether a download for this version is currently running.
    pub fn is_downloading(&self, version_id: &str) -> bool {
        self.in_flight.contains(version_id)
    }

    /// Download everything a version still needs.
    ///
    /// Returns false when another download for the same id is in flight
    /// (rejected before any plan is built), when the id cannot be
    /// resolved, or when any transfer fails. Already-written files stay on
    /// disk either way, so a retry resumes where this call stopped.
    pub async fn download_version(
        &self,
        version_id: &str,
        on_progress: &ProgressFn<'_>,
        cancel: &CancelToken,
    ) -> bool {
        let Some(_guard) = self.in_flight.try_acquire(version_id) else {
            log::info!("Download of {} already in flight, rejecting", version_id);
            return false;
        };

        match self.run(version_id, on_progress, cancel).await {
            Ok(completed) => completed,
            Err(e) => {
                log::error!("Download of {} failed: {}", version_id, e);
                false
            }
        }
    }

    async fn run(
        &self,
        version_id: &str,
        on_progress: &ProgressFn<'_>,
        cancel: &CancelToken,
    ) -> Result<bool, LauncherError> {
        let Some(plan) = self.plans.build_plan(version_id).await? else {
            return Ok(false);
        };

        log::info!(
            "Starting download of {}: {} files, {}/{} bytes present",
            version_id,
            plan.pending.len(),
            plan.downloaded_size,
            plan.total_size
        );

        let total = plan.total_size;
        let downloaded = AtomicU64::new(plan.downloaded_size);
        let report = |chunk: u64| {
            let running = downloaded.fetch_add(chunk, Ordering::SeqCst) + chunk;
            on_progress(chunk, total, running.min(total));
        };

        // Duplicate library entries are legal in merged descriptors; keep
        // only the first pending file per path so no two transfers write
        // the same destination concurrently.
        let mut seen_paths = HashSet::new();
        let pending: Vec<&PendingFile> = plan
            .pending
            .iter()
            .filter(|file| seen_paths.insert(file.path.clone()))
            .collect();

        // Fixed-size batches: all transfers of a batch settle before the
        // next batch starts.
        for batch in pending.chunks(self.config.concurrency.max(1)) {
            if cancel.is_cancelled() {
                log::warn!("Download of {} cancelled at batch boundary", version_id);
                return Ok(false);
            }

            let transfers = batch.iter().map(|file| self.fetch_one(file, &report));
            futures::future::try_join_all(transfers).await?;
        }

        if let Some(major) = plan.runtime_to_install {
            if cancel.is_cancelled() {
                log::warn!("Download of {} cancelled before runtime install", version_id);
                return Ok(false);
            }

            let accepted = self
                .runtime
                .download(major, &|chunk, _state| report(chunk))
                .await?;
            if !accepted {
                // Another operation installed it in the meantime, or the
                // index has no build for this platform.
                log::warn!("Runtime {} install request was not accepted", major);
            }
        }

        log::info!("Download of {} complete", version_id);
        Ok(true)
    }

    async fn fetch_one(
        &self,
        file: &PendingFile,
        report: &(impl Fn(u64) + Send + Sync),
    ) -> Result<(), LauncherError> {
        download_to_path(&self.http, &file.url, &file.path, None, report)
            .await
            .map_err(|e| LauncherError::transfer(&file.url, e))?;

        if let Some(extract_to) = &file.extract_to {
            let bytes = tokio::fs::read(&file.path).await?;
            let dest = extract_to.clone();
            tokio::task::spawn_blocking(move || extract_zip_sync(&bytes, &dest))
                .await
                .map_err(|e| LauncherError::Io(std::io::Error::other(e.to_string())))?
                .map_err(|e| LauncherError::transfer(&file.url, e))?;
        }
        Ok(())
    }
}
