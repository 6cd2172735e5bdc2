pub mod config;
pub mod error;
pub mod installer;
pub mod launcher;
pub mod profiles;
pub mod rules;
pub mod runtime;
pub mod versions;

use crate::store::LocalStore;
use anyhow::{Context, Result};
use config::LauncherConfig;
use error::LauncherError;
use installer::plan::PlanBuilder;
use installer::types::{CancelToken, ProgressFn};
use installer::DownloadExecutor;
use launcher::{LaunchCommand, LaunchOptions};
use profiles::ProfileOrchestrator;
use runtime::RuntimeProvisioner;
use std::sync::Arc;
use versions::{Resolution, VersionResolver, VersionSummary};

/// Process-scoped entry point owning one instance of every component.
///
/// This is the boundary consumed by the UI/process-spawn layer: it lists
/// known version and profile ids, produces resolved summaries, triggers
/// downloads with a progress stream and, once a profile is fully
/// downloaded, yields the launch command for spawning the runtime.
pub struct Launcher {
    config: Arc<LauncherConfig>,
    store: Arc<LocalStore>,
    resolver: Arc<VersionResolver>,
    runtime: Arc<RuntimeProvisioner>,
    plans: Arc<PlanBuilder>,
    executor: Arc<DownloadExecutor>,
    profiles: Arc<ProfileOrchestrator>,
}

impl Launcher {
    pub fn new(config: LauncherConfig) -> Result<Self> {
        let config = Arc::new(config);
        let store = Arc::new(LocalStore::new(config.base_dir.clone()));
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let resolver = Arc::new(VersionResolver::new(
            store.clone(),
            http.clone(),
            config.clone(),
        ));
        let runtime = Arc::new(RuntimeProvisioner::new(
            store.clone(),
            http.clone(),
            config.clone(),
        ));
        let plans = Arc::new(PlanBuilder::new(
            store.clone(),
            http.clone(),
            config.clone(),
            resolver.clone(),
            runtime.clone(),
        ));
        let executor = Arc::new(DownloadExecutor::new(
            http.clone(),
            config.clone(),
            plans.clone(),
            runtime.clone(),
        ));
        let profiles = Arc::new(ProfileOrchestrator::new(
            store.clone(),
            http,
            config.clone(),
            plans.clone(),
            executor.clone(),
        ));

        Ok(Self {
            config,
            store,
            resolver,
            runtime,
            plans,
            executor,
            profiles,
        })
    }

    /// Refresh every remote catalog: versions, runtime index, profiles.
    pub async fn refresh(&self) -> Result<(), LauncherError> {
        self.resolver.refresh_catalog().await?;
        self.runtime.refresh_index().await?;
        self.profiles.reload_profiles().await?;
        Ok(())
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn resolver(&self) -> &Arc<VersionResolver> {
        &self.resolver
    }

    pub fn runtime(&self) -> &Arc<RuntimeProvisioner> {
        &self.runtime
    }

    pub fn plans(&self) -> &Arc<PlanBuilder> {
        &self.plans
    }

    pub fn profiles(&self) -> &Arc<ProfileOrchestrator> {
        &self.profiles
    }

    pub fn version_ids(&self) -> Vec<String> {
        self.resolver.version_ids()
    }

    pub fn profile_ids(&self) -> Vec<String> {
        self.profiles.profile_ids()
    }

    /// Resolved one-line summary for the UI: id, release classification,
    /// inheritance parent, aggregate download fraction.
    pub async fn version_summary(
        &self,
        id: &str,
    ) -> Result<Option<VersionSummary>, LauncherError> {
        let descriptor = match self.resolver.resolve(id, true).await? {
            Resolution::Ready(descriptor) => descriptor,
            Resolution::NotCached => return Ok(None),
        };

        let fraction = match self.plans.build_plan(id).await? {
            Some(plan) => plan.fraction(),
            None => 0.0,
        };

        Ok(Some(VersionSummary {
            id: id.to_string(),
            release_type: descriptor.release_type,
            inherits_from: descriptor.inherits_from.clone(),
            download_fraction: fraction,
        }))
    }

    pub async fn download_version(
        &self,
        id: &str,
        on_progress: &ProgressFn<'_>,
        cancel: &CancelToken,
    ) -> bool {
        self.executor.download_version(id, on_progress, cancel).await
    }

    pub async fn download_profile(
        &self,
        id: &str,
        on_progress: &ProgressFn<'_>,
        cancel: &CancelToken,
    ) -> bool {
        self.profiles.download_profile(id, on_progress, cancel).await
    }

    /// Build the command for spawning a fully-downloaded profile. Fails
    /// when the profile is unknown or its artifacts are not all present.
    pub async fn launch_command(
        &self,
        profile_id: &str,
        options: &LaunchOptions,
    ) -> Result<LaunchCommand> {
        let profile = self
            .profiles
            .profile(profile_id)
            .with_context(|| format!("Unknown profile {}", profile_id))?;

        let state = self
            .profiles
            .download_state(profile_id)
            .await?
            .with_context(|| format!("No download state for profile {}", profile_id))?;
        if !state.is_complete() {
            anyhow::bail!(
                "Profile {} is not fully downloaded ({}/{} bytes)",
                profile_id,
                state.downloaded_size,
                state.total_size
            );
        }

        let descriptor = self
            .resolver
            .resolve(&profile.version, false)
            .await?
            .ready()
            .with_context(|| format!("Version {} is not cached", profile.version))?;

        let declared = descriptor.java_version.as_ref().map(|j| j.major_version);
        let runtime_major = self.config.effective_runtime_major(declared);

        let game_dir = self.store.profile_dir(profile_id);
        tokio::fs::create_dir_all(&game_dir).await?;

        launcher::build_launch_command(
            &descriptor,
            &profile.version,
            &self.store,
            &game_dir,
            runtime_major,
            options,
        )
    }
}
