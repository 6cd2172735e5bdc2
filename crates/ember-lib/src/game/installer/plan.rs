//! Download plan computation: walks a resolved descriptor, its runtime and
//! its asset index, producing the byte-accurate set of missing items.

use crate::game::config::LauncherConfig;
use crate::game::error::{io_error, LauncherError};
use crate::game::installer::downloader::download_to_path;
use crate::game::installer::types::{DownloadPlan, PendingFile};
use crate::game::rules::{evaluate_rules, host_arch_bits, RuleAction, RuleContext};
use crate::game::runtime::{RuntimeProvisioner, RuntimeState};
use crate::game::versions::{AssetIndexFile, Resolution, VersionDescriptor, VersionResolver};
use crate::store::LocalStore;
use reqwest::Client;
use std::sync::Arc;

#[derive(Default)]
struct BranchTotals {
    total: u64,
    downloaded: u64,
    pending: Vec<PendingFile>,
    runtime_to_install: Option<u32>,
}

pub struct PlanBuilder {
    store: Arc<LocalStore>,
    http: Client,
    config: Arc<LauncherConfig>,
    resolver: Arc<VersionResolver>,
    runtime: Arc<RuntimeProvisioner>,
}

impl PlanBuilder {
    pub fn new(
        store: Arc<LocalStore>,
        http: Client,
        config: Arc<LauncherConfig>,
        resolver: Arc<VersionResolver>,
        runtime: Arc<RuntimeProvisioner>,
    ) -> Self {
        Self {
            store,
            http,
            config,
            resolver,
            runtime,
        }
    }

    /// Compute the plan for a version, or `None` when its descriptor
    /// cannot be resolved at all.
    ///
    /// The four branches (client archive, runtime, libraries, assets) run
    /// concurrently; each accumulates into its own totals, so the only
    /// shared work is the final summation.
    pub async fn build_plan(
        &self,
        version_id: &str,
    ) -> Result<Option<DownloadPlan>, LauncherError> {
        let descriptor = match self.resolver.resolve(version_id, true).await? {
            Resolution::Ready(descriptor) => descriptor,
            Resolution::NotCached => {
                log::warn!("Cannot plan download for unknown version {}", version_id);
                return Ok(None);
            }
        };

        let ctx = RuleContext::current();
        let (client, runtime, libraries, assets) = tokio::join!(
            self.client_branch(version_id, &descriptor),
            self.runtime_branch(&descriptor),
            self.library_branch(version_id, &descriptor, &ctx),
            self.asset_branch(&descriptor),
        );

        let mut plan = DownloadPlan::default();
        for branch in [client?, runtime?, libraries?, assets?] {
            plan.total_size += branch.total;
            plan.downloaded_size += branch.downloaded;
            plan.pending.extend(branch.pending);
            if branch.runtime_to_install.is_some() {
                plan.runtime_to_install = branch.runtime_to_install;
            }
        }

        log::debug!(
            "Plan for {}: {} pending files, {}/{} bytes, runtime: {:?}",
            version_id,
            plan.pending.len(),
            plan.downloaded_size,
            plan.total_size,
            plan.runtime_to_install
        );
        Ok(Some(plan))
    }

    async fn client_branch(
        &self,
        version_id: &str,
        descriptor: &VersionDescriptor,
    ) -> Result<BranchTotals, LauncherError> {
        let mut out = BranchTotals::default();

        let Some(downloads) = &descriptor.downloads else {
            log::warn!("Descriptor {} has no client download block", version_id);
            return Ok(out);
        };

        let client = &downloads.client;
        out.total += client.size;

        let jar_path = self.store.version_jar_path(version_id);
        if self.store.verify(&jar_path, &client.sha1).await {
            out.downloaded += client.size;
        } else {
            out.pending.push(PendingFile {
                path: jar_path,
                url: client.url.clone(),
                size: Some(client.size),
                extract_to: None,
            });
        }
        Ok(out)
    }

    async fn runtime_branch(
        &self,
        descriptor: &VersionDescriptor,
    ) -> Result<BranchTotals, LauncherError> {
        let mut out = BranchTotals::default();

        let declared = descriptor.java_version.as_ref().map(|j| j.major_version);
        let major = self.config.effective_runtime_major(declared);

        match self.runtime.state(major).await {
            RuntimeState::Downloaded { total_size, .. } => {
                out.total += total_size;
                out.downloaded += total_size;
            }
            RuntimeState::Outdated { update_size } => {
                out.total += update_size;
                out.runtime_to_install = Some(major);
            }
            RuntimeState::Absent { total_size } => {
                out.total += total_size;
                out.runtime_to_install = Some(major);
            }
            RuntimeState::Downloading { total_size, .. } => {
                out.total += total_size;
                out.runtime_to_install = Some(major);
            }
        }
        Ok(out)
    }

    async fn library_branch(
        &self,
        version_id: &str,
        descriptor: &VersionDescriptor,
        ctx: &RuleContext,
    ) -> Result<BranchTotals, LauncherError> {
        let mut out = BranchTotals::default();

        for library in &descriptor.libraries {
            // Absent rules mean the library always applies.
            if let Some(rules) = &library.rules {
                if evaluate_rules(rules, ctx) == RuleAction::Disallow {
                    log::debug!("Skipping library due to rules: {}", library.name);
                    continue;
                }
            }

            let Some(downloads) = &library.downloads else {
                continue;
            };

            if let Some(artifact) = &downloads.artifact {
                out.total += artifact.size;
                let path = self.store.library_path(&artifact.path);
                if self.store.verify(&path, &artifact.sha1).await {
                    out.downloaded += artifact.size;
                } else {
                    out.pending.push(PendingFile {
                        path,
                        url: artifact.url.clone(),
                        size: Some(artifact.size),
                        extract_to: None,
                    });
                }
            }

            // Native classifier for the current platform, unpacked into the
            // version's natives directory after download.
            if let (Some(natives), Some(classifiers)) =
                (&library.natives, &downloads.classifiers)
            {
                if let Some(template) = natives.get(&ctx.os_name) {
                    let key = template.replace("${arch}", host_arch_bits());
                    if let Some(native) = classifiers.get(&key) {
                        out.total += native.size;
                        let path = self.store.library_path(&native.path);
                        if self.store.verify(&path, &native.sha1).await {
                            out.downloaded += native.size;
                        } else {
                            out.pending.push(PendingFile {
                                path,
                                url: native.url.clone(),
                                size: Some(native.size),
                                extract_to: Some(self.store.natives_dir(version_id)),
                            });
                        }
                    } else {
                        log::debug!(
                            "Library {} declares natives but no {} classifier",
                            library.name,
                            key
                        );
                    }
                }
            }
        }
        Ok(out)
    }

    async fn asset_branch(
        &self,
        descriptor: &VersionDescriptor,
    ) -> Result<BranchTotals, LauncherError> {
        let mut out = BranchTotals::default();

        let Some(index_ref) = &descriptor.asset_index else {
            return Ok(out);
        };
        let assets_id = descriptor.assets_id().unwrap_or(&index_ref.id);
        let index_path = self.store.asset_index_path(assets_id);

        // The index file itself is fetched synchronously before the object
        // loop, since the loop depends on its contents.
        if !self.store.verify(&index_path, &index_ref.sha1).await {
            log::info!("Fetching asset index {} from {}", assets_id, index_ref.url);
            download_to_path(
                &self.http,
                &index_ref.url,
                &index_path,
                Some(&index_ref.sha1),
                |_| {},
            )
            .await
            .map_err(|e| LauncherError::transfer(&index_ref.url, e))?;
        }

        let text = self
            .store
            .read_to_string(&index_path)
            .await
            .map_err(io_error)?;
        let index: AssetIndexFile =
            serde_json::from_str(&text).map_err(|e| LauncherError::Parse {
                what: index_path.display().to_string(),
                source: e,
            })?;

        for object in index.objects.values() {
            out.total += object.size;
            let path = self.store.asset_object_path(&object.hash);
            // Content-addressed: the declared hash doubles as the expected
            // content hash, so a wrong-content file is pending despite
            // existing.
            if self.store.verify(&path, &object.hash).await {
                out.downloaded += object.size;
            } else {
                out.pending.push(PendingFile {
                    path,
                    url: format!(
                        "{}/{}/{}",
                        self.config.asset_base_url,
                        &object.hash[0..2],
                        object.hash
                    ),
                    size: Some(object.size),
                    extract_to: None,
                });
            }
        }
        Ok(out)
    }
}
