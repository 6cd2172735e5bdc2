//! Version catalog and descriptor resolution with inheritance support.

use crate::game::config::{LauncherConfig, MAX_INHERITANCE_DEPTH};
use crate::game::error::{io_error, LauncherError};
use crate::game::versions::types::{
    ArgumentLists, ReleaseType, VersionCatalogFile, VersionDescriptor,
};
use crate::store::LocalStore;
use futures::future::BoxFuture;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Outcome of a descriptor lookup. `NotCached` is a sentinel, not an
/// error: it means resolution would need a network round-trip the caller
/// opted out of (or an id the catalog does not know).
#[derive(Debug, Clone)]
pub enum Resolution {
    Ready(Arc<VersionDescriptor>),
    NotCached,
}

impl Resolution {
    pub fn ready(self) -> Option<Arc<VersionDescriptor>> {
        match self {
            Resolution::Ready(descriptor) => Some(descriptor),
            Resolution::NotCached => None,
        }
    }
}

/// Resolved one-line summary exposed to the UI boundary.
#[derive(Debug, Clone)]
pub struct VersionSummary {
    pub id: String,
    pub release_type: Option<ReleaseType>,
    pub inherits_from: Option<String>,
    pub download_fraction: f64,
}

/// Owns the in-memory version catalog and the resolved-descriptor cache.
///
/// Both maps are append-only during normal operation; entries are only
/// replaced by an explicit catalog reload. Population races on the same
/// key are benign since the merged value is identical for a given input.
pub struct VersionResolver {
    store: Arc<LocalStore>,
    http: Client,
    config: Arc<LauncherConfig>,
    catalog: Mutex<HashMap<String, String>>,
    resolved: Mutex<HashMap<String, Arc<VersionDescriptor>>>,
}

impl VersionResolver {
    pub fn new(store: Arc<LocalStore>, http: Client, config: Arc<LauncherConfig>) -> Self {
        Self {
            store,
            http,
            config,
            catalog: Mutex::new(HashMap::new()),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the in-memory catalog wholesale from the remote index.
    /// On failure the previous catalog stays intact.
    pub async fn refresh_catalog(&self) -> Result<(), LauncherError> {
        let url = self.config.catalog_url.clone();
        log::info!("Refreshing version catalog from {}", url);

        let body = fetch_text(&self.http, &url)
            .await
            .map_err(|e| LauncherError::catalog_fetch(&url, e))?;

        let parsed: VersionCatalogFile = serde_json::from_str(&body)
            .map_err(|e| LauncherError::catalog_fetch(&url, e))?;

        // Keep a local copy so a later offline start can reuse it.
        if let Err(e) = self
            .store
            .write_atomic(&self.store.catalog_path(), body.as_bytes())
            .await
        {
            log::warn!("Failed to persist version catalog: {}", e);
        }

        let count = parsed.versions.len();
        *self.catalog.lock().unwrap() = parsed.versions;
        log::info!("Version catalog loaded: {} versions", count);
        Ok(())
    }

    /// Populate the catalog from the on-disk copy of the last successful
    /// refresh. Used as a fallback when the remote index is unreachable.
    pub async fn load_cached_catalog(&self) -> Result<(), LauncherError> {
        let path = self.store.catalog_path();
        let body = self
            .store
            .read_to_string(&path)
            .await
            .map_err(|e| LauncherError::catalog_fetch(path.display().to_string(), e))?;
        let parsed: VersionCatalogFile =
            serde_json::from_str(&body).map_err(|e| LauncherError::Parse {
                what: path.display().to_string(),
                source: e,
            })?;

        let count = parsed.versions.len();
        *self.catalog.lock().unwrap() = parsed.versions;
        log::info!("Loaded cached version catalog: {} versions", count);
        Ok(())
    }

    /// All version ids the catalog currently knows.
    pub fn version_ids(&self) -> Vec<String> {
        self.catalog.lock().unwrap().keys().cloned().collect()
    }

    /// Resolve a descriptor, following `inheritsFrom` up to the depth
    /// budget and deep-merging child over parent.
    pub async fn resolve(&self, id: &str, allow_fetch: bool) -> Result<Resolution, LauncherError> {
        self.resolve_with_budget(id, allow_fetch, MAX_INHERITANCE_DEPTH)
            .await
    }

    fn resolve_with_budget<'a>(
        &'a self,
        id: &'a str,
        allow_fetch: bool,
        budget: u32,
    ) -> BoxFuture<'a, Result<Resolution, LauncherError>> {
        Box::pin(async move {
            if let Some(cached) = self.resolved.lock().unwrap().get(id).cloned() {
                return Ok(Resolution::Ready(cached));
            }

            let path = self.store.version_json_path(id);
            if !self.store.exists(&path) {
                if !allow_fetch {
                    return Ok(Resolution::NotCached);
                }
                let url = self.catalog.lock().unwrap().get(id).cloned();
                let Some(url) = url else {
                    log::debug!("No catalog entry for version {}", id);
                    return Ok(Resolution::NotCached);
                };

                log::info!("Fetching descriptor for {} from {}", id, url);
                let body = fetch_bytes(&self.http, &url)
                    .await
                    .map_err(|e| LauncherError::transfer(&url, e))?;
                self.store.write_atomic(&path, &body).await.map_err(io_error)?;
            }

            let text = self.store.read_to_string(&path).await.map_err(io_error)?;
            let mut descriptor: VersionDescriptor =
                serde_json::from_str(&text).map_err(|e| LauncherError::Parse {
                    what: path.display().to_string(),
                    source: e,
                })?;

            if let Some(parent_id) = descriptor.inherits_from.clone() {
                if budget <= 1 {
                    return Err(LauncherError::InheritanceDepthExceeded {
                        id: id.to_string(),
                    });
                }
                match self
                    .resolve_with_budget(&parent_id, allow_fetch, budget - 1)
                    .await?
                {
                    Resolution::NotCached => return Ok(Resolution::NotCached),
                    Resolution::Ready(parent) => {
                        descriptor = merge_descriptors((*parent).clone(), descriptor);
                    }
                }
            }

            let descriptor = Arc::new(descriptor);
            self.resolved
                .lock()
                .unwrap()
                .insert(id.to_string(), descriptor.clone());
            Ok(Resolution::Ready(descriptor))
        })
    }

    /// Runtime major this version should run on: the declared one when it
    /// is a supported major, the configured default otherwise.
    pub async fn effective_runtime_major(&self, id: &str) -> Result<Option<u32>, LauncherError> {
        match self.resolve(id, true).await? {
            Resolution::NotCached => Ok(None),
            Resolution::Ready(descriptor) => {
                let declared = descriptor.java_version.as_ref().map(|j| j.major_version);
                Ok(Some(self.config.effective_runtime_major(declared)))
            }
        }
    }

    /// Drop every resolved descriptor; the next lookup re-reads the store.
    pub fn invalidate_resolved(&self) {
        self.resolved.lock().unwrap().clear();
    }
}

/// Deep-merge a child descriptor over its parent. Scalar fields: child
/// wins when present. List fields: child entries first, then the
/// parent's, never deduplicated.
pub(crate) fn merge_descriptors(
    parent: VersionDescriptor,
    child: VersionDescriptor,
) -> VersionDescriptor {
    let mut merged = parent;

    merged.id = child.id;
    // Kept so summaries can report the immediate parent.
    merged.inherits_from = child.inherits_from;

    if child.release_type.is_some() {
        merged.release_type = child.release_type;
    }
    if child.main_class.is_some() {
        merged.main_class = child.main_class;
    }
    if child.java_version.is_some() {
        merged.java_version = child.java_version;
    }
    if child.downloads.is_some() {
        merged.downloads = child.downloads;
    }
    if child.asset_index.is_some() {
        merged.asset_index = child.asset_index;
    }
    if child.assets.is_some() {
        merged.assets = child.assets;
    }

    let parent_libraries = std::mem::take(&mut merged.libraries);
    let mut libraries = child.libraries;
    libraries.extend(parent_libraries);
    merged.libraries = libraries;

    merged.arguments = match (child.arguments, merged.arguments.take()) {
        (Some(child_args), Some(parent_args)) => {
            let mut game = child_args.game;
            game.extend(parent_args.game);
            let mut jvm = child_args.jvm;
            jvm.extend(parent_args.jvm);
            Some(ArgumentLists { game, jvm })
        }
        (child_args, parent_args) => child_args.or(parent_args),
    };

    merged
}

async fn fetch_text(client: &Client, url: &str) -> anyhow::Result<String> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP error {}: {}", response.status(), url);
    }
    Ok(response.text().await?)
}

async fn fetch_bytes(client: &Client, url: &str) -> anyhow::Result<Vec<u8>> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP error {}: {}", response.status(), url);
    }
    Ok(response.bytes().await?.to_vec())
}
