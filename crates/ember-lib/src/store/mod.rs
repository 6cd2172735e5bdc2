//! On-disk artifact store rooted at a single base directory.
//!
//! The store is the durable source of truth: everything above it treats an
//! artifact as present only when the file exists AND its content hash
//! matches the declared one. Existence alone never counts, so partial or
//! corrupted downloads are re-fetched instead of trusted.

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Layout under the base directory:
///
/// ```text
/// versions/<id>/<id>.json|.jar     descriptors and client archives
/// versions/<id>/natives/           extracted native classifiers
/// libraries/<mavenPath>            library artifacts
/// assets/indexes/<assetsId>.json   asset index documents
/// assets/objects/<hh>/<hash>       content-addressed asset objects
/// runtime/<major>/...              installed managed runtimes
/// profiles/<id>/...                profile working directories
/// profiles_data/<id>.zip           downloaded profile bundles
/// ```
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_json_path(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id).join(format!("{}.json", id))
    }

    pub fn version_jar_path(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id).join(format!("{}.jar", id))
    }

    pub fn natives_dir(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id).join("natives")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    pub fn library_path(&self, maven_path: &str) -> PathBuf {
        self.libraries_dir().join(maven_path)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn asset_index_path(&self, assets_id: &str) -> PathBuf {
        self.assets_dir()
            .join("indexes")
            .join(format!("{}.json", assets_id))
    }

    /// Content-addressed object path: the first two hex characters of the
    /// hash shard the directory, the full hash is the filename.
    pub fn asset_object_path(&self, hash: &str) -> PathBuf {
        self.assets_dir()
            .join("objects")
            .join(&hash[0..2])
            .join(hash)
    }

    pub fn runtime_dir(&self, major: u32) -> PathBuf {
        self.root.join("runtime").join(major.to_string())
    }

    pub fn runtime_state_path(&self, major: u32) -> PathBuf {
        self.runtime_dir(major).join("version.json")
    }

    pub fn profile_dir(&self, id: &str) -> PathBuf {
        self.root.join("profiles").join(id)
    }

    pub fn profile_bundle_path(&self, id: &str) -> PathBuf {
        self.root.join("profiles_data").join(format!("{}.zip", id))
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.versions_dir().join("catalog.json")
    }

    pub fn profile_catalog_path(&self) -> PathBuf {
        self.root.join("profiles").join("profiles.json")
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Hex-lowercase SHA1 of a file's content. Fails when unreadable.
    pub async fn content_hash(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {:?} for hashing", path))?;
        let mut hasher = Sha1::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// The verification contract: present iff the file exists and its
    /// content hash equals the declared one. An unreadable file counts as
    /// absent so the caller re-downloads it.
    pub async fn verify(&self, path: &Path, expected_sha1: &str) -> bool {
        if !path.exists() {
            return false;
        }
        match self.content_hash(path).await {
            Ok(actual) => actual.eq_ignore_ascii_case(expected_sha1),
            Err(e) => {
                log::warn!("Failed to hash existing file {:?}: {}", path, e);
                false
            }
        }
    }

    /// Write bytes through a `.part` sibling, then rename into place. The
    /// destination either holds the full content or its previous state.
    pub async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create parent of {:?}", path))?;
        }

        let tmp_path = part_path(path);
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .with_context(|| format!("Failed to create {:?}", tmp_path))?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, path)
            .await
            .with_context(|| format!("Failed to move {:?} into place", tmp_path))?;
        Ok(())
    }

    /// Replace `target` with the contents of `staged`. The old target is
    /// removed first, then the staged directory is renamed in; a crash in
    /// between leaves the target transiently absent, which is acceptable
    /// for a cache rebuildable from the network.
    pub async fn install_directory_atomic(&self, staged: &Path, target: &Path) -> Result<()> {
        if target.exists() {
            tokio::fs::remove_dir_all(target)
                .await
                .with_context(|| format!("Failed to remove old install at {:?}", target))?;
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create parent of {:?}", target))?;
        }

        let staged = staged.to_path_buf();
        let target_owned = target.to_path_buf();
        tokio::task::spawn_blocking(move || move_dir(&staged, &target_owned)).await??;
        Ok(())
    }

    pub async fn read_to_string(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))
    }
}

/// `.part` sibling used for in-flight writes.
pub fn part_path(path: &Path) -> PathBuf {
    let tmp_name = format!(
        "{}.part",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
    );
    path.with_file_name(tmp_name)
}

fn move_dir(src: &Path, dest: &Path) -> Result<()> {
    match std::fs::rename(src, dest) {
        Ok(_) => Ok(()),
        Err(err) if is_cross_device_link(&err) => {
            copy_dir_recursive(src, dest)?;
            std::fs::remove_dir_all(src)
                .with_context(|| format!("Remove source dir {:?}", src))?;
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("Move dir {:?} -> {:?}", src, dest)),
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest).with_context(|| format!("Create copy dest {:?}", dest))?;
    for entry in std::fs::read_dir(src).with_context(|| format!("Read dir {:?}", src))? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target_path = dest.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &target_path)?;
        } else {
            std::fs::copy(entry.path(), &target_path)
                .with_context(|| format!("Copy file {:?} -> {:?}", entry.path(), target_path))?;
        }
    }
    Ok(())
}

fn is_cross_device_link(err: &std::io::Error) -> bool {
    #[cfg(target_family = "unix")]
    {
        // EXDEV; checked by raw value as well since CrossDeviceLink does not
        // resolve on every toolchain.
        err.kind() == std::io::ErrorKind::CrossesDevices || err.raw_os_error() == Some(18)
    }

    #[cfg(not(target_family = "unix"))]
    {
        let _ = err;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_atomic_then_verify() {
        let tmp = tempdir().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());

        let path = tmp.path().join("sub").join("file.bin");
        store.write_atomic(&path, b"hello world").await.unwrap();

        // SHA1 of "hello world"
        let expected = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
        assert!(store.verify(&path, expected).await);
        assert!(store.verify(&path, &expected.to_uppercase()).await);
        assert!(!store.verify(&path, "0000000000000000000000000000000000000000").await);

        // No .part leftovers
        assert!(!part_path(&path).exists());
    }

    #[tokio::test]
    async fn verify_missing_file_is_absent() {
        let tmp = tempdir().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());
        let path = tmp.path().join("nope.bin");
        assert!(!store.verify(&path, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed").await);
    }

    #[tokio::test]
    async fn install_directory_atomic_replaces_target() {
        let tmp = tempdir().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());

        let staged = tmp.path().join("staged");
        std::fs::create_dir_all(staged.join("bin")).unwrap();
        std::fs::write(staged.join("bin").join("tool"), b"new").unwrap();

        let target = tmp.path().join("installs").join("current");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale"), b"old").unwrap();

        store.install_directory_atomic(&staged, &target).await.unwrap();

        assert!(!staged.exists());
        assert!(!target.join("stale").exists());
        assert_eq!(std::fs::read(target.join("bin").join("tool")).unwrap(), b"new");
    }

    #[test]
    fn asset_object_path_is_sharded_by_hash_prefix() {
        let store = LocalStore::new(PathBuf::from("/data"));
        let path = store.asset_object_path("abcd1234ffff");
        assert_eq!(path, PathBuf::from("/data/assets/objects/ab/abcd1234ffff"));
    }
}
