//! Single-file download primitives with streaming, hash validation and
//! archive extraction.

use crate::game::config::DOWNLOAD_RETRIES;
use crate::store::part_path;
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::fs::create_dir_all;
use tokio::io::AsyncWriteExt;

// NOTE: Retry delay is a base value; backoff is linear (delay * attempt).
const RETRY_DELAY_MS: u64 = 1000;

/// Stream a URL to a path, reporting every chunk through `on_chunk`.
///
/// The payload is written to a `.part` sibling and renamed into place only
/// after the optional SHA1 check passes. Attempts that failed before any
/// chunk was reported are retried with linear backoff; once bytes have
/// been surfaced to the caller the error is propagated instead, so
/// progress accounting never double-counts.
pub async fn download_to_path<F>(
    client: &Client,
    url: &str,
    path: &Path,
    expected_sha1: Option<&str>,
    on_chunk: F,
) -> Result<()>
where
    F: Fn(u64) + Send + Sync,
{
    log::debug!("Downloading: {} -> {:?}", url, path);

    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let mut emitted: u64 = 0;
        match download_with_validation(client, url, path, expected_sha1, &on_chunk, &mut emitted)
            .await
        {
            Ok(()) => {
                log::debug!("Download complete: {:?}", path);
                return Ok(());
            }
            Err(e) if emitted == 0 && attempt < DOWNLOAD_RETRIES => {
                log::warn!(
                    "Download failed (attempt {}/{}): {}. Retrying...",
                    attempt,
                    DOWNLOAD_RETRIES,
                    e
                );
                tokio::time::sleep(std::time::Duration::from_millis(
                    RETRY_DELAY_MS * attempt as u64,
                ))
                .await;
            }
            Err(e) => {
                return Err(e).context(format!("Failed to download {}", url));
            }
        }
    }
}

async fn download_with_validation<F>(
    client: &Client,
    url: &str,
    path: &Path,
    expected_sha1: Option<&str>,
    on_chunk: &F,
    emitted: &mut u64,
) -> Result<()>
where
    F: Fn(u64) + Send + Sync,
{
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP error {}: {}", response.status(), url);
    }

    let tmp_path = part_path(path);
    let mut file = tokio::fs::File::create(&tmp_path).await?;
    let mut hasher = Sha1::new();

    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);

        *emitted += chunk.len() as u64;
        on_chunk(chunk.len() as u64);
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let Some(expected) = expected_sha1 {
        let computed = format!("{:x}", hasher.finalize());
        if !computed.eq_ignore_ascii_case(expected) {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            anyhow::bail!(
                "SHA1 mismatch for {}: expected {}, got {}",
                url,
                expected,
                computed
            );
        }
        log::debug!("SHA1 validated: {}", computed);
    }

    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Download JSON using an existing Client and deserialize.
pub async fn download_json_with_client<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
) -> Result<T> {
    log::debug!("Downloading JSON: {}", url);
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP error {}: {}", response.status(), url);
    }

    let data = response.json().await?;
    Ok(data)
}

/// Extract a zip archive to a directory.
pub fn extract_zip_sync(zip_bytes: &[u8], dest_dir: &Path) -> Result<()> {
    use std::io::Cursor;

    log::debug!("Extracting zip to: {:?}", dest_dir);
    std::fs::create_dir_all(dest_dir)?;

    let cursor = Cursor::new(zip_bytes);
    let mut archive = zip::ZipArchive::new(cursor)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let outpath = dest_dir.join(file.name());

        if file.name().ends_with('/') {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(p) = outpath.parent() {
                if !p.exists() {
                    std::fs::create_dir_all(p)?;
                }
            }
            let mut outfile = std::fs::File::create(&outpath)?;
            std::io::copy(&mut file, &mut outfile)?;
        }

        // Set permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
            }
        }
    }

    log::debug!("Zip extraction complete");
    Ok(())
}

/// Extract a tar.gz archive.
pub fn extract_tar_gz_sync(data: &[u8], dest: &Path) -> Result<()> {
    use flate2::read::GzDecoder;
    use std::io::Cursor;
    use tar::Archive;

    std::fs::create_dir_all(dest)?;

    let cursor = Cursor::new(data);
    let decoder = GzDecoder::new(cursor);
    let mut archive = Archive::new(decoder);
    archive.unpack(dest)?;

    Ok(())
}

/// Extract an archive file, picking the format from its URL or path suffix.
pub async fn extract_archive(archive_path: &Path, source_name: &str, dest: &Path) -> Result<()> {
    let bytes = tokio::fs::read(archive_path)
        .await
        .with_context(|| format!("Failed to read archive {:?}", archive_path))?;

    let dest = dest.to_path_buf();
    let source_name = source_name.to_string();
    let is_zip = source_name.ends_with(".zip");
    let is_tar_gz = source_name.ends_with(".tar.gz") || source_name.ends_with(".tgz");

    tokio::task::spawn_blocking(move || {
        if is_zip {
            extract_zip_sync(&bytes, &dest)
        } else if is_tar_gz {
            extract_tar_gz_sync(&bytes, &dest)
        } else {
            anyhow::bail!("Unsupported archive format: {}", source_name)
        }
    })
    .await?
}
