use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::config::file_present_nonempty;

/// Streams a URL to disk via a `.part` temp file that is atomically renamed into place on
/// success, so a killed download never leaves a corrupt artifact behind (§4.3, grounded on
/// `site/backend/src/download.rs::ensure_download`).
pub async fn ensure_download(url: &str, dest: &Path, force: bool) -> anyhow::Result<()> {
    if !force && file_present_nonempty(dest) {
        return Ok(());
    }

    let tmp = tmp_path(dest);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    tracing::info!("downloading {} -> {}", url, dest.display());

    let client = reqwest::Client::new();
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;

    if !resp.status().is_success() {
        return Err(anyhow!("download failed ({}): {}", resp.status(), url));
    }

    let mut file = tokio::fs::File::create(&tmp)
        .await
        .with_context(|| format!("create {}", tmp.display()))?;

    let mut downloaded: u64 = 0;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("read body chunk from {url}"))?;
        downloaded += chunk.len() as u64;
        file.write_all(&chunk).await?;
        if downloaded % (50 * 1024 * 1024) < chunk.len() as u64 {
            tracing::info!("... downloaded {} MB", downloaded / (1024 * 1024));
        }
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, dest)
        .await
        .with_context(|| format!("rename {} -> {}", tmp.display(), dest.display()))?;

    Ok(())
}

/// Reuses an artifact already present on disk elsewhere (a prior run's output, a manually seeded
/// copy) instead of re-downloading it: hardlink, then symlink, then plain copy (§4.3, grounded
/// on `site/backend/src/download.rs::try_seed_from_repo_data`).
pub fn try_reuse_local(src: &Path, dest: &Path) -> anyhow::Result<bool> {
    if !file_present_nonempty(src) {
        return Ok(false);
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    if std::fs::hard_link(src, dest).is_ok() {
        tracing::info!("reused artifact via hardlink: {} -> {}", dest.display(), src.display());
        return Ok(true);
    }
    if symlink_file(src, dest).is_ok() {
        tracing::info!("reused artifact via symlink: {} -> {}", dest.display(), src.display());
        return Ok(true);
    }
    if std::fs::copy(src, dest).is_ok() {
        tracing::info!("reused artifact via copy: {} -> {}", dest.display(), src.display());
        return Ok(true);
    }
    Ok(false)
}

#[cfg(unix)]
fn symlink_file(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dest)
}

#[cfg(windows)]
fn symlink_file(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(src, dest)
}

fn tmp_path(dest: &Path) -> PathBuf {
    let fname = dest.file_name().and_then(|s| s.to_str()).unwrap_or("download");
    dest.with_file_name(format!("{fname}.part"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_via_hardlink_when_source_present() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.jar");
        std::fs::write(&src, b"jar-bytes").unwrap();
        let dest = dir.path().join("dest.jar");

        assert!(try_reuse_local(&src, &dest).unwrap());
        assert!(file_present_nonempty(&dest));
    }

    #[test]
    fn does_not_reuse_when_source_missing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("missing.jar");
        let dest = dir.path().join("dest.jar");
        assert!(!try_reuse_local(&src, &dest).unwrap());
    }
}
