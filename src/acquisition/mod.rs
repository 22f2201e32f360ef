pub mod download;
pub mod extract;
pub mod license;
pub mod registry;

use std::path::PathBuf;

use anyhow::{Context, anyhow};

use crate::config::StoragePaths;
pub use registry::{ArtifactSource, RequiredArtifact, required_artifacts};

#[derive(Debug, Clone)]
pub struct ArtifactStatus {
    pub artifact: RequiredArtifact,
    pub present: bool,
}

/// Reports, for every required artifact, whether a file matching it already exists under
/// `paths.jars_dir` (§4.3).
pub fn inventory(paths: &StoragePaths) -> Vec<ArtifactStatus> {
    required_artifacts()
        .into_iter()
        .map(|artifact| {
            let present = artifact_present(paths, &artifact);
            ArtifactStatus { artifact, present }
        })
        .collect()
}

fn artifact_present(paths: &StoragePaths, artifact: &RequiredArtifact) -> bool {
    let re = regex::Regex::new(artifact.file_pattern).ok();
    let dir = match artifact.component {
        "msdrg" | "ioce" => &paths.pricers_dir,
        _ => &paths.jars_dir,
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        match &re {
            Some(re) => re.is_match(&name),
            None => name == artifact.file_pattern,
        }
    })
}

pub fn missing(paths: &StoragePaths) -> Vec<RequiredArtifact> {
    inventory(paths)
        .into_iter()
        .filter(|s| !s.present)
        .map(|s| s.artifact)
        .collect()
}

/// Fetches every missing artifact independently, logging and continuing past individual
/// failures so one bad download never blocks the rest (§4.3 failure policy). With
/// `force = true`, every artifact is re-fetched regardless of current presence.
pub async fn acquire(paths: &StoragePaths, force: bool) -> anyhow::Result<Vec<String>> {
    paths.ensure_dirs().context("create acquisition directories")?;

    let targets = if force {
        required_artifacts()
    } else {
        missing(paths)
    };

    let mut failures = Vec::new();
    for artifact in targets {
        if let Err(e) = acquire_one(paths, &artifact, force).await {
            tracing::error!("failed to acquire artifact {}: {e:#}", artifact.file_pattern);
            failures.push(format!("{}: {e}", artifact.file_pattern));
        }
    }
    Ok(failures)
}

async fn acquire_one(paths: &StoragePaths, artifact: &RequiredArtifact, force: bool) -> anyhow::Result<()> {
    let dest_dir = match artifact.component {
        "msdrg" | "ioce" => &paths.pricers_dir,
        _ => &paths.jars_dir,
    };

    match &artifact.source {
        ArtifactSource::DirectUrl(url) => {
            let dest: PathBuf = dest_dir.join(artifact.file_pattern);
            download::ensure_download(url, &dest, force).await
        }
        ArtifactSource::ScrapedPage {
            page_url,
            link_pattern,
            requires_license_agreement,
        } => {
            acquire_scraped_bundle(
                paths,
                page_url,
                link_pattern,
                *requires_license_agreement,
                artifact.file_pattern,
                dest_dir,
            )
            .await
        }
    }
}

async fn acquire_scraped_bundle(
    paths: &StoragePaths,
    page_url: &str,
    link_pattern: &str,
    requires_license_agreement: bool,
    artifact_pattern: &str,
    dest_dir: &std::path::Path,
) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .default_headers(license::user_agent_headers())
        .build()
        .context("build acquisition http client")?;

    let page_html = client
        .get(page_url)
        .send()
        .await
        .with_context(|| format!("GET {page_url}"))?
        .text()
        .await
        .context("read landing page body")?;

    let bundle_url = license::find_bundle_link(&page_html, page_url, link_pattern)?;

    let bundle_url = if requires_license_agreement {
        let license_html = client
            .get(&bundle_url)
            .send()
            .await
            .with_context(|| format!("GET license page {bundle_url}"))?
            .text()
            .await
            .context("read license page body")?;
        let (form_url, form_fields) = license::parse_license_form(&license_html, &bundle_url)?;
        let resp = client
            .post(&form_url)
            .form(&form_fields)
            .send()
            .await
            .with_context(|| format!("POST license form to {form_url}"))?;
        if !resp.status().is_success() {
            return Err(anyhow!("license form submission failed: {}", resp.status()));
        }
        form_url
    } else {
        bundle_url
    };

    let zip_dest = paths.downloads_dir.join(format!(
        "{}.zip",
        artifact_pattern.trim_start_matches('^').trim_end_matches('$')
    ));
    download::ensure_download(&bundle_url, &zip_dest, true).await?;
    extract::extract_matching(&zip_dest, artifact_pattern, dest_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_reports_all_missing_on_clean_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StoragePaths::new(dir.path());
        paths.ensure_dirs().unwrap();

        let statuses = inventory(&paths);
        assert_eq!(statuses.len(), required_artifacts().len());
        assert!(statuses.iter().all(|s| !s.present));
        assert_eq!(missing(&paths).len(), required_artifacts().len());
    }

    #[test]
    fn inventory_skips_artifacts_already_present() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StoragePaths::new(dir.path());
        paths.ensure_dirs().unwrap();
        std::fs::write(paths.jars_dir.join("gfc-base-api-3.4.9.jar"), b"x").unwrap();

        let remaining = missing(&paths);
        assert!(remaining.iter().all(|a| a.file_pattern != "gfc-base-api-3.4.9.jar"));
    }
}
