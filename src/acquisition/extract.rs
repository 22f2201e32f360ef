use std::io::Read;
use std::path::Path;

use anyhow::{Context, anyhow};
use regex::Regex;

/// Recursively unpacks a ZIP archive, descending into any nested `.zip` entries, and extracts
/// every entry whose name matches `pattern` into `dest_dir` (§4.3, grounded on
/// `cms_downloader.py::process_zip_for_jars` and `site/backend/src/download.rs`'s zip usage).
/// Returns the extracted file names.
pub fn extract_matching(zip_path: &Path, pattern: &str, dest_dir: &Path) -> anyhow::Result<Vec<String>> {
    let re = Regex::new(pattern).with_context(|| format!("invalid artifact pattern: {pattern}"))?;
    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("create extraction dir {}", dest_dir.display()))?;

    let data = std::fs::read(zip_path).with_context(|| format!("read {}", zip_path.display()))?;
    let mut extracted = Vec::new();
    extract_matching_bytes(&data, &re, dest_dir, &mut extracted)?;
    Ok(extracted)
}

fn extract_matching_bytes(
    data: &[u8],
    re: &Regex,
    dest_dir: &Path,
    extracted: &mut Vec<String>,
) -> anyhow::Result<()> {
    let cursor = std::io::Cursor::new(data);
    let mut archive = zip::ZipArchive::new(cursor).context("read zip archive")?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if entry.is_dir() {
            continue;
        }

        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        drop(entry);

        if name.to_lowercase().ends_with(".zip") {
            extract_matching_bytes(&buf, re, dest_dir, extracted)?;
            continue;
        }

        let base_name = name.rsplit('/').next().unwrap_or(&name);
        if !re.is_match(base_name) {
            continue;
        }

        let out_path = unique_dest_path(dest_dir, base_name);
        std::fs::write(&out_path, &buf)
            .with_context(|| format!("write extracted artifact {}", out_path.display()))?;
        extracted.push(
            out_path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or(base_name)
                .to_string(),
        );
    }

    Ok(())
}

/// Avoids clobbering an artifact already placed by an earlier extraction pass: on collision the
/// new file is renamed with a numeric suffix (§4.3, loosely grounded on
/// `cms_downloader.py::process_zip_for_jars`'s prefix/timestamp collision handling, simplified
/// to a counter since this crate extracts once per missing artifact rather than in bulk).
fn unique_dest_path(dest_dir: &Path, base_name: &str) -> std::path::PathBuf {
    let candidate = dest_dir.join(base_name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match base_name.rsplit_once('.') {
        Some((s, e)) => (s, format!(".{e}")),
        None => (base_name, String::new()),
    };
    for n in 1.. {
        let candidate = dest_dir.join(format!("{stem}-{n}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("n is unbounded")
}

pub fn first_extraction_error(results: &[anyhow::Result<Vec<String>>]) -> Option<&anyhow::Error> {
    results.iter().find_map(|r| r.as_ref().err())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = std::io::Cursor::new(&mut buf);
            let mut writer = zip::ZipWriter::new(cursor);
            let options: zip::write::FileOptions<()> = zip::write::FileOptions::default();
            for (name, bytes) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(bytes).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn extracts_files_matching_pattern_and_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        let zip_bytes = build_zip(&[
            ("gov.agency.msdrg.v421.jar", b"jar-bytes"),
            ("readme.txt", b"ignore me"),
        ]);
        let zip_path = dir.path().join("bundle.zip");
        std::fs::write(&zip_path, &zip_bytes).unwrap();

        let extracted = extract_matching(&zip_path, r"^gov\.agency\.msdrg\.v\d+.*\.jar$", dir.path()).unwrap();
        assert_eq!(extracted, vec!["gov.agency.msdrg.v421.jar"]);
        assert!(dir.path().join("gov.agency.msdrg.v421.jar").exists());
        assert!(!dir.path().join("readme.txt").exists());
    }

    #[test]
    fn descends_into_nested_zip() {
        let dir = tempfile::tempdir().unwrap();
        let inner = build_zip(&[("gov.agency.ioce.v421.jar", b"inner-bytes")]);
        let outer = build_zip(&[("nested.zip", &inner)]);
        let zip_path = dir.path().join("outer.zip");
        std::fs::write(&zip_path, &outer).unwrap();

        let extracted = extract_matching(&zip_path, r"^gov\.agency\.ioce\.v\d+.*\.jar$", dir.path()).unwrap();
        assert_eq!(extracted, vec!["gov.agency.ioce.v421.jar"]);
    }
}
