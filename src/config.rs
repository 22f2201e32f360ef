use std::path::{Path, PathBuf};

/// Directory layout for one installation, grounded on the teacher's `StoragePaths`.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub downloads_dir: PathBuf,
    pub jars_dir: PathBuf,
    pub pricers_dir: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

impl StoragePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let jars_dir = root.join("jars");
        let data_dir = root.join("data");
        Self {
            downloads_dir: root.join("downloads"),
            pricers_dir: jars_dir.join("pricers"),
            db_path: data_dir.join("refdata.sqlite"),
            jars_dir,
            data_dir,
        }
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.downloads_dir)?;
        std::fs::create_dir_all(&self.jars_dir)?;
        std::fs::create_dir_all(&self.pricers_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

pub fn file_present_nonempty(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(m) => m.is_file() && m.len() > 0,
        Err(_) => false,
    }
}

/// Tunables threaded through the reference store, acquisition subsystem, and version dispatcher.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub paths: StoragePaths,
    pub http_connect_timeout_secs: u64,
    pub http_read_timeout_secs: u64,
    pub acquisition_retry_budget: u32,
    /// Number of fiscal years a pricer keeps loaded: current plus this many prior.
    pub pricer_supported_years: u32,
    pub reconfigure_retry_attempts: u32,
    pub reconfigure_retry_backoff_ms: u64,
}

impl OrchestratorConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: StoragePaths::new(root),
            http_connect_timeout_secs: 10,
            http_read_timeout_secs: 60,
            acquisition_retry_budget: 3,
            pricer_supported_years: 4,
            reconfigure_retry_attempts: 10,
            reconfigure_retry_backoff_ms: 10,
        }
    }
}
