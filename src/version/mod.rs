//! Fiscal-year version dispatch for the DRG grouper and date-window selection for pricers (C5).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{Datelike, NaiveDate};

use crate::error::Error;

pub const MSDRG_VSTART: &str = "400";

/// `v = calendar_year(date) - 1983`, then: month >= 10 -> (v+1) with suffix "0"; month in
/// 4..=9 -> v with suffix "1"; month <= 3 -> (v-1) with suffix "0" (§4.5).
pub fn drg_version_for_date(date: NaiveDate) -> String {
    let v = date.year() - 1983;
    if date.month() >= 10 {
        format!("{}0", v + 1)
    } else if date.month() > 3 {
        format!("{v}1")
    } else {
        format!("{}0", v - 1)
    }
}

/// "Trailing 1 -> +9, trailing 0 -> +1" loader progression: 400, 410, 420, 421, 431, ... (§4.5).
pub fn increment_version(version: &str) -> String {
    if version.ends_with('1') {
        (version.parse::<i32>().unwrap_or(0) + 9).to_string()
    } else if version.ends_with('0') {
        (version.parse::<i32>().unwrap_or(0) + 1).to_string()
    } else {
        version.to_string()
    }
}

pub fn end_version_for_date(date: NaiveDate) -> String {
    drg_version_for_date(date)
}

/// Which loaded variant a claim should route to: DRG groupers keep one "exempt" and one
/// "non-exempt" instance loaded per version (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoaVariant {
    Exempt,
    NonExempt,
}

/// Tracks which DRG versions have been loaded and serializes per-claim reconfiguration so it
/// never interleaves with a `process` call on the same version (§5). The lock is a
/// `std::sync::Mutex` (not `tokio::sync`): DRG processing runs on worker threads, not async
/// tasks — only the acquisition subsystem is async.
pub struct DrgVersionTable {
    loaded: RwLock<BTreeMap<String, ()>>,
    reconfigure_lock: Arc<Mutex<()>>,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl DrgVersionTable {
    pub fn new(retry_attempts: u32, retry_backoff_ms: u64) -> Self {
        Self {
            loaded: RwLock::new(BTreeMap::new()),
            reconfigure_lock: Arc::new(Mutex::new(())),
            retry_attempts,
            retry_backoff: Duration::from_millis(retry_backoff_ms),
        }
    }

    pub fn mark_loaded(&self, version: &str) {
        self.loaded
            .write()
            .expect("version table lock poisoned")
            .insert(version.to_string(), ());
    }

    pub fn is_loaded(&self, version: &str) -> bool {
        self.loaded
            .read()
            .expect("version table lock poisoned")
            .contains_key(version)
    }

    /// Every version string the loader would attempt starting from `MSDRG_VSTART` up to and
    /// including the end-version implied by `as_of` (§4.5 loader rule).
    pub fn versions_through(as_of: NaiveDate) -> Vec<String> {
        let end = end_version_for_date(as_of);
        let mut out = Vec::new();
        let mut cur = MSDRG_VSTART.to_string();
        loop {
            out.push(cur.clone());
            if cur == end {
                break;
            }
            let next = increment_version(&cur);
            if next.parse::<i32>().unwrap_or(0) > end.parse::<i32>().unwrap_or(0) {
                break;
            }
            cur = next;
        }
        out
    }

    pub fn resolve(&self, as_of: NaiveDate, module: &str) -> Result<String, Error> {
        let version = drg_version_for_date(as_of);
        if self.is_loaded(&version) {
            Ok(version)
        } else {
            Err(Error::VersionUnavailable {
                module: module.to_string(),
                as_of: as_of.to_string(),
            })
        }
    }

    /// Runs `f` while holding the reconfiguration lock, retrying up to the configured budget
    /// before giving up with `EngineBusy` (§5).
    pub fn with_reconfigure_lock<T>(
        &self,
        engine: &str,
        f: impl FnOnce() -> T,
    ) -> Result<T, Error> {
        for attempt in 0..self.retry_attempts {
            if let Ok(guard) = self.reconfigure_lock.try_lock() {
                let result = f();
                drop(guard);
                return Ok(result);
            }
            if attempt + 1 < self.retry_attempts {
                std::thread::sleep(self.retry_backoff);
            }
        }
        Err(Error::EngineBusy {
            engine: engine.to_string(),
        })
    }
}

/// Pricer window: current fiscal year plus the `n - 1` prior (§4.5, default `n = 4`).
pub fn pricer_supported_years(as_of: NaiveDate, n: u32) -> Vec<i32> {
    let current = as_of.year();
    ((current - (n as i32 - 1))..=current).rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_examples_match() {
        assert_eq!(
            drg_version_for_date(NaiveDate::from_ymd_opt(2025, 7, 30).unwrap()),
            "421"
        );
        assert_eq!(
            drg_version_for_date(NaiveDate::from_ymd_opt(2024, 11, 1).unwrap()),
            "420"
        );
        assert_eq!(
            drg_version_for_date(NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()),
            "420"
        );
        assert_eq!(
            drg_version_for_date(NaiveDate::from_ymd_opt(2024, 9, 30).unwrap()),
            "411"
        );
        assert_eq!(
            drg_version_for_date(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()),
            "400"
        );
        assert_eq!(
            drg_version_for_date(NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()),
            "400"
        );
    }

    #[test]
    fn increment_sequence_matches_loader_rule() {
        let seq = [
            "400", "401", "410", "411", "420", "421", "430", "431",
        ];
        let mut cur = "400".to_string();
        for expected in &seq {
            assert_eq!(&cur, expected);
            cur = increment_version(&cur);
        }
    }

    #[test]
    fn reconfigure_lock_serializes_and_reports_busy_on_contention() {
        let table = DrgVersionTable::new(2, 1);
        let lock = table.reconfigure_lock.clone();
        let guard = lock.lock().unwrap();
        let result = table.with_reconfigure_lock("msdrg", || 1);
        assert!(matches!(result, Err(Error::EngineBusy { .. })));
        drop(guard);
        let result = table.with_reconfigure_lock("msdrg", || 42);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn pricer_window_defaults_to_four_years() {
        let years = pricer_supported_years(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), 4);
        assert_eq!(years, vec![2025, 2024, 2023, 2022]);
    }
}
