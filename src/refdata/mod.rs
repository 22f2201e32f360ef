pub mod ipsf;
pub mod opsf;
pub mod zip9;

use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::Error;
use crate::model::Provider;

/// Embedded store over the three time-indexed reference tables (IPSF/OPSF/ZIP9). Read-only after
/// load and safe for concurrent readers (§5) — `rusqlite`'s serialized mode handles that, since
/// all writers go through `load_*` before any reader is constructed.
pub struct ReferenceStore {
    conn: Connection,
}

impl ReferenceStore {
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create reference-store dir {}", parent.display()))?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("open reference store {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context("set WAL journal mode")?;
        ipsf::create_table(&conn).context("create ipsf table")?;
        opsf::create_table(&conn).context("create opsf table")?;
        zip9::create_table(&conn).context("create zip9 table")?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory reference store")?;
        ipsf::create_table(&conn)?;
        opsf::create_table(&conn)?;
        zip9::create_table(&conn)?;
        Ok(Self { conn })
    }

    pub fn load_ipsf_csv(&mut self, path: &Path) -> anyhow::Result<usize> {
        ipsf::load_csv(&mut self.conn, path)
    }

    pub fn load_opsf_csv(&mut self, path: &Path) -> anyhow::Result<usize> {
        opsf::load_csv(&mut self.conn, path)
    }

    pub fn load_zip9_csv(&mut self, path: &Path) -> anyhow::Result<usize> {
        zip9::load_csv(&mut self.conn, path)
    }

    pub fn find_ipsf(&self, provider: &Provider, as_of: NaiveDate) -> Result<ipsf::IpsfRow, Error> {
        ipsf::find(&self.conn, provider, as_of)
    }

    pub fn find_opsf(&self, provider: &Provider, as_of: NaiveDate) -> Result<opsf::OpsfRow, Error> {
        opsf::find(&self.conn, provider, as_of)
    }

    pub fn find_zip9(
        &self,
        zip5: &str,
        plus4: Option<&str>,
        as_of: NaiveDate,
    ) -> Result<zip9::Zip9Row, Error> {
        zip9::find(&self.conn, zip5, plus4, as_of)
    }
}
