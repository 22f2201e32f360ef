use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Error;

pub const COLUMNS: &[(&str, &str)] = &[
    ("zip5", "TEXT"),
    ("plus4", "TEXT"),
    ("carrier", "TEXT"),
    ("locality", "TEXT"),
    ("effective_date", "INTEGER"),
    ("end_date", "INTEGER"),
];

#[derive(Debug, Clone, Default)]
pub struct Zip9Row {
    pub zip5: String,
    pub plus4: String,
    pub carrier: String,
    pub locality: String,
    pub effective_date: i64,
    pub end_date: i64,
}

pub fn create_table(conn: &Connection) -> rusqlite::Result<()> {
    let columns = COLUMNS
        .iter()
        .map(|(name, ty)| format!("{name} {ty}"))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS zip9_data ({columns});
         CREATE INDEX IF NOT EXISTS idx_zip9_lookup ON zip9_data(zip5, plus4, effective_date);"
    ))
}

pub fn load_csv(conn: &mut Connection, path: &Path) -> anyhow::Result<usize> {
    use anyhow::Context;

    create_table(conn).context("create zip9_data table")?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;

    let placeholders = (1..=COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_sql = format!("INSERT INTO zip9_data VALUES ({placeholders})");

    let mut inserted = 0usize;
    let mut tx = conn.transaction().context("begin zip9 load transaction")?;
    {
        let mut stmt = tx.prepare(&insert_sql)?;
        for (line_no, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("skipping malformed zip9 row {line_no}: {e}");
                    continue;
                }
            };
            if record.len() != COLUMNS.len() {
                tracing::warn!(
                    "skipping zip9 row {line_no}: expected {} columns, got {}",
                    COLUMNS.len(),
                    record.len()
                );
                continue;
            }
            let values: Vec<&str> = record.iter().collect();
            stmt.execute(rusqlite::params_from_iter(values.iter()))?;
            inserted += 1;
            if inserted % 1000 == 0 {
                tracing::debug!("zip9 load: committed {inserted} rows so far");
            }
        }
    }
    tx.commit().context("commit zip9 load transaction")?;
    Ok(inserted)
}

fn row_to_zip9(row: &rusqlite::Row) -> rusqlite::Result<Zip9Row> {
    Ok(Zip9Row {
        zip5: row.get("zip5")?,
        plus4: row.get("plus4")?,
        carrier: row.get("carrier")?,
        locality: row.get("locality")?,
        effective_date: row.get("effective_date")?,
        end_date: row.get("end_date")?,
    })
}

/// Prefers an exact plus4 match; falls back to the blank-plus4 row when no plus4-specific row
/// matches (§4.6, FQHC/OPPS/ESRD carrier-locality resolution).
pub fn find(
    conn: &Connection,
    zip5: &str,
    plus4: Option<&str>,
    as_of: NaiveDate,
) -> Result<Zip9Row, Error> {
    let as_of_int: i64 = as_of.format("%Y%m%d").to_string().parse().unwrap();

    if let Some(plus4) = plus4.filter(|p| !p.is_empty()) {
        let mut stmt = conn
            .prepare(
                "SELECT * FROM zip9_data WHERE zip5 = ?1 AND plus4 = ?2 AND effective_date <= ?3 \
                 AND (CASE WHEN end_date IN (0, 19000101) THEN 20991231 ELSE end_date END) >= ?3 \
                 ORDER BY effective_date DESC LIMIT 1",
            )
            .expect("zip9 plus4 lookup statement is static and always valid");
        if let Some(row) = stmt
            .query_row(params![zip5, plus4, as_of_int], row_to_zip9)
            .optional()
            .unwrap_or(None)
        {
            return Ok(row);
        }
    }

    let mut stmt = conn
        .prepare(
            "SELECT * FROM zip9_data WHERE zip5 = ?1 AND (plus4 = '' OR plus4 IS NULL) \
             AND effective_date <= ?2 \
             AND (CASE WHEN end_date IN (0, 19000101) THEN 20991231 ELSE end_date END) >= ?2 \
             ORDER BY effective_date DESC LIMIT 1",
        )
        .expect("zip9 blank-plus4 lookup statement is static and always valid");
    stmt.query_row(params![zip5, as_of_int], row_to_zip9)
        .optional()
        .unwrap_or(None)
        .ok_or_else(|| Error::ReferenceNotFound {
            table: "zip9_data",
            key: format!("{zip5}{}", plus4.unwrap_or("")),
            as_of: as_of.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_specific_plus4_over_blank_fallback() {
        let conn = Connection::open_in_memory().unwrap();
        create_table(&conn).unwrap();
        conn.execute(
            "INSERT INTO zip9_data VALUES ('94110', '', '01182', '00', 20240101, 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO zip9_data VALUES ('94110', '1234', '01182', '05', 20240101, 0)",
            [],
        )
        .unwrap();

        let specific = find(&conn, "94110", Some("1234"), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()).unwrap();
        assert_eq!(specific.locality, "05");

        let fallback = find(&conn, "94110", Some("9999"), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()).unwrap();
        assert_eq!(fallback.locality, "00");
    }

    #[test]
    fn terminated_row_is_excluded_past_its_end_date() {
        let conn = Connection::open_in_memory().unwrap();
        create_table(&conn).unwrap();
        conn.execute(
            "INSERT INTO zip9_data VALUES ('94110', '', '01182', '00', 20200101, 20211231)",
            [],
        )
        .unwrap();

        let err = find(&conn, "94110", None, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()).unwrap_err();
        assert!(matches!(err, Error::ReferenceNotFound { .. }));
    }
}
