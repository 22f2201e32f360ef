use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Error;
use crate::model::Provider;

/// Outpatient provider table. Smaller than IPSF (§3): the fields OPPS/ESRD/FQHC pricers actually
/// read, plus carrier/locality which IPSF has no equivalent of.
pub const COLUMNS: &[(&str, &str)] = &[
    ("provider_ccn", "TEXT"),
    ("national_provider_identifier", "TEXT"),
    ("effective_date", "INTEGER"),
    ("termination_date", "INTEGER"),
    ("state_code", "TEXT"),
    ("county_code", "TEXT"),
    ("provider_type", "TEXT"),
    ("carrier", "TEXT"),
    ("locality", "TEXT"),
    ("cost_to_charge_ratio", "REAL"),
    ("wage_index", "REAL"),
];

const TERMINATION_SENTINEL: i64 = 20991231;

#[derive(Debug, Clone, Default)]
pub struct OpsfRow {
    pub provider_ccn: String,
    pub national_provider_identifier: String,
    pub effective_date: i64,
    pub termination_date: i64,
    pub state_code: String,
    pub county_code: String,
    pub carrier: String,
    pub locality: String,
    pub cost_to_charge_ratio: f64,
    pub wage_index: f64,
}

pub fn create_table(conn: &Connection) -> rusqlite::Result<()> {
    let columns = COLUMNS
        .iter()
        .map(|(name, ty)| format!("{name} {ty}"))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS opsf_data ({columns});
         CREATE INDEX IF NOT EXISTS idx_opsf_ccn ON opsf_data(provider_ccn, effective_date);
         CREATE INDEX IF NOT EXISTS idx_opsf_npi ON opsf_data(national_provider_identifier, effective_date);"
    ))
}

pub fn load_csv(conn: &mut Connection, path: &Path) -> anyhow::Result<usize> {
    use anyhow::Context;

    create_table(conn).context("create opsf_data table")?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;

    let placeholders = (1..=COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_sql = format!("INSERT INTO opsf_data VALUES ({placeholders})");

    let mut inserted = 0usize;
    let mut tx = conn.transaction().context("begin opsf load transaction")?;
    {
        let mut stmt = tx.prepare(&insert_sql)?;
        for (line_no, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("skipping malformed opsf row {line_no}: {e}");
                    continue;
                }
            };
            if record.len() != COLUMNS.len() {
                tracing::warn!(
                    "skipping opsf row {line_no}: expected {} columns, got {}",
                    COLUMNS.len(),
                    record.len()
                );
                continue;
            }
            let values: Vec<&str> = record.iter().collect();
            stmt.execute(rusqlite::params_from_iter(values.iter()))?;
            inserted += 1;
            if inserted % 1000 == 0 {
                tracing::debug!("opsf load: committed {inserted} rows so far");
            }
        }
    }
    tx.commit().context("commit opsf load transaction")?;
    Ok(inserted)
}

fn row_to_opsf(row: &rusqlite::Row) -> rusqlite::Result<OpsfRow> {
    let mut termination_date: i64 = row.get("termination_date")?;
    if termination_date == 19000101 || termination_date == 0 {
        termination_date = TERMINATION_SENTINEL;
    }
    Ok(OpsfRow {
        provider_ccn: row.get("provider_ccn")?,
        national_provider_identifier: row.get("national_provider_identifier")?,
        effective_date: row.get("effective_date")?,
        termination_date,
        state_code: row.get("state_code")?,
        county_code: row.get("county_code")?,
        carrier: row.get("carrier")?,
        locality: row.get("locality")?,
        cost_to_charge_ratio: row.get("cost_to_charge_ratio")?,
        wage_index: row.get("wage_index")?,
    })
}

pub fn find(conn: &Connection, provider: &Provider, as_of: NaiveDate) -> Result<OpsfRow, Error> {
    let as_of_int: i64 = as_of.format("%Y%m%d").to_string().parse().unwrap();

    let (column, key) = if !provider.other_id.is_empty() {
        ("provider_ccn", provider.other_id.as_str())
    } else if !provider.npi.is_empty() {
        ("national_provider_identifier", provider.npi.as_str())
    } else {
        return Err(Error::ReferenceNotFound {
            table: "opsf_data",
            key: "<missing ccn/npi>".into(),
            as_of: as_of.to_string(),
        });
    };

    let sql = format!(
        "SELECT * FROM opsf_data WHERE {column} = ?1 AND effective_date <= ?2 \
         AND (CASE WHEN termination_date IN (0, 19000101) THEN 20991231 ELSE termination_date END) >= ?2 \
         ORDER BY effective_date DESC LIMIT 1"
    );
    let mut stmt = conn
        .prepare(&sql)
        .expect("opsf lookup statement is static and always valid");
    let row = stmt
        .query_row(params![key, as_of_int], row_to_opsf)
        .optional()
        .unwrap_or(None);

    row.ok_or_else(|| Error::ReferenceNotFound {
        table: "opsf_data",
        key: key.to_string(),
        as_of: as_of.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_effective_row() {
        let conn = Connection::open_in_memory().unwrap();
        create_table(&conn).unwrap();
        conn.execute(
            "INSERT INTO opsf_data VALUES ('010001','', 20240101, 0, 'CA', '001', 'hospital', '01182', '00', 4.5, 1.02)",
            [],
        )
        .unwrap();

        let provider = Provider {
            other_id: "010001".into(),
            ..Default::default()
        };
        let row = find(&conn, &provider, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()).unwrap();
        assert_eq!(row.carrier, "01182");
        assert_eq!(row.termination_date, 20991231);
    }

    #[test]
    fn terminated_row_is_excluded_past_its_termination_date() {
        let conn = Connection::open_in_memory().unwrap();
        create_table(&conn).unwrap();
        conn.execute(
            "INSERT INTO opsf_data VALUES ('010002','', 20200101, 20211231, 'CA', '001', 'hospital', '01182', '00', 4.5, 1.02)",
            [],
        )
        .unwrap();

        let provider = Provider {
            other_id: "010002".into(),
            ..Default::default()
        };
        let err = find(&conn, &provider, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()).unwrap_err();
        assert!(matches!(err, Error::ReferenceNotFound { .. }));
    }
}
