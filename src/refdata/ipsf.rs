use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Error;
use crate::model::Provider;

/// Column name, SQL storage type, and position in the upstream export — the same catalogue the
/// loader and the lookup both key off of (§3).
pub const COLUMNS: &[(&str, &str)] = &[
    ("provider_ccn", "TEXT"),
    ("effective_date", "INTEGER"),
    ("fiscal_year_begin_date", "INTEGER"),
    ("export_date", "INTEGER"),
    ("termination_date", "INTEGER"),
    ("waiver_indicator", "TEXT"),
    ("intermediary_number", "TEXT"),
    ("provider_type", "TEXT"),
    ("census_division", "TEXT"),
    ("msa_actual_geographic_location", "TEXT"),
    ("msa_wage_index_location", "TEXT"),
    ("msa_standardized_amount_location", "TEXT"),
    ("sole_community_or_medicare_dependent_hospital_base_year", "TEXT"),
    ("change_code_for_lugar_reclassification", "TEXT"),
    ("temporary_relief_indicator", "TEXT"),
    ("federal_pps_blend", "TEXT"),
    ("state_code", "TEXT"),
    ("pps_facility_specific_rate", "REAL"),
    ("cost_of_living_adjustment", "REAL"),
    ("interns_to_beds_ratio", "REAL"),
    ("bed_size", "INTEGER"),
    ("operating_cost_to_charge_ratio", "REAL"),
    ("case_mix_index", "REAL"),
    ("supplemental_security_income_ratio", "REAL"),
    ("medicaid_ratio", "REAL"),
    ("special_provider_update_factor", "REAL"),
    ("operating_dsh", "REAL"),
    ("fiscal_year_end_date", "INTEGER"),
    ("special_payment_indicator", "TEXT"),
    ("hosp_quality_indicator", "TEXT"),
    ("cbsa_actual_geographic_location", "TEXT"),
    ("cbsa_wi_location", "TEXT"),
    ("cbsa_standardized_amount_location", "TEXT"),
    ("special_wage_index", "REAL"),
    ("pass_through_amount_for_capital", "REAL"),
    ("pass_through_amount_for_direct_medical_education", "REAL"),
    ("pass_through_amount_for_organ_acquisition", "REAL"),
    ("pass_through_total_amount", "REAL"),
    ("capital_pps_payment_code", "TEXT"),
    ("hospital_specific_capital_rate", "REAL"),
    ("old_capital_hold_harmless_rate", "REAL"),
    ("old_capital_hold_harmless_rate_effective_date", "TEXT"),
    ("capital_cost_to_charge_ratio", "REAL"),
    ("new_hospital", "TEXT"),
    ("capital_indirect_medical_education_ratio", "REAL"),
    ("capital_exception_payment_rate", "REAL"),
    ("vpb_participant_indicator", "TEXT"),
    ("vbp_adjustment", "REAL"),
    ("hrr_participant_indicator", "INTEGER"),
    ("hrr_adjustment", "REAL"),
    ("bundle_model_discount", "REAL"),
    ("hac_reduction_participant_indicator", "TEXT"),
    ("uncompensated_care_amount", "REAL"),
    ("ehr_reduction_indicator", "TEXT"),
    ("low_volume_adjustment_factor", "REAL"),
    ("county_code", "TEXT"),
    ("medicare_performance_adjustment", "REAL"),
    ("ltch_dpp_indicator", "TEXT"),
    ("supplemental_wage_index", "REAL"),
    ("supplemental_wage_index_indicator", "TEXT"),
    ("change_code_wage_index_reclassification", "TEXT"),
    ("national_provider_identifier", "TEXT"),
    ("pass_through_amount_for_allogenic_stem_cell_acquisition", "REAL"),
    ("pps_blend_year_indicator", "TEXT"),
    ("last_updated", "TEXT"),
    ("pass_through_amount_for_direct_graduate_medical_education", "REAL"),
    ("pass_through_amount_for_kidney_acquisition", "REAL"),
    ("pass_through_amount_for_supply_chain", "REAL"),
];

/// Blank/zero terminations are normalized to this sentinel at read time (§3).
const TERMINATION_SENTINEL: i64 = 20991231;

#[derive(Debug, Clone, Default)]
pub struct IpsfRow {
    pub provider_ccn: String,
    pub effective_date: i64,
    pub termination_date: i64,
    pub national_provider_identifier: String,
    pub state_code: String,
    pub operating_cost_to_charge_ratio: f64,
    pub case_mix_index: f64,
    pub wage_index_location: String,
    pub pps_facility_specific_rate: f64,
    pub bed_size: i64,
    /// Every other column, for callers that need a field this struct does not surface by name.
    pub raw: std::collections::HashMap<String, String>,
}

pub fn create_table(conn: &Connection) -> rusqlite::Result<()> {
    let columns = COLUMNS
        .iter()
        .map(|(name, ty)| format!("{name} {ty}"))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS ipsf_data ({columns});
         CREATE INDEX IF NOT EXISTS idx_ipsf_ccn ON ipsf_data(provider_ccn, effective_date);
         CREATE INDEX IF NOT EXISTS idx_ipsf_npi ON ipsf_data(national_provider_identifier, effective_date);"
    ))
}

/// Loads a CSV export (header row first) in batches of 1000, skipping malformed lines rather
/// than failing the whole load (§4.2).
pub fn load_csv(conn: &mut Connection, path: &Path) -> anyhow::Result<usize> {
    use anyhow::Context;

    create_table(conn).context("create ipsf_data table")?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;

    let placeholders = (1..=COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_sql = format!("INSERT INTO ipsf_data VALUES ({placeholders})");

    let mut inserted = 0usize;
    let mut tx = conn.transaction().context("begin ipsf load transaction")?;
    {
        let mut stmt = tx.prepare(&insert_sql)?;
        for (line_no, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("skipping malformed ipsf row {line_no}: {e}");
                    continue;
                }
            };
            if record.len() != COLUMNS.len() {
                tracing::warn!(
                    "skipping ipsf row {line_no}: expected {} columns, got {}",
                    COLUMNS.len(),
                    record.len()
                );
                continue;
            }
            let values: Vec<&str> = record.iter().collect();
            stmt.execute(rusqlite::params_from_iter(values.iter()))?;
            inserted += 1;
            if inserted % 1000 == 0 {
                tracing::debug!("ipsf load: committed {inserted} rows so far");
            }
        }
    }
    tx.commit().context("commit ipsf load transaction")?;
    Ok(inserted)
}

fn row_to_ipsf(row: &rusqlite::Row) -> rusqlite::Result<IpsfRow> {
    let mut raw = std::collections::HashMap::new();
    for (i, (name, ty)) in COLUMNS.iter().enumerate() {
        let text: String = if *ty == "TEXT" {
            row.get::<_, Option<String>>(i)?.unwrap_or_default()
        } else {
            row.get::<_, Option<f64>>(i)?
                .map(|v| v.to_string())
                .unwrap_or_default()
        };
        raw.insert((*name).to_string(), text);
    }

    let mut termination_date: i64 = row.get("termination_date")?;
    if termination_date == 19000101 || termination_date == 0 {
        termination_date = TERMINATION_SENTINEL;
    }

    Ok(IpsfRow {
        provider_ccn: row.get("provider_ccn")?,
        effective_date: row.get("effective_date")?,
        termination_date,
        national_provider_identifier: row.get("national_provider_identifier")?,
        state_code: row.get("state_code")?,
        operating_cost_to_charge_ratio: row.get("operating_cost_to_charge_ratio")?,
        case_mix_index: row.get("case_mix_index")?,
        wage_index_location: row.get("msa_wage_index_location")?,
        pps_facility_specific_rate: row.get("pps_facility_specific_rate")?,
        bed_size: row.get("bed_size")?,
        raw,
    })
}

/// Effective-row lookup: highest `effective_date <= as_of` for the provider's CCN (preferred)
/// or NPI (§4.2).
pub fn find(conn: &Connection, provider: &Provider, as_of: NaiveDate) -> Result<IpsfRow, Error> {
    let as_of_int: i64 = as_of.format("%Y%m%d").to_string().parse().unwrap();

    let (column, key) = if !provider.other_id.is_empty() {
        ("provider_ccn", provider.other_id.as_str())
    } else if !provider.npi.is_empty() {
        ("national_provider_identifier", provider.npi.as_str())
    } else {
        return Err(Error::ReferenceNotFound {
            table: "ipsf_data",
            key: "<missing ccn/npi>".into(),
            as_of: as_of.to_string(),
        });
    };

    let sql = format!(
        "SELECT * FROM ipsf_data WHERE {column} = ?1 AND effective_date <= ?2 \
         AND (CASE WHEN termination_date IN (0, 19000101) THEN 20991231 ELSE termination_date END) >= ?2 \
         ORDER BY effective_date DESC LIMIT 1"
    );
    let mut stmt = conn
        .prepare(&sql)
        .expect("ipsf lookup statement is static and always valid");
    let row = stmt
        .query_row(params![key, as_of_int], row_to_ipsf)
        .optional()
        .unwrap_or(None);

    row.ok_or_else(|| Error::ReferenceNotFound {
        table: "ipsf_data",
        key: key.to_string(),
        as_of: as_of.to_string(),
    })
}
