use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::codec::opt_date;

/// Present-on-admission indicator, the closed set a claim's diagnosis codes are validated
/// against (§3). `"1"` and `E` both mean "exempt from POA reporting" in different code-set
/// revisions and are kept distinct rather than collapsed, matching the original reference model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoaType {
    Y,
    N,
    W,
    U,
    #[serde(rename = "1")]
    One,
    E,
    #[serde(rename = "")]
    Blank,
}

impl PoaType {
    pub fn from_letter(s: &str) -> Option<Self> {
        match s {
            "Y" => Some(Self::Y),
            "N" => Some(Self::N),
            "W" => Some(Self::W),
            "U" => Some(Self::U),
            "1" => Some(Self::One),
            "E" => Some(Self::E),
            "" => Some(Self::Blank),
            _ => None,
        }
    }

    pub fn as_letter(self) -> &'static str {
        match self {
            Self::Y => "Y",
            Self::N => "N",
            Self::W => "W",
            Self::U => "U",
            Self::One => "1",
            Self::E => "E",
            Self::Blank => "",
        }
    }
}

impl Default for PoaType {
    fn default() -> Self {
        Self::Blank
    }
}

/// Role a diagnosis code plays on the claim, used by module translators that need to tell
/// principal/admit codes apart from plain secondaries (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DxRole {
    #[default]
    Unknown,
    Principal,
    Secondary,
    Admit,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub zip4: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub additional_data: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Patient {
    #[serde(default)]
    pub patient_id: String,
    #[serde(default, with = "opt_date")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub medical_record_number: String,
    #[serde(default)]
    pub address: Address,
    /// Age in whole years, taken as-is from the claim when > 0 (§4.6).
    #[serde(default)]
    pub age: i32,
    #[serde(default)]
    pub sex: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provider {
    #[serde(default)]
    pub npi: String,
    /// CMS certification number, truncated to 6 chars at the engine boundary.
    #[serde(default)]
    pub other_id: String,
    #[serde(default)]
    pub facility_name: String,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub carrier: String,
    #[serde(default)]
    pub locality: String,
    #[serde(default)]
    pub additional_data: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueCode {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OccurrenceCode {
    #[serde(default)]
    pub code: String,
    #[serde(default, with = "opt_date")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanCode {
    #[serde(default)]
    pub code: String,
    #[serde(default, with = "opt_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "opt_date")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcedureCode {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub modifier: String,
    #[serde(default, with = "opt_date")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosisCode {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub poa: PoaType,
    #[serde(default)]
    pub role: DxRole,
}

impl DiagnosisCode {
    /// Strips periods for the engine boundary; canonical form keeps them (§6).
    pub fn normalized_code(&self) -> String {
        self.code.replace('.', "")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, with = "opt_date")]
    pub service_date: Option<NaiveDate>,
    #[serde(default)]
    pub revenue_code: String,
    #[serde(default)]
    pub hcpcs: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub units: i64,
    #[serde(default)]
    pub charges: f64,
    #[serde(default)]
    pub ndc: String,
    #[serde(default)]
    pub ndc_units: f64,
    #[serde(default)]
    pub pos: String,
    pub servicing_provider: Option<Provider>,
}

/// Optional IRF-PAI items carried verbatim into the IRF engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrfPaiAssessment {
    #[serde(default)]
    pub items: HashMap<String, String>,
}

/// Optional OASIS items carried verbatim into the HHA engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OasisAssessment {
    #[serde(default)]
    pub items: HashMap<String, String>,
}

/// How an ambiguous ICD cross-walk (a code with more than one mapped target) is resolved.
/// Only one strategy exists today; the enum exists so a future one can be added without
/// touching any call site (§9, Open Question (b)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConversionStrategy {
    #[default]
    FirstListed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claim {
    #[serde(default)]
    pub claim_id: String,
    #[serde(default, with = "opt_date")]
    pub admit_date: Option<NaiveDate>,
    #[serde(default, with = "opt_date")]
    pub from_date: Option<NaiveDate>,
    #[serde(default, with = "opt_date")]
    pub thru_date: Option<NaiveDate>,
    #[serde(default, with = "opt_date")]
    pub receipt_date: Option<NaiveDate>,
    #[serde(default)]
    pub los: i32,
    #[serde(default)]
    pub non_covered_days: i32,
    #[serde(default)]
    pub bill_type: String,
    #[serde(default)]
    pub patient_status: String,
    #[serde(default)]
    pub total_charges: f64,
    #[serde(default)]
    pub cond_codes: Vec<String>,
    #[serde(default)]
    pub value_codes: Vec<ValueCode>,
    #[serde(default)]
    pub occurrence_codes: Vec<OccurrenceCode>,
    #[serde(default)]
    pub span_codes: Vec<SpanCode>,
    #[serde(default)]
    pub reason_for_visit_dxs: Vec<String>,
    pub principal_dx: Option<DiagnosisCode>,
    pub admit_dx: Option<DiagnosisCode>,
    #[serde(default)]
    pub secondary_dxs: Vec<DiagnosisCode>,
    #[serde(default)]
    pub inpatient_pxs: Vec<ProcedureCode>,
    #[serde(default)]
    pub lines: Vec<LineItem>,
    pub billing_provider: Option<Provider>,
    pub servicing_provider: Option<Provider>,
    #[serde(default)]
    pub patient: Patient,
    #[serde(default)]
    pub demo_codes: Vec<String>,
    #[serde(default)]
    pub conversion_strategy: ConversionStrategy,
    pub irf_pai: Option<IrfPaiAssessment>,
    pub oasis: Option<OasisAssessment>,
    /// Modules requested for this claim, by name (§4.7); validated against the known set.
    #[serde(default)]
    pub modules: Vec<String>,
    /// Free-form per-module extras, e.g. `additional_data["esrd"]["ect_choice"]` (§4.6).
    #[serde(default)]
    pub additional_data: HashMap<String, Value>,
}

impl Claim {
    pub fn covered_days(&self) -> i32 {
        self.los - self.non_covered_days
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_preserves_dates_and_defaults() {
        let mut claim = Claim::default();
        claim.claim_id = "C-1".into();
        claim.from_date = Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap());
        claim.los = 9;
        claim.principal_dx = Some(DiagnosisCode {
            code: "A021".into(),
            poa: PoaType::Y,
            role: DxRole::Principal,
        });

        let encoded = serde_json::to_string(&claim).unwrap();
        assert!(encoded.contains("\"2025-07-01\""));
        let decoded: Claim = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.claim_id, claim.claim_id);
        assert_eq!(decoded.from_date, claim.from_date);
        assert_eq!(decoded.principal_dx.unwrap().code, "A021");
    }

    #[test]
    fn compact_date_decodes_same_as_iso() {
        let json = r#"{"claim_id":"c","from_date":"20250701","thru_date":"2025-07-10"}"#;
        let claim: Claim = serde_json::from_str(json).unwrap();
        assert_eq!(
            claim.from_date,
            Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap())
        );
    }

    #[test]
    fn covered_days_subtracts_non_covered() {
        let mut claim = Claim::default();
        claim.los = 9;
        claim.non_covered_days = 2;
        assert_eq!(claim.covered_days(), 7);
    }
}
