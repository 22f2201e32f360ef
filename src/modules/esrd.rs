//! ESRD (End-Stage Renal Disease) pricer client (C6), grounded on
//! `examples/original_source/pydrg/pricers/esrd.py::EsrdClient`.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::engine::{EngineRegistry, EngineRequest, EngineValue};
use crate::error::Error;
use crate::model::{AggregateOutput, Claim, ModuleOutput, ModuleResult, PricerOutput};
use crate::refdata::ReferenceStore;
use crate::version::drg_version_for_date;

pub const NAME: &str = "esrd";

const DIALYSIS_REVENUE_CODES: &[&str] = &["0821", "0831", "0841", "0851", "0881"];

/// ICD-10 code -> comorbidity category, every entry active 2020-01-01 through 2050-01-01
/// (grounded on the `COMORBIDITY_CODES` table in `esrd.py`).
const COMORBIDITY_CODES: &[(&str, &str)] = &[
    ("K2211", "MA"),
    ("K250", "MA"),
    ("K252", "MA"),
    ("K254", "MA"),
    ("K256", "MA"),
    ("K260", "MA"),
    ("K262", "MA"),
    ("K264", "MA"),
    ("K266", "MA"),
    ("K270", "MA"),
    ("K272", "MA"),
    ("K274", "MA"),
    ("K276", "MA"),
    ("K280", "MA"),
    ("K282", "MA"),
    ("K284", "MA"),
    ("K286", "MA"),
    ("K31811", "MA"),
    ("K5521", "MA"),
    ("K5701", "MA"),
    ("K5711", "MA"),
    ("K5713", "MA"),
    ("K5721", "MA"),
    ("K5731", "MA"),
    ("K5733", "MA"),
    ("K5741", "MA"),
    ("K5751", "MA"),
    ("K5753", "MA"),
    ("K5781", "MA"),
    ("K5791", "MA"),
    ("K5793", "MA"),
    ("A1884", "MC"),
    ("I300", "MC"),
    ("I301", "MC"),
    ("I308", "MC"),
    ("I309", "MC"),
    ("I32", "MC"),
    ("M3212", "MC"),
    ("D550", "MD"),
    ("D551", "MD"),
    ("D552", "MD"),
    ("D553", "MD"),
    ("D558", "MD"),
    ("D559", "MD"),
    ("D560", "MD"),
    ("D561", "MD"),
    ("D562", "MD"),
    ("D563", "MD"),
    ("D565", "MD"),
    ("D568", "MD"),
    ("D5700", "MD"),
    ("D5701", "MD"),
    ("D5702", "MD"),
    ("D5703", "MD"),
    ("D5709", "MD"),
    ("D571", "MD"),
    ("D5720", "MD"),
    ("D57211", "MD"),
    ("D57212", "MD"),
    ("D57213", "MD"),
    ("D57218", "MD"),
    ("D57219", "MD"),
    ("D5740", "MD"),
    ("D57411", "MD"),
    ("D57412", "MD"),
    ("D57413", "MD"),
    ("D57418", "MD"),
    ("D57419", "MD"),
    ("D5742", "MD"),
    ("D57431", "MD"),
    ("D57432", "MD"),
    ("D57433", "MD"),
    ("D57438", "MD"),
    ("D57439", "MD"),
    ("D5744", "MD"),
    ("D57451", "MD"),
    ("D57452", "MD"),
    ("D57453", "MD"),
    ("D57458", "MD"),
    ("D57459", "MD"),
    ("D5780", "MD"),
    ("D57811", "MD"),
    ("D57812", "MD"),
    ("D57813", "MD"),
    ("D57818", "MD"),
    ("D57819", "MD"),
    ("D580", "MD"),
    ("D581", "MD"),
    ("D460", "ME"),
    ("D461", "ME"),
    ("D4620", "ME"),
    ("D4621", "ME"),
    ("D4622", "ME"),
    ("D464", "ME"),
    ("D469", "ME"),
    ("D46A", "ME"),
    ("D46B", "ME"),
    ("D46C", "ME"),
    ("D46Z", "ME"),
    ("D471", "ME"),
    ("D473", "ME"),
];

const COMORBIDITY_WINDOW_START: (i32, u32, u32) = (2020, 1, 1);
const COMORBIDITY_WINDOW_END: (i32, u32, u32) = (2050, 1, 1);

fn comorbidity_category(code: &str) -> Option<&'static str> {
    COMORBIDITY_CODES.iter().find(|(c, _)| *c == code).map(|(_, cat)| *cat)
}

/// A code's window is fixed; it qualifies when the claim's from/thru dates both fall inside it
/// (resolved Open Question (c): claim dates within the code's window, not the reverse).
fn window_contains(from: NaiveDate, thru: NaiveDate) -> bool {
    let start = NaiveDate::from_ymd_opt(
        COMORBIDITY_WINDOW_START.0,
        COMORBIDITY_WINDOW_START.1,
        COMORBIDITY_WINDOW_START.2,
    )
    .unwrap();
    let end =
        NaiveDate::from_ymd_opt(COMORBIDITY_WINDOW_END.0, COMORBIDITY_WINDOW_END.1, COMORBIDITY_WINDOW_END.2)
            .unwrap();
    start <= from && thru <= end
}

pub struct EsrdClient {
    registry: Arc<EngineRegistry>,
    refdata: Arc<ReferenceStore>,
}

impl EsrdClient {
    pub fn new(registry: Arc<EngineRegistry>, refdata: Arc<ReferenceStore>) -> Self {
        Self { registry, refdata }
    }

    fn dialysis_revenue_code(claim: &Claim) -> Result<&str, Error> {
        claim
            .lines
            .iter()
            .map(|l| l.revenue_code.as_str())
            .find(|code| DIALYSIS_REVENUE_CODES.contains(code))
            .ok_or_else(|| Error::Validation {
                claim_id: claim.claim_id.clone(),
                reason: "no dialysis revenue code found in claim lines".into(),
            })
    }

    fn dialysis_session_count(claim: &Claim, revenue_code: &str) -> i64 {
        let mut dates: Vec<NaiveDate> = claim
            .lines
            .iter()
            .filter(|l| l.revenue_code == revenue_code)
            .filter_map(|l| l.service_date)
            .collect();
        dates.sort();
        dates.dedup();
        dates.len() as i64
    }

    fn ect_choice(claim: &Claim) -> Result<(String, Option<f64>), Error> {
        let Some(esrd_data) = claim.additional_data.get("esrd").and_then(|v| v.as_object()) else {
            return Ok((String::new(), None));
        };
        let choice = esrd_data.get("ect_choice").and_then(|v| v.as_str()).unwrap_or("").to_string();
        if !matches!(choice.as_str(), "" | "H" | "P" | "B") {
            return Err(Error::Validation {
                claim_id: claim.claim_id.clone(),
                reason: "ect_choice must be 'H', 'P', 'B', or blank".into(),
            });
        }
        let ppa_adjustment = esrd_data.get("ppa_adjustment").and_then(|v| v.as_f64());
        if matches!(choice.as_str(), "P" | "B") && ppa_adjustment.is_none() {
            return Err(Error::Validation {
                claim_id: claim.claim_id.clone(),
                reason: "ppa_adjustment is required when ect_choice is 'P' or 'B'".into(),
            });
        }
        Ok((choice, ppa_adjustment))
    }

    pub fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        if !matches!(upstream.modules.get("ioce"), Some(ModuleResult::Success(ModuleOutput::Ioce(_)))) {
            return Err(Error::Validation {
                claim_id: claim.claim_id.clone(),
                reason: "IOCE output is required for ESRD pricing".into(),
            });
        }

        let (from, thru) = match (claim.from_date, claim.thru_date) {
            (Some(f), Some(t)) => (f, t),
            _ => {
                return Err(Error::Validation {
                    claim_id: claim.claim_id.clone(),
                    reason: "from_date and thru_date are required for ESRD pricing".into(),
                });
            }
        };

        let dob = claim.patient.date_of_birth.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "patient date of birth is required for ESRD pricing".into(),
        })?;

        let revenue_code = Self::dialysis_revenue_code(claim)?;
        let session_count = Self::dialysis_session_count(claim, revenue_code);
        if session_count == 0 {
            return Err(Error::Validation {
                claim_id: claim.claim_id.clone(),
                reason: "no dialysis sessions found in claim".into(),
            });
        }

        let weight = claim.value_codes.iter().find(|v| v.code == "A8").ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "patient weight (value code A8) is required for ESRD pricing".into(),
        })?;
        let height = claim.value_codes.iter().find(|v| v.code == "A9").ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "patient height (value code A9) is required for ESRD pricing".into(),
        })?;

        let (ect_choice, ppa_adjustment) = Self::ect_choice(claim)?;

        let comorbidity_codes: Vec<EngineValue> = claim
            .secondary_dxs
            .iter()
            .filter_map(|dx| comorbidity_category(&dx.normalized_code()))
            .filter(|_| window_contains(from, thru))
            .map(|cat| EngineValue::Str(cat.to_string()))
            .collect();

        let provider = claim
            .billing_provider
            .as_ref()
            .or(claim.servicing_provider.as_ref())
            .ok_or_else(|| Error::Validation {
                claim_id: claim.claim_id.clone(),
                reason: "either billing or servicing provider must be provided for ESRD pricing".into(),
            })?;
        let opsf = self.refdata.find_opsf(provider, thru)?;

        let mut req = EngineRequest::new();
        req.set("revenue_code", EngineValue::Str(revenue_code.to_string()));
        req.set("dialysis_session_count", EngineValue::Int(session_count as i32));
        req.set("patient_date_of_birth", EngineValue::Date(dob));
        req.set("patient_weight", EngineValue::Decimal(weight.amount));
        req.set("patient_height", EngineValue::Decimal(height.amount));
        req.set("service_from_date", EngineValue::Date(from));
        req.set("service_thru_date", EngineValue::Date(thru));
        req.set("treatment_choice", EngineValue::Str(ect_choice));
        if let Some(ppa) = ppa_adjustment {
            req.set("ppa_adjustment_percent", EngineValue::Decimal(ppa));
        }
        req.set("comorbidities", EngineValue::List(comorbidity_codes));
        req.set("carrier", EngineValue::Str(opsf.carrier.clone()));
        req.set("locality", EngineValue::Str(opsf.locality.clone()));

        let demo_codes: Vec<EngineValue> = claim.demo_codes.iter().cloned().map(EngineValue::Str).collect();
        req.set("demo_codes", EngineValue::List(demo_codes));
        let cond_codes: Vec<EngineValue> = claim.cond_codes.iter().cloned().map(EngineValue::Str).collect();
        req.set("cond_codes", EngineValue::List(cond_codes));

        let version = drg_version_for_date(thru);
        let response = self.registry.call(NAME, &version, "process", &req)?;

        Ok(ModuleOutput::Pricer(PricerOutput {
            return_code: response.string_or_default("return_code"),
            total_payment: response.float_or_none("total_payment").unwrap_or(0.0),
            fields: std::collections::HashMap::new(),
        }))
    }
}

impl crate::modules::Module for EsrdClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, _claim: &Claim) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        EsrdClient::process(self, claim, upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::claim::{LineItem, ValueCode};

    fn claim_missing_dialysis() -> Claim {
        let mut claim = Claim::default();
        claim.from_date = Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        claim
    }

    #[test]
    fn requires_dialysis_revenue_code() {
        let claim = claim_missing_dialysis();
        let err = EsrdClient::dialysis_revenue_code(&claim).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn session_count_deduplicates_service_dates() {
        let mut claim = claim_missing_dialysis();
        claim.lines = vec![
            LineItem {
                revenue_code: "0821".into(),
                service_date: Some(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
                ..Default::default()
            },
            LineItem {
                revenue_code: "0821".into(),
                service_date: Some(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
                ..Default::default()
            },
            LineItem {
                revenue_code: "0821".into(),
                service_date: Some(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()),
                ..Default::default()
            },
        ];
        assert_eq!(EsrdClient::dialysis_session_count(&claim, "0821"), 2);
    }

    #[test]
    fn ect_choice_requires_ppa_adjustment_for_p_or_b() {
        let mut claim = claim_missing_dialysis();
        claim.additional_data.insert(
            "esrd".to_string(),
            serde_json::json!({ "ect_choice": "P" }),
        );
        let err = EsrdClient::ect_choice(&claim).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn comorbidity_lookup_maps_known_code() {
        assert_eq!(comorbidity_category("K2211"), Some("MA"));
        assert_eq!(comorbidity_category("Z0000"), None);
    }

    #[test]
    fn weight_and_height_value_codes_are_found_by_code() {
        let mut claim = claim_missing_dialysis();
        claim.value_codes = vec![
            ValueCode { code: "A8".into(), amount: 70.0 },
            ValueCode { code: "A9".into(), amount: 1.75 },
        ];
        assert!(claim.value_codes.iter().any(|v| v.code == "A8"));
        assert!(claim.value_codes.iter().any(|v| v.code == "A9"));
    }
}
