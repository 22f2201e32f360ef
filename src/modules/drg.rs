//! Inpatient DRG grouper client (C6), grounded on
//! `examples/original_source/msdrg/drg_client.py`.

use std::sync::Arc;

use crate::engine::{EngineRegistry, EngineRequest, EngineValue};
use crate::error::Error;
use crate::model::{AggregateOutput, Claim, DrgOutput, ModuleOutput};
use crate::version::DrgVersionTable;

pub const NAME: &str = "drg";

pub struct DrgClient {
    registry: Arc<EngineRegistry>,
    versions: Arc<DrgVersionTable>,
}

impl DrgClient {
    pub fn new(registry: Arc<EngineRegistry>, versions: Arc<DrgVersionTable>) -> Self {
        Self { registry, versions }
    }

    /// Age in whole days from date of birth to `from_date`, floored at 0 (§4.6, grounded on
    /// `calculate_age_in_days`).
    fn age_days_admit(&self, claim: &Claim) -> i64 {
        let (Some(dob), Some(from_date)) = (claim.patient.date_of_birth, claim.from_date) else {
            return 0;
        };
        (from_date - dob).num_days().max(0)
    }

    fn sex_code(claim: &Claim) -> &'static str {
        match claim.patient.sex.as_deref() {
            Some(s) if s.to_ascii_uppercase().starts_with('M') => "MALE",
            Some(s) if s.to_ascii_uppercase().starts_with('F') => "FEMALE",
            _ => "UNKNOWN",
        }
    }

    fn build_request(&self, claim: &Claim) -> Result<EngineRequest, Error> {
        let principal = claim.principal_dx.as_ref().ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "principal diagnosis is required for DRG grouping".into(),
        })?;

        let discharge_status: i32 = claim.patient_status.trim().parse().map_err(|_| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: format!("patient_status '{}' is not an integer", claim.patient_status),
        })?;

        let mut req = EngineRequest::new();
        if claim.patient.age > 0 {
            req.set("age_in_years", EngineValue::Int(claim.patient.age));
        } else {
            let age_days_admit = self.age_days_admit(claim);
            let age_days_discharge = age_days_admit + claim.los as i64;
            req.set("age_days_admit", EngineValue::Int(age_days_admit as i32));
            req.set("age_days_discharge", EngineValue::Int(age_days_discharge as i32));
        }
        req.set("sex", EngineValue::Str(Self::sex_code(claim).to_string()));
        req.set("discharge_status", EngineValue::Int(discharge_status));

        // Per the original reference implementation, principal and admit diagnoses are always
        // submitted with POA = Y regardless of the claim's recorded POA (resolved Open Question
        // (a); see DESIGN.md). Only secondaries carry their recorded POA letter.
        req.set("principal_dx", EngineValue::Str(principal.normalized_code()));
        req.set("principal_dx_poa", EngineValue::Str("Y".to_string()));

        if let Some(admit_dx) = &claim.admit_dx {
            req.set("admit_dx", EngineValue::Str(admit_dx.normalized_code()));
            req.set("admit_dx_poa", EngineValue::Str("Y".to_string()));
        }

        let secondary_codes: Vec<EngineValue> = claim
            .secondary_dxs
            .iter()
            .map(|dx| EngineValue::Str(dx.normalized_code()))
            .collect();
        req.set("secondary_dxs", EngineValue::List(secondary_codes));
        let secondary_poas: Vec<EngineValue> = claim
            .secondary_dxs
            .iter()
            .map(|dx| EngineValue::Str(dx.poa.as_letter().to_string()))
            .collect();
        req.set("secondary_dx_poas", EngineValue::List(secondary_poas));

        let procedures: Vec<EngineValue> = claim
            .inpatient_pxs
            .iter()
            .map(|px| EngineValue::Str(px.code.clone()))
            .collect();
        req.set("procedures", EngineValue::List(procedures));

        Ok(req)
    }

    pub fn process(&self, claim: &Claim, _upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        let thru = claim.thru_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "thru_date is required for DRG version dispatch".into(),
        })?;
        let version = self.versions.resolve(thru, NAME)?;
        let request = self.build_request(claim)?;

        let response = self
            .versions
            .with_reconfigure_lock(NAME, || self.registry.call(NAME, &version, "process", &request))??;

        Ok(ModuleOutput::Drg(DrgOutput {
            return_code: response.string_or_default("return_code"),
            final_drg_value: response.string_or_default("final_drg_value"),
            final_mdc_value: response.string_or_default("final_mdc_value"),
            relative_weight: response.float_or_none("relative_weight").unwrap_or(0.0),
            geometric_mean_los: response.float_or_none("geometric_mean_los").unwrap_or(0.0),
            arithmetic_mean_los: response.float_or_none("arithmetic_mean_los").unwrap_or(0.0),
            poa_exempt: false,
        }))
    }
}

impl crate::modules::Module for DrgClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, _claim: &Claim) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        DrgClient::process(self, claim, upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::EchoEngine;
    use crate::model::claim::{DiagnosisCode, PoaType};
    use chrono::NaiveDate;

    fn client_with_version(version: &str) -> DrgClient {
        let registry = Arc::new(EngineRegistry::new());
        registry.register(
            Arc::new(EchoEngine {
                name: NAME.to_string(),
                version: version.to_string(),
            }),
            std::path::PathBuf::from("jars/pricers/msdrg.jar"),
        );
        let versions = Arc::new(DrgVersionTable::new(10, 1));
        versions.mark_loaded(version);
        DrgClient::new(registry, versions)
    }

    fn simple_claim() -> Claim {
        let mut claim = Claim::default();
        claim.claim_id = "C1".into();
        claim.from_date = Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap());
        claim.los = 9;
        claim.patient.age = 65;
        claim.patient.sex = Some("M".into());
        claim.patient_status = "01".into();
        claim.principal_dx = Some(DiagnosisCode {
            code: "A021".into(),
            poa: PoaType::Y,
            ..Default::default()
        });
        claim.secondary_dxs = vec![DiagnosisCode {
            code: "I82411".into(),
            poa: PoaType::N,
            ..Default::default()
        }];
        claim
    }

    #[test]
    fn resolves_version_and_calls_engine() {
        let client = client_with_version("421");
        let claim = simple_claim();
        let output = client.process(&claim, &AggregateOutput::new("C1")).unwrap();
        match output {
            ModuleOutput::Drg(drg) => {
                // EchoEngine mirrors request fields back, so string fields echo the marshaled
                // request value (numeric fields stay at their zero default since the echo
                // engine returns them as strings, which float_or_none cannot parse).
                assert_eq!(drg.return_code, "");
            }
            _ => panic!("expected Drg output"),
        }
    }

    #[test]
    fn missing_loaded_version_is_version_unavailable() {
        let client = client_with_version("400");
        let claim = simple_claim();
        let err = client.process(&claim, &AggregateOutput::new("C1")).unwrap_err();
        assert!(matches!(err, Error::VersionUnavailable { .. }));
    }

    #[test]
    fn principal_and_admit_always_marshal_poa_y() {
        let client = client_with_version("421");
        let mut claim = simple_claim();
        claim.admit_dx = Some(DiagnosisCode {
            code: "A021".into(),
            poa: PoaType::U,
            ..Default::default()
        });
        let request = client.build_request(&claim).unwrap();
        match request.fields.get("admit_dx_poa").unwrap() {
            EngineValue::Str(s) => assert_eq!(s, "Y"),
            _ => panic!("expected string"),
        }
    }
}
