//! Outpatient Code Editor client (C6), grounded on
//! `examples/original_source/pydrg/ioce/ioce_client.py`. Every field crossing the engine
//! boundary here follows the fixed width/format contract in SPEC_FULL §6.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::engine::{EngineRegistry, EngineRequest, EngineValue};
use crate::error::Error;
use crate::model::claim::DiagnosisCode;
use crate::model::{AggregateOutput, Claim, IoceLineResult, IoceOutput, ModuleOutput};
use crate::version::drg_version_for_date;

pub const NAME: &str = "ioce";

pub fn format_age(years: i32) -> String {
    if years <= 0 {
        "000".to_string()
    } else {
        format!("{:03}", years.min(999))
    }
}

pub fn format_sex(sex: Option<&str>) -> &'static str {
    match sex {
        Some(s) if s.to_ascii_uppercase().starts_with('M') => "1",
        Some(s) if s.to_ascii_uppercase().starts_with('F') => "2",
        _ => "0",
    }
}

pub fn format_bill_type(bill_type: &str) -> String {
    let mut s = bill_type.to_string();
    while s.len() < 3 {
        s.push('0');
    }
    s.chars().take(3).collect()
}

pub fn format_patient_status(status: &str) -> String {
    format!("{status:0>2}").chars().take(2).collect()
}

pub fn format_units(units: i64) -> String {
    if units <= 0 {
        "000000001".to_string()
    } else {
        format!("{units:09}")
    }
}

pub fn format_charge(charge: f64) -> String {
    format!("{charge:.2}")
}

/// Cents times 100, 9-digit zero-padded (§6).
pub fn format_value_code_amount(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    format!("{cents:09}")
}

pub fn truncate_npi(npi: &str) -> String {
    npi.chars().take(13).collect()
}

pub fn truncate_ccn(ccn: &str) -> String {
    if ccn.is_empty() {
        "123456".to_string()
    } else {
        ccn.chars().take(6).collect()
    }
}

fn poa_letter(dx: &DiagnosisCode) -> String {
    let letter = dx.poa.as_letter();
    if letter.is_empty() {
        "U".to_string()
    } else {
        letter.to_string()
    }
}

pub struct IoceClient {
    registry: Arc<EngineRegistry>,
}

impl IoceClient {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self { registry }
    }

    fn build_request(&self, claim: &Claim, thru: NaiveDate) -> Result<EngineRequest, Error> {
        let principal = claim.principal_dx.as_ref().ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "principal diagnosis is required for IOCE editing".into(),
        })?;

        let mut req = EngineRequest::new();
        req.set("claim_id", EngineValue::Str(claim.claim_id.clone()));
        req.set("from_date", EngineValue::Date(claim.from_date.unwrap_or(thru)));
        req.set("thru_date", EngineValue::Date(thru));
        req.set("age", EngineValue::Str(format_age(claim.patient.age)));
        req.set("sex", EngineValue::Str(format_sex(claim.patient.sex.as_deref()).to_string()));
        req.set("bill_type", EngineValue::Str(format_bill_type(&claim.bill_type)));
        req.set(
            "patient_status",
            EngineValue::Str(format_patient_status(&claim.patient_status)),
        );

        if let Some(provider) = &claim.billing_provider {
            req.set("npi", EngineValue::Str(truncate_npi(&provider.npi)));
            req.set("ccn", EngineValue::Str(truncate_ccn(&provider.other_id)));
        }

        req.set("principal_dx", EngineValue::Str(principal.normalized_code()));
        req.set("principal_dx_poa", EngineValue::Str(poa_letter(principal)));

        // The principal diagnosis is also copied into the reason-for-visit list (§4.6).
        let mut rfv = vec![EngineValue::Str(principal.normalized_code())];
        rfv.extend(claim.reason_for_visit_dxs.iter().cloned().map(EngineValue::Str));
        req.set("reason_for_visit_dxs", EngineValue::List(rfv));

        let secondary_codes: Vec<EngineValue> = claim
            .secondary_dxs
            .iter()
            .map(|dx| EngineValue::Str(dx.normalized_code()))
            .collect();
        req.set("secondary_dxs", EngineValue::List(secondary_codes));
        let secondary_poas: Vec<EngineValue> =
            claim.secondary_dxs.iter().map(|dx| EngineValue::Str(poa_letter(dx))).collect();
        req.set("secondary_dx_poas", EngineValue::List(secondary_poas));

        req.set(
            "value_codes",
            EngineValue::List(
                claim
                    .value_codes
                    .iter()
                    .map(|vc| EngineValue::Str(format!("{}:{}", vc.code, format_value_code_amount(vc.amount))))
                    .collect(),
            ),
        );

        let lines: Vec<EngineValue> = claim
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                EngineValue::Str(format!(
                    "{i}|{}|{}|{}|{}",
                    line.revenue_code,
                    line.hcpcs,
                    format_units(line.units),
                    format_charge(line.charges)
                ))
            })
            .collect();
        req.set("lines", EngineValue::List(lines));

        Ok(req)
    }

    pub fn process(&self, claim: &Claim, _upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        let thru = claim.thru_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "thru_date is required for IOCE version dispatch".into(),
        })?;
        let version = drg_version_for_date(thru);
        let request = self.build_request(claim, thru)?;
        let response = self.registry.call(NAME, &version, "process", &request)?;

        let lines = claim
            .lines
            .iter()
            .enumerate()
            .map(|(i, _)| IoceLineResult {
                line_number: i as i32,
                status_indicator: response.string_or_default(&format!("line:{i}:status_indicator")),
                apc: response.string_or_default(&format!("line:{i}:apc")),
                payment_method_flag: response.string_or_default(&format!("line:{i}:payment_method_flag")),
                edits: Vec::new(),
                hcpcs_description: None,
            })
            .collect();

        let mut diagnosis_descriptions = HashMap::new();
        if let Some(principal) = &claim.principal_dx {
            let desc = response.string_or_default(&format!("dx_description:{}", principal.normalized_code()));
            if !desc.is_empty() {
                diagnosis_descriptions.insert(principal.normalized_code(), desc);
            }
        }

        Ok(ModuleOutput::Ioce(IoceOutput {
            return_code: response.string_or_default("return_code"),
            return_code_description: None,
            claim_processed_flag: response.string_or_default("claim_processed_flag"),
            claim_processed_flag_description: None,
            claim_edits: Vec::new(),
            lines,
            diagnosis_descriptions,
        }))
    }
}

impl crate::modules::Module for IoceClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, _claim: &Claim) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        IoceClient::process(self, claim, upstream)
    }
}
