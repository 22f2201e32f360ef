//! Federally Qualified Health Center pricer client (C6), grounded on
//! `examples/original_source/pydrg/pricers/fqhc.py::FqhcClient`.

use std::sync::Arc;

use crate::engine::{EngineRegistry, EngineRequest, EngineValue};
use crate::error::Error;
use crate::model::{AggregateOutput, Claim, IoceOutput, ModuleOutput, ModuleResult, PricerOutput};
use crate::refdata::ReferenceStore;
use crate::version::drg_version_for_date;

pub const NAME: &str = "fqhc";

pub struct FqhcClient {
    registry: Arc<EngineRegistry>,
    refdata: Arc<ReferenceStore>,
}

impl FqhcClient {
    pub fn new(registry: Arc<EngineRegistry>, refdata: Arc<ReferenceStore>) -> Self {
        Self { registry, refdata }
    }

    /// Resolution order (§4.6): provider-declared carrier/locality first (billing provider, then
    /// servicing provider), else a ZIP9 lookup off whichever provider carries a usable address.
    /// Fails pre-flight rather than guessing when neither resolves.
    fn resolve_carrier_locality(&self, claim: &Claim) -> Result<(String, String), Error> {
        for provider in [&claim.billing_provider, &claim.servicing_provider] {
            let Some(provider) = provider else { continue };
            if !provider.carrier.trim().is_empty() && !provider.locality.trim().is_empty() {
                return Ok((provider.carrier.clone(), provider.locality.clone()));
            }
        }

        let thru = claim.thru_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "thru_date is required to resolve carrier/locality by ZIP9".into(),
        })?;

        for provider in [&claim.billing_provider, &claim.servicing_provider] {
            let Some(provider) = provider else { continue };
            let zip5 = provider.address.zip.trim();
            if zip5.is_empty() {
                continue;
            }
            let plus4 = provider.address.zip4.trim();
            let plus4 = if plus4.is_empty() { None } else { Some(plus4) };
            if let Ok(row) = self.refdata.find_zip9(zip5, plus4, thru) {
                return Ok((row.carrier, row.locality));
            }
        }

        Err(Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "either billing or servicing provider with a carrier and locality, or a \
                     resolvable ZIP9 address, is required for FQHC pricing"
                .into(),
        })
    }

    pub fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        let ioce: &IoceOutput = match upstream.modules.get("ioce") {
            Some(ModuleResult::Success(ModuleOutput::Ioce(ioce))) => ioce,
            _ => {
                return Err(Error::Validation {
                    claim_id: claim.claim_id.clone(),
                    reason: "IOCE output is required for FQHC pricing".into(),
                });
            }
        };

        let thru = claim.thru_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "thru_date is required for FQHC pricing".into(),
        })?;
        let from = claim.from_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "from_date is required for FQHC pricing".into(),
        })?;

        let (carrier, locality) = self.resolve_carrier_locality(claim)?;

        let mut req = EngineRequest::new();
        req.set("carrier", EngineValue::Str(carrier));
        req.set("locality", EngineValue::Str(locality));
        req.set("from_date", EngineValue::Date(from));
        req.set("thru_date", EngineValue::Date(thru));

        let demo_codes: Vec<EngineValue> = claim.demo_codes.iter().cloned().map(EngineValue::Str).collect();
        req.set("demo_codes", EngineValue::List(demo_codes));

        if let Some(fqhc_data) = claim.additional_data.get("fqhc") {
            if let Some(pct) = fqhc_data.get("mdpcp_reduction_percentage").and_then(|v| v.as_f64()) {
                req.set("mdpcp_reduction_percentage", EngineValue::Decimal(pct));
            }
            if let Some(amt) = fqhc_data.get("med_advantage_plan_amount").and_then(|v| v.as_f64()) {
                req.set("med_advantage_plan_amount", EngineValue::Decimal(amt));
            }
        }

        for (idx, ioce_line) in ioce.lines.iter().enumerate() {
            let prefix = format!("line:{}", ioce_line.line_number);
            let claim_line = claim.lines.get(idx);
            req.set(format!("{prefix}:status_indicator"), EngineValue::Str(ioce_line.status_indicator.clone()));
            req.set(format!("{prefix}:payment_method_flag"), EngineValue::Str(ioce_line.payment_method_flag.clone()));
            if let Some(line) = claim_line {
                req.set(format!("{prefix}:revenue_code"), EngineValue::Str(line.revenue_code.clone()));
                req.set(format!("{prefix}:hcpcs"), EngineValue::Str(line.hcpcs.clone()));
                req.set(format!("{prefix}:units"), EngineValue::Int(line.units as i32));
                req.set(format!("{prefix}:charges"), EngineValue::Decimal(line.charges));
                if let Some(service_date) = line.service_date {
                    req.set(format!("{prefix}:service_date"), EngineValue::Date(service_date));
                }
            }
        }

        let version = drg_version_for_date(thru);
        let response = self.registry.call(NAME, &version, "process", &req)?;

        Ok(ModuleOutput::Pricer(PricerOutput {
            return_code: response.string_or_default("return_code"),
            total_payment: response.float_or_none("total_payment").unwrap_or(0.0),
            fields: std::collections::HashMap::new(),
        }))
    }
}

impl crate::modules::Module for FqhcClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, _claim: &Claim) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        FqhcClient::process(self, claim, upstream)
    }
}
