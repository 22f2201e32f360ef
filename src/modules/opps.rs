//! Outpatient Prospective Payment System pricer client (C6). The vendor engine the original
//! source drives for OPPS is IOCE itself (`examples/original_source/opps/opps_client.py` wraps
//! an `IoceComponent` directly); here OPPS instead consumes the IOCE module's own output plus an
//! OPSF lookup, per §4.6's note that OPPS/FQHC/ESRD all rebuild line items from IOCE results.

use std::sync::Arc;

use crate::engine::{EngineRegistry, EngineRequest, EngineValue};
use crate::error::Error;
use crate::model::{AggregateOutput, Claim, IoceOutput, ModuleOutput, ModuleResult, PricerOutput};
use crate::refdata::ReferenceStore;
use crate::version::drg_version_for_date;

pub const NAME: &str = "opps";

pub struct OppsClient {
    registry: Arc<EngineRegistry>,
    refdata: Arc<ReferenceStore>,
}

impl OppsClient {
    pub fn new(registry: Arc<EngineRegistry>, refdata: Arc<ReferenceStore>) -> Self {
        Self { registry, refdata }
    }

    pub fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        let ioce: &IoceOutput = match upstream.modules.get("ioce") {
            Some(ModuleResult::Success(ModuleOutput::Ioce(ioce))) => ioce,
            _ => {
                return Err(Error::Validation {
                    claim_id: claim.claim_id.clone(),
                    reason: "IOCE output is required for OPPS pricing".into(),
                });
            }
        };

        let thru = claim.thru_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "thru_date is required for OPPS pricing".into(),
        })?;

        let provider = claim
            .billing_provider
            .as_ref()
            .or(claim.servicing_provider.as_ref())
            .ok_or_else(|| Error::Validation {
                claim_id: claim.claim_id.clone(),
                reason: "either billing or servicing provider must be provided for OPPS pricing".into(),
            })?;
        let opsf = self.refdata.find_opsf(provider, thru)?;

        let mut req = EngineRequest::new();
        req.set("carrier", EngineValue::Str(opsf.carrier.clone()));
        req.set("locality", EngineValue::Str(opsf.locality.clone()));
        req.set("cost_to_charge_ratio", EngineValue::Decimal(opsf.cost_to_charge_ratio));
        req.set("wage_index", EngineValue::Decimal(opsf.wage_index));
        req.set("state_code", EngineValue::Str(opsf.state_code.clone()));
        req.set("thru_date", EngineValue::Date(thru));

        let cond_codes: Vec<EngineValue> = claim.cond_codes.iter().cloned().map(EngineValue::Str).collect();
        req.set("cond_codes", EngineValue::List(cond_codes));

        for (idx, ioce_line) in ioce.lines.iter().enumerate() {
            let prefix = format!("line:{}", ioce_line.line_number);
            req.set(format!("{prefix}:status_indicator"), EngineValue::Str(ioce_line.status_indicator.clone()));
            req.set(format!("{prefix}:apc"), EngineValue::Str(ioce_line.apc.clone()));
            req.set(format!("{prefix}:payment_method_flag"), EngineValue::Str(ioce_line.payment_method_flag.clone()));
            if let Some(line) = claim.lines.get(idx) {
                req.set(format!("{prefix}:revenue_code"), EngineValue::Str(line.revenue_code.clone()));
                req.set(format!("{prefix}:hcpcs"), EngineValue::Str(line.hcpcs.clone()));
                req.set(format!("{prefix}:units"), EngineValue::Int(line.units as i32));
                req.set(format!("{prefix}:charges"), EngineValue::Decimal(line.charges));
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

impl crate::modules::Module for OppsClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, _claim: &Claim) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        OppsClient::process(self, claim, upstream)
    }
}
