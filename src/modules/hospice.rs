//! Hospice pricer client (C6), grounded structurally on
//! `examples/original_source/pydrg/pricers/fqhc.py::FqhcClient` (the "HospiceClient" name in that
//! file's JVM-not-started error message is a leftover from a shared template; this client follows
//! the uniform pricer shape of §4.6 with no upstream module dependency).

use std::sync::Arc;

use crate::engine::{EngineRegistry, EngineRequest, EngineValue};
use crate::error::Error;
use crate::model::{AggregateOutput, Claim, ModuleOutput, PricerOutput};
use crate::refdata::ReferenceStore;
use crate::version::drg_version_for_date;

pub const NAME: &str = "hospice";

pub struct HospiceClient {
    registry: Arc<EngineRegistry>,
    refdata: Arc<ReferenceStore>,
}

impl HospiceClient {
    pub fn new(registry: Arc<EngineRegistry>, refdata: Arc<ReferenceStore>) -> Self {
        Self { registry, refdata }
    }

    pub fn process(&self, claim: &Claim, _upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        let thru = claim.thru_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "thru_date is required for Hospice pricing".into(),
        })?;
        let from = claim.from_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "from_date is required for Hospice pricing".into(),
        })?;

        let principal = claim.principal_dx.as_ref().ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "principal diagnosis is required for Hospice pricing".into(),
        })?;

        let provider = claim
            .billing_provider
            .as_ref()
            .or(claim.servicing_provider.as_ref())
            .ok_or_else(|| Error::Validation {
                claim_id: claim.claim_id.clone(),
                reason: "either billing or servicing provider must be provided for Hospice pricing".into(),
            })?;
        let ipsf = self.refdata.find_ipsf(provider, thru)?;

        let mut req = EngineRequest::new();
        req.set("from_date", EngineValue::Date(from));
        req.set("thru_date", EngineValue::Date(thru));
        req.set("principal_dx", EngineValue::Str(principal.normalized_code()));
        req.set("state_code", EngineValue::Str(ipsf.state_code.clone()));
        req.set("county_code", EngineValue::Str(ipsf.county_code.clone()));

        let value_codes: Vec<EngineValue> = claim
            .value_codes
            .iter()
            .map(|vc| EngineValue::Str(format!("{}:{}", vc.code, vc.amount)))
            .collect();
        req.set("value_codes", EngineValue::List(value_codes));

        let version = drg_version_for_date(thru);
        let response = self.registry.call(NAME, &version, "process", &req)?;

        Ok(ModuleOutput::Pricer(PricerOutput {
            return_code: response.string_or_default("return_code"),
            total_payment: response.float_or_none("total_payment").unwrap_or(0.0),
            fields: std::collections::HashMap::new(),
        }))
    }
}

impl crate::modules::Module for HospiceClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, _claim: &Claim) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        HospiceClient::process(self, claim, upstream)
    }
}
