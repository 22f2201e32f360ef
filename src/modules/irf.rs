//! Inpatient Rehabilitation Facility pricer client (C6). Mirrors `hha.rs`'s shape; requires the
//! IRFG grouper's CMG/weight plus the IRF-PAI assessment items (§4.6).

use std::sync::Arc;

use crate::engine::{EngineRegistry, EngineRequest, EngineValue};
use crate::error::Error;
use crate::model::{AggregateOutput, Claim, ModuleOutput, ModuleResult, PricerOutput};
use crate::version::drg_version_for_date;

pub const NAME: &str = "irf";

pub struct IrfClient {
    registry: Arc<EngineRegistry>,
}

impl IrfClient {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self { registry }
    }

    pub fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        let grouper = match upstream.modules.get("irfg") {
            Some(ModuleResult::Success(ModuleOutput::Grouper(g))) => g,
            _ => {
                return Err(Error::Validation {
                    claim_id: claim.claim_id.clone(),
                    reason: "IRFG output is required for IRF pricing".into(),
                });
            }
        };

        let pai = claim.irf_pai.as_ref().ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "IRF-PAI assessment items are required for IRF pricing".into(),
        })?;

        let thru = claim.thru_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "thru_date is required for IRF pricing".into(),
        })?;

        let mut req = EngineRequest::new();
        req.set("group_code", EngineValue::Str(grouper.group_code.clone()));
        req.set("weight", EngineValue::Decimal(grouper.weight));
        req.set("thru_date", EngineValue::Date(thru));
        for (item, value) in &pai.items {
            req.set(format!("irf_pai:{item}"), EngineValue::Str(value.clone()));
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

impl crate::modules::Module for IrfClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, _claim: &Claim) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        IrfClient::process(self, claim, upstream)
    }
}
