//! Inpatient Rehabilitation Facility grouper client (C6). Mirrors `hhag.rs`'s shape; the IRF-PAI
//! item bag stands in for the OASIS bag (§4.6, "IRF / HHA" note).

use std::sync::Arc;

use crate::engine::{EngineRegistry, EngineRequest, EngineValue};
use crate::error::Error;
use crate::model::{AggregateOutput, Claim, GrouperOutput, ModuleOutput};
use crate::version::drg_version_for_date;

pub const NAME: &str = "irfg";

pub struct IrfgClient {
    registry: Arc<EngineRegistry>,
}

impl IrfgClient {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self { registry }
    }

    fn build_request(&self, claim: &Claim) -> Result<EngineRequest, Error> {
        let pai = claim.irf_pai.as_ref().ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "IRF-PAI assessment items are required for IRF grouping".into(),
        })?;

        let mut req = EngineRequest::new();
        for (item, value) in &pai.items {
            req.set(format!("irf_pai:{item}"), EngineValue::Str(value.clone()));
        }
        if let Some(principal) = &claim.principal_dx {
            req.set("principal_dx", EngineValue::Str(principal.normalized_code()));
        }
        Ok(req)
    }

    pub fn process(&self, claim: &Claim, _upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        let thru = claim.thru_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "thru_date is required for IRFG version dispatch".into(),
        })?;
        let version = drg_version_for_date(thru);
        let request = self.build_request(claim)?;
        let response = self.registry.call(NAME, &version, "process", &request)?;

        Ok(ModuleOutput::Grouper(GrouperOutput {
            return_code: response.string_or_default("return_code"),
            group_code: response.string_or_default("group_code"),
            weight: response.float_or_none("weight").unwrap_or(0.0),
        }))
    }
}

impl crate::modules::Module for IrfgClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, _claim: &Claim) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        IrfgClient::process(self, claim, upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::claim::IrfPaiAssessment;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    #[test]
    fn requires_irf_pai_assessment() {
        let mut claim = Claim::default();
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap());
        let registry = Arc::new(EngineRegistry::new());
        let err = IrfgClient::new(registry).process(&claim, &AggregateOutput::new("c")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn build_request_carries_pai_items() {
        let mut claim = Claim::default();
        let mut items = HashMap::new();
        items.insert("GG0130".to_string(), "03".to_string());
        claim.irf_pai = Some(IrfPaiAssessment { items });
        let registry = Arc::new(EngineRegistry::new());
        let client = IrfgClient::new(registry);
        let req = client.build_request(&claim).unwrap();
        assert!(req.fields.contains_key("irf_pai:GG0130"));
    }
}
