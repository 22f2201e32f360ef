//! Home Health Agency grouper client (C6). No original-source file names this client directly;
//! grounded on the shared claim-to-engine marshaling pattern in
//! `examples/original_source/opps/opps_client.py` and on the OASIS item bag carried verbatim on
//! the canonical claim (§4.6, "IRF / HHA" note).

use std::sync::Arc;

use crate::engine::{EngineRegistry, EngineRequest, EngineValue};
use crate::error::Error;
use crate::model::{AggregateOutput, Claim, GrouperOutput, ModuleOutput};
use crate::version::drg_version_for_date;

pub const NAME: &str = "hhag";

pub struct HhagClient {
    registry: Arc<EngineRegistry>,
}

impl HhagClient {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self { registry }
    }

    fn build_request(&self, claim: &Claim) -> Result<EngineRequest, Error> {
        let oasis = claim.oasis.as_ref().ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "OASIS assessment items are required for HHA grouping".into(),
        })?;

        let mut req = EngineRequest::new();
        for (item, value) in &oasis.items {
            req.set(format!("oasis:{item}"), EngineValue::Str(value.clone()));
        }
        if let Some(principal) = &claim.principal_dx {
            req.set("principal_dx", EngineValue::Str(principal.normalized_code()));
        }
        Ok(req)
    }

    pub fn process(&self, claim: &Claim, _upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        let thru = claim.thru_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "thru_date is required for HHAG version dispatch".into(),
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

impl crate::modules::Module for HhagClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, _claim: &Claim) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        HhagClient::process(self, claim, upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::claim::OasisAssessment;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    #[test]
    fn requires_oasis_assessment() {
        let mut claim = Claim::default();
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap());
        let registry = Arc::new(EngineRegistry::new());
        let err = HhagClient::new(registry).process(&claim, &AggregateOutput::new("c")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn build_request_carries_oasis_items() {
        let mut claim = Claim::default();
        let mut items = HashMap::new();
        items.insert("M1800".to_string(), "02".to_string());
        claim.oasis = Some(OasisAssessment { items });
        let registry = Arc::new(EngineRegistry::new());
        let client = HhagClient::new(registry);
        let req = client.build_request(&claim).unwrap();
        assert!(req.fields.contains_key("oasis:M1800"));
    }
}
