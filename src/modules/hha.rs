//! Home Health Agency pricer client (C6). Requires the HHAG grouper's HIPPS-style group code and
//! weight as input, plus the OASIS assessment items carried verbatim on the claim (§4.6).

use std::sync::Arc;

use crate::engine::{EngineRegistry, EngineRequest, EngineValue};
use crate::error::Error;
use crate::model::{AggregateOutput, Claim, ModuleOutput, ModuleResult, PricerOutput};
use crate::version::drg_version_for_date;

pub const NAME: &str = "hha";

pub struct HhaClient {
    registry: Arc<EngineRegistry>,
}

impl HhaClient {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self { registry }
    }

    pub fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        let grouper = match upstream.modules.get("hhag") {
            Some(ModuleResult::Success(ModuleOutput::Grouper(g))) => g,
            _ => {
                return Err(Error::Validation {
                    claim_id: claim.claim_id.clone(),
                    reason: "HHAG output is required for HHA pricing".into(),
                });
            }
        };

        let oasis = claim.oasis.as_ref().ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "OASIS assessment items are required for HHA pricing".into(),
        })?;

        let thru = claim.thru_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "thru_date is required for HHA pricing".into(),
        })?;

        let mut req = EngineRequest::new();
        req.set("group_code", EngineValue::Str(grouper.group_code.clone()));
        req.set("weight", EngineValue::Decimal(grouper.weight));
        req.set("thru_date", EngineValue::Date(thru));
        for (item, value) in &oasis.items {
            req.set(format!("oasis:{item}"), EngineValue::Str(value.clone()));
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

impl crate::modules::Module for HhaClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, _claim: &Claim) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        HhaClient::process(self, claim, upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::EchoEngine;
    use crate::model::claim::OasisAssessment;
    use crate::model::GrouperOutput;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn client() -> HhaClient {
        let registry = Arc::new(EngineRegistry::new());
        registry.register(
            Arc::new(EchoEngine {
                name: NAME.to_string(),
                version: "421".to_string(),
            }),
            std::path::PathBuf::from("jars/pricers/hha.jar"),
        );
        HhaClient::new(registry)
    }

    fn hhag_upstream() -> AggregateOutput {
        let mut agg = AggregateOutput::new("C1");
        agg.modules.insert(
            "hhag".to_string(),
            ModuleResult::Success(ModuleOutput::Grouper(GrouperOutput {
                group_code: "1AGKS".into(),
                weight: 1.1342,
                ..Default::default()
            })),
        );
        agg
    }

    #[test]
    fn requires_hhag_output_upstream() {
        let client = client();
        let mut claim = Claim::default();
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap());
        let err = client.process(&claim, &AggregateOutput::new("C1")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn requires_oasis_assessment() {
        let client = client();
        let mut claim = Claim::default();
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap());
        let err = client.process(&claim, &hhag_upstream()).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn carries_group_code_and_weight_through() {
        let client = client();
        let mut claim = Claim::default();
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap());
        let mut items = HashMap::new();
        items.insert("M1800".to_string(), "02".to_string());
        claim.oasis = Some(OasisAssessment { items });
        let result = client.process(&claim, &hhag_upstream()).unwrap();
        assert!(matches!(result, ModuleOutput::Pricer(_)));
    }
}
