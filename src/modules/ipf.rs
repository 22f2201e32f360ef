//! Inpatient Psychiatric Facility pricer client (C6). Follows the uniform pricer shape shared
//! with LTCH/SNF/Hospice (§4.6); like IPPS it additionally requires an upstream DRG result.

use std::sync::Arc;

use crate::engine::{EngineRegistry, EngineRequest, EngineValue};
use crate::error::Error;
use crate::model::{AggregateOutput, Claim, ModuleOutput, ModuleResult, PricerOutput};
use crate::refdata::ReferenceStore;
use crate::version::drg_version_for_date;

pub const NAME: &str = "ipf";

pub struct IpfClient {
    registry: Arc<EngineRegistry>,
    refdata: Arc<ReferenceStore>,
}

impl IpfClient {
    pub fn new(registry: Arc<EngineRegistry>, refdata: Arc<ReferenceStore>) -> Self {
        Self { registry, refdata }
    }

    pub fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        let thru = claim.thru_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "thru_date is required for IPF pricing".into(),
        })?;

        claim.principal_dx.as_ref().ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "principal diagnosis is required for IPF pricing".into(),
        })?;

        let drg = match upstream.modules.get("drg") {
            Some(ModuleResult::Success(ModuleOutput::Drg(drg))) => drg,
            _ => {
                return Err(Error::Validation {
                    claim_id: claim.claim_id.clone(),
                    reason: "DRG output is required for IPF pricing".into(),
                });
            }
        };

        let provider = claim
            .billing_provider
            .as_ref()
            .or(claim.servicing_provider.as_ref())
            .ok_or_else(|| Error::Validation {
                claim_id: claim.claim_id.clone(),
                reason: "either billing or servicing provider must be provided for IPF pricing".into(),
            })?;
        let ipsf = self.refdata.find_ipsf(provider, thru)?;

        let mut req = EngineRequest::new();
        req.set("covered_charges", EngineValue::Decimal(claim.total_charges));
        req.set("covered_days", EngineValue::Int(claim.covered_days()));
        req.set("length_of_stay", EngineValue::Int(claim.los));
        req.set("discharge_date", EngineValue::Date(thru));
        req.set("drg", EngineValue::Str(drg.final_drg_value.clone()));
        req.set(
            "operating_cost_to_charge_ratio",
            EngineValue::Decimal(ipsf.operating_cost_to_charge_ratio),
        );
        req.set("bed_size", EngineValue::Int(ipsf.bed_size as i32));
        req.set("state_code", EngineValue::Str(ipsf.state_code.clone()));
        req.set(
            "principal_dx",
            EngineValue::Str(claim.principal_dx.as_ref().unwrap().normalized_code()),
        );

        let version = drg_version_for_date(thru);
        let response = self.registry.call(NAME, &version, "process", &req)?;

        Ok(ModuleOutput::Pricer(PricerOutput {
            return_code: response.string_or_default("return_code"),
            total_payment: response.float_or_none("total_payment").unwrap_or(0.0),
            fields: std::collections::HashMap::new(),
        }))
    }
}

impl crate::modules::Module for IpfClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, _claim: &Claim) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        IpfClient::process(self, claim, upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::EchoEngine;
    use crate::model::claim::Provider;
    use crate::model::DrgOutput;
    use chrono::NaiveDate;

    fn client_with_store() -> IpfClient {
        let registry = Arc::new(EngineRegistry::new());
        registry.register(
            Arc::new(EchoEngine {
                name: NAME.to_string(),
                version: "421".to_string(),
            }),
            std::path::PathBuf::from("jars/pricers/ipf.jar"),
        );
        let refdata = Arc::new(ReferenceStore::open_in_memory().unwrap());
        IpfClient::new(registry, refdata)
    }

    fn drg_upstream() -> AggregateOutput {
        let mut agg = AggregateOutput::new("C1");
        agg.modules.insert(
            "drg".to_string(),
            ModuleResult::Success(ModuleOutput::Drg(DrgOutput {
                final_drg_value: "885".into(),
                ..Default::default()
            })),
        );
        agg
    }

    #[test]
    fn requires_principal_diagnosis() {
        let client = client_with_store();
        let mut claim = Claim::default();
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap());
        let err = client.process(&claim, &drg_upstream()).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn requires_drg_output_upstream() {
        let client = client_with_store();
        let mut claim = Claim::default();
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap());
        claim.billing_provider = Some(Provider {
            other_id: "010001".into(),
            ..Default::default()
        });
        let err = client.process(&claim, &AggregateOutput::new("C1")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
