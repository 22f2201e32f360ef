//! Medicare Code Editor client (C6): shares the DRG module's demographic marshaling but has no
//! upstream dependency and reports edit lists instead of a grouped DRG.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::{EngineRegistry, EngineRequest, EngineValue};
use crate::error::Error;
use crate::model::{AggregateOutput, Claim, MceOutput, ModuleOutput};
use crate::version::DrgVersionTable;

pub const NAME: &str = "mce";

pub struct MceClient {
    registry: Arc<EngineRegistry>,
    versions: Arc<DrgVersionTable>,
}

impl MceClient {
    pub fn new(registry: Arc<EngineRegistry>, versions: Arc<DrgVersionTable>) -> Self {
        Self { registry, versions }
    }

    fn build_request(&self, claim: &Claim) -> Result<EngineRequest, Error> {
        let principal = claim.principal_dx.as_ref().ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "principal diagnosis is required for MCE editing".into(),
        })?;

        let mut req = EngineRequest::new();
        req.set("age", EngineValue::Int(claim.patient.age));
        req.set(
            "sex",
            EngineValue::Str(claim.patient.sex.clone().unwrap_or_else(|| "UNKNOWN".into())),
        );
        req.set("principal_dx", EngineValue::Str(principal.normalized_code()));
        let secondaries: Vec<EngineValue> = claim
            .secondary_dxs
            .iter()
            .map(|dx| EngineValue::Str(dx.normalized_code()))
            .collect();
        req.set("secondary_dxs", EngineValue::List(secondaries));
        Ok(req)
    }

    pub fn process(&self, claim: &Claim, _upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        let thru = claim.thru_date.ok_or_else(|| Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "thru_date is required for MCE version dispatch".into(),
        })?;
        let version = self.versions.resolve(thru, NAME)?;
        let request = self.build_request(claim)?;
        let response = self.registry.call(NAME, &version, "process", &request)?;

        let mut edits_by_code = HashMap::new();
        if let Some(code) = &claim.principal_dx {
            let edits = response.string_or_default(&format!("edits:{}", code.normalized_code()));
            if !edits.is_empty() {
                edits_by_code.insert(code.normalized_code(), vec![edits]);
            }
        }

        Ok(ModuleOutput::Mce(MceOutput {
            return_code: response.string_or_default("return_code"),
            edits_by_code,
        }))
    }
}

impl crate::modules::Module for MceClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, _claim: &Claim) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, claim: &Claim, upstream: &AggregateOutput) -> Result<ModuleOutput, Error> {
        MceClient::process(self, claim, upstream)
    }
}
