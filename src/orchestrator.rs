//! Pipeline engine / orchestrator (C7). Holds the module dependency graph and runs the
//! transitive closure of a claim's requested modules in topological order, aggregating each
//! module's result. Grounded structurally on the teacher's `build_datasets/src/main.rs`
//! multi-stage pipeline (there expressed as `tokio::try_join!` over async download/enrich
//! stages); the orchestrator's pipeline is synchronous since module clients run on worker
//! threads, not async tasks (§5), so the staged `tokio::try_join!` shape becomes a plain
//! topological loop instead.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::{AggregateOutput, Claim, ModuleResult};
use crate::modules::{self, Module};
use crate::refdata::ReferenceStore;
use crate::version::DrgVersionTable;

/// Stateless across claims (§4.7): all per-claim state lives in the `AggregateOutput` returned
/// from `process`. Module clients themselves hold the mutable state (engine registry handles,
/// the DRG reconfigure lock).
pub struct Orchestrator {
    clients: HashMap<&'static str, Box<dyn Module>>,
}

impl Orchestrator {
    /// Builds one client per entry in [`modules::KNOWN_MODULE_NAMES`], wired to the shared engine
    /// registry, reference store, and DRG version table.
    pub fn new(
        registry: Arc<crate::engine::EngineRegistry>,
        refdata: Arc<ReferenceStore>,
        versions: Arc<DrgVersionTable>,
    ) -> Self {
        let mut clients: HashMap<&'static str, Box<dyn Module>> = HashMap::new();
        clients.insert(
            "drg",
            Box::new(modules::drg::DrgClient::new(registry.clone(), versions.clone())),
        );
        clients.insert(
            "mce",
            Box::new(modules::mce::MceClient::new(registry.clone(), versions)),
        );
        clients.insert("ioce", Box::new(modules::ioce::IoceClient::new(registry.clone())));
        clients.insert("hhag", Box::new(modules::hhag::HhagClient::new(registry.clone())));
        clients.insert("irfg", Box::new(modules::irfg::IrfgClient::new(registry.clone())));
        clients.insert(
            "ipps",
            Box::new(modules::ipps::IppsClient::new(registry.clone(), refdata.clone())),
        );
        clients.insert(
            "opps",
            Box::new(modules::opps::OppsClient::new(registry.clone(), refdata.clone())),
        );
        clients.insert(
            "ipf",
            Box::new(modules::ipf::IpfClient::new(registry.clone(), refdata.clone())),
        );
        clients.insert(
            "ltch",
            Box::new(modules::ltch::LtchClient::new(registry.clone(), refdata.clone())),
        );
        clients.insert(
            "snf",
            Box::new(modules::snf::SnfClient::new(registry.clone(), refdata.clone())),
        );
        clients.insert(
            "hospice",
            Box::new(modules::hospice::HospiceClient::new(registry.clone(), refdata.clone())),
        );
        clients.insert(
            "esrd",
            Box::new(modules::esrd::EsrdClient::new(registry.clone(), refdata.clone())),
        );
        clients.insert(
            "fqhc",
            Box::new(modules::fqhc::FqhcClient::new(registry.clone(), refdata.clone())),
        );
        clients.insert("hha", Box::new(modules::hha::HhaClient::new(registry.clone())));
        clients.insert("irf", Box::new(modules::irf::IrfClient::new(registry)));

        Self { clients }
    }

    /// Reads `claim.modules`, computes the transitive closure over the dependency graph, runs
    /// each module in topological order, and aggregates the results. A module whose dependency
    /// failed (or was never requested) is skipped with its own error recorded in its slot;
    /// sibling branches with no shared dependency continue regardless (§7).
    pub fn process(&self, claim: &Claim) -> AggregateOutput {
        let order = modules::topological_closure(&claim.modules);
        let mut aggregate = AggregateOutput::new(claim.claim_id.clone());

        for name in order {
            let deps = modules::dependencies_of(&name);
            let blocked = deps
                .iter()
                .any(|dep| !modules::module_result_succeeded(aggregate.modules.get(*dep)));
            if blocked {
                let reason = format!("skipped: upstream dependency {deps:?} did not succeed");
                warn!(module = %name, claim_id = %claim.claim_id, "{reason}");
                aggregate.modules.insert(name, ModuleResult::Failure { message: reason });
                continue;
            }

            let Some(client) = self.clients.get(name.as_str()) else {
                aggregate.modules.insert(
                    name.clone(),
                    ModuleResult::Failure {
                        message: format!("no client registered for module {name}"),
                    },
                );
                continue;
            };

            debug!(module = %name, claim_id = %claim.claim_id, "running module");
            match client.validate(claim).and_then(|()| client.process(claim, &aggregate)) {
                Ok(output) => {
                    aggregate.modules.insert(name, ModuleResult::Success(output));
                }
                Err(err) => {
                    warn!(module = %name, claim_id = %claim.claim_id, error = %err, "module failed");
                    aggregate.modules.insert(
                        name,
                        ModuleResult::Failure { message: err.to_string() },
                    );
                }
            }
        }

        aggregate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::EchoEngine;
    use crate::engine::EngineRegistry;
    use crate::model::claim::{DiagnosisCode, OasisAssessment};
    use crate::model::ModuleOutput;
    use chrono::NaiveDate;
    use std::collections::HashMap as StdHashMap;

    // hha/hhag and mce need no reference-data rows, so the dependency-graph behavior can be
    // exercised without a populated ReferenceStore (ipps/opps-style clients all require one).

    fn registry_with(names: &[&str]) -> Arc<EngineRegistry> {
        let registry = Arc::new(EngineRegistry::new());
        for name in names {
            registry.register(
                Arc::new(EchoEngine {
                    name: name.to_string(),
                    version: "421".to_string(),
                }),
                std::path::PathBuf::from(format!("jars/pricers/{name}.jar")),
            );
        }
        registry
    }

    fn orchestrator_with(registry: Arc<EngineRegistry>) -> Orchestrator {
        let refdata = Arc::new(ReferenceStore::open_in_memory().unwrap());
        let versions = Arc::new(DrgVersionTable::new(10, 1));
        versions.mark_loaded("421");
        Orchestrator::new(registry, refdata, versions)
    }

    fn claim_with_oasis(modules: Vec<&str>) -> Claim {
        let mut claim = Claim::default();
        claim.claim_id = "C1".into();
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap());
        let mut items = StdHashMap::new();
        items.insert("M1800".to_string(), "02".to_string());
        claim.oasis = Some(OasisAssessment { items });
        claim.modules = modules.into_iter().map(String::from).collect();
        claim
    }

    #[test]
    fn runs_hhag_before_dependent_hha() {
        let orchestrator = orchestrator_with(registry_with(&["hhag", "hha"]));
        let claim = claim_with_oasis(vec!["hha"]);
        let aggregate = orchestrator.process(&claim);

        assert!(matches!(
            aggregate.modules.get("hhag"),
            Some(ModuleResult::Success(ModuleOutput::Grouper(_)))
        ));
        assert!(matches!(
            aggregate.modules.get("hha"),
            Some(ModuleResult::Success(ModuleOutput::Pricer(_)))
        ));
    }

    #[test]
    fn dependent_is_skipped_when_upstream_fails() {
        // Only "hha" has an engine registered; "hhag" has none for version 421, so it fails and
        // "hha" must be skipped rather than run against a missing grouper output.
        let orchestrator = orchestrator_with(registry_with(&["hha"]));
        let claim = claim_with_oasis(vec!["hha"]);
        let aggregate = orchestrator.process(&claim);

        assert!(matches!(aggregate.modules.get("hhag"), Some(ModuleResult::Failure { .. })));
        assert!(matches!(aggregate.modules.get("hha"), Some(ModuleResult::Failure { .. })));
    }

    #[test]
    fn unrelated_branch_runs_independently_of_a_failing_one() {
        // mce has no dependency on hhag, so it must still succeed even though hhag fails.
        let orchestrator = orchestrator_with(registry_with(&["mce"]));
        let mut claim = claim_with_oasis(vec!["hhag", "mce"]);
        claim.patient.age = 65;
        claim.principal_dx = Some(DiagnosisCode {
            code: "Z059".into(),
            ..Default::default()
        });
        let aggregate = orchestrator.process(&claim);

        assert!(matches!(aggregate.modules.get("hhag"), Some(ModuleResult::Failure { .. })));
        assert!(matches!(
            aggregate.modules.get("mce"),
            Some(ModuleResult::Success(ModuleOutput::Mce(_)))
        ));
    }
}
