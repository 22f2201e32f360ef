pub mod drg;
pub mod esrd;
pub mod fqhc;
pub mod hha;
pub mod hhag;
pub mod hospice;
pub mod ioce;
pub mod ipf;
pub mod ipps;
pub mod irf;
pub mod irfg;
pub mod ltch;
pub mod mce;
pub mod opps;
pub mod snf;

use crate::model::{AggregateOutput, Claim, ModuleResult};

/// Every module name the orchestrator and claim validator recognize (§4.7).
pub const KNOWN_MODULE_NAMES: &[&str] = &[
    "drg", "mce", "ioce", "hhag", "irfg", "ipps", "opps", "ipf", "ltch", "snf", "hha", "irf",
    "hospice", "esrd", "fqhc",
];

/// Static dependency graph: each entry lists the modules that must run, and succeed, before the
/// keyed module can run (§4.7).
pub fn dependencies_of(module: &str) -> &'static [&'static str] {
    match module {
        "ipps" => &["drg"],
        "ipf" => &["drg"],
        "ltch" => &["drg"],
        "opps" => &["ioce"],
        "fqhc" => &["ioce"],
        "esrd" => &["ioce"],
        "irf" => &["irfg"],
        "hha" => &["hhag"],
        _ => &[],
    }
}

/// Uniform shape every module client implements (§4.6): a client owns its engine handle and is
/// invoked once per claim, receiving whatever upstream outputs its dependencies already
/// produced.
pub trait Module {
    fn name(&self) -> &'static str;

    fn validate(&self, claim: &Claim) -> Result<(), crate::error::Error>;

    fn process(
        &self,
        claim: &Claim,
        upstream: &AggregateOutput,
    ) -> Result<crate::model::ModuleOutput, crate::error::Error>;
}

/// Computes the transitive closure of `requested` over the dependency graph and returns it in
/// topological order (dependencies before dependents), per §4.7.
pub fn topological_closure(requested: &[String]) -> Vec<String> {
    let mut closure: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    fn visit(
        module: &str,
        seen: &mut std::collections::HashSet<String>,
        closure: &mut Vec<String>,
    ) {
        if seen.contains(module) {
            return;
        }
        seen.insert(module.to_string());
        for dep in dependencies_of(module) {
            visit(dep, seen, closure);
        }
        closure.push(module.to_string());
    }

    for module in requested {
        visit(module, &mut seen, &mut closure);
    }
    closure
}

pub fn module_result_succeeded(result: Option<&ModuleResult>) -> bool {
    matches!(result, Some(ModuleResult::Success(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_runs_dependencies_before_dependents() {
        let order = topological_closure(&["ipps".to_string()]);
        let drg_pos = order.iter().position(|m| m == "drg").unwrap();
        let ipps_pos = order.iter().position(|m| m == "ipps").unwrap();
        assert!(drg_pos < ipps_pos);
    }

    #[test]
    fn independent_modules_have_no_dependencies() {
        for m in ["mce", "ioce", "drg", "hhag", "irfg", "hospice", "snf"] {
            assert!(dependencies_of(m).is_empty());
        }
    }

    #[test]
    fn closure_deduplicates_shared_dependencies() {
        let order = topological_closure(&["ipps".to_string(), "ipf".to_string(), "ltch".to_string()]);
        assert_eq!(order.iter().filter(|m| *m == "drg").count(), 1);
    }
}
