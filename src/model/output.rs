use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One module's return code plus whatever numeric/enumerated fields it reports. Amounts are
/// carried as `f64` with at least 6 fractional digits of precision from the engine; enumerations
/// are carried as the vendor's string names, never raw ordinals (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrgOutput {
    pub return_code: String,
    pub final_drg_value: String,
    pub final_mdc_value: String,
    pub relative_weight: f64,
    pub geometric_mean_los: f64,
    pub arithmetic_mean_los: f64,
    pub poa_exempt: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MceOutput {
    pub return_code: String,
    /// Edit codes raised per submitted diagnosis/procedure code.
    pub edits_by_code: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IoceLineResult {
    pub line_number: i32,
    pub status_indicator: String,
    pub apc: String,
    pub payment_method_flag: String,
    pub edits: Vec<String>,
    pub hcpcs_description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IoceOutput {
    pub return_code: String,
    pub return_code_description: Option<String>,
    pub claim_processed_flag: String,
    pub claim_processed_flag_description: Option<String>,
    pub claim_edits: Vec<String>,
    pub lines: Vec<IoceLineResult>,
    pub diagnosis_descriptions: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricerOutput {
    pub return_code: String,
    pub total_payment: f64,
    pub fields: HashMap<String, f64>,
}

/// Output shape shared by the two standalone groupers (HHAG, IRFG): they assign a group code
/// (a HIPPS-style string) and a relative weight, with no payment calculation of their own — the
/// downstream pricer (HHA, IRF) applies the weight (§4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrouperOutput {
    pub return_code: String,
    pub group_code: String,
    pub weight: f64,
}

/// One output variant per module client (C6). Deliberately flat: module clients never see each
/// other's variants, only the orchestrator pattern-matches on these to feed dependents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "module", rename_all = "snake_case")]
pub enum ModuleOutput {
    Drg(DrgOutput),
    Mce(MceOutput),
    Ioce(IoceOutput),
    Grouper(GrouperOutput),
    Pricer(PricerOutput),
}

/// A module's result slot in the aggregate: either its output, or the error that stopped it.
/// Errors are carried as display strings (not the typed `Error`) because the aggregate must
/// remain serializable for callers inspecting results after the fact (§7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleResult {
    Success(ModuleOutput),
    Failure { message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateOutput {
    pub claim_id: String,
    pub modules: HashMap<String, ModuleResult>,
}

impl AggregateOutput {
    pub fn new(claim_id: impl Into<String>) -> Self {
        Self {
            claim_id: claim_id.into(),
            modules: HashMap::new(),
        }
    }
}
