use crate::error::Error;
use crate::model::claim::Claim;
use crate::modules::KNOWN_MODULE_NAMES;

/// Claim-level checks that must pass before any module client is invoked (§7). Per-module
/// clients layer their own additional pre-flight checks on top of this.
pub fn validate_claim(claim: &Claim) -> Result<(), Error> {
    for name in &claim.modules {
        if !KNOWN_MODULE_NAMES.contains(&name.as_str()) {
            return Err(Error::Validation {
                claim_id: claim.claim_id.clone(),
                reason: format!("unknown module name: {name}"),
            });
        }
    }

    let grouping_requested = claim
        .modules
        .iter()
        .any(|m| KNOWN_MODULE_NAMES.contains(&m.as_str()));
    if grouping_requested && claim.principal_dx.is_none() {
        return Err(Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: "principal diagnosis is required".into(),
        });
    }

    match (claim.from_date, claim.thru_date) {
        (Some(from), Some(thru)) if thru < from => {
            return Err(Error::Validation {
                claim_id: claim.claim_id.clone(),
                reason: format!("thru_date {thru} precedes from_date {from}"),
            });
        }
        (None, _) | (_, None) if !claim.modules.is_empty() => {
            return Err(Error::Validation {
                claim_id: claim.claim_id.clone(),
                reason: "from_date and thru_date are required".into(),
            });
        }
        _ => {}
    }

    if claim.los < claim.non_covered_days {
        return Err(Error::Validation {
            claim_id: claim.claim_id.clone(),
            reason: format!(
                "los {} is less than non_covered_days {}",
                claim.los, claim.non_covered_days
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::claim::{DiagnosisCode, PoaType};
    use chrono::NaiveDate;

    fn base_claim() -> Claim {
        let mut claim = Claim::default();
        claim.claim_id = "C1".into();
        claim.from_date = Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap());
        claim.los = 9;
        claim.modules = vec!["drg".into()];
        claim.principal_dx = Some(DiagnosisCode {
            code: "A021".into(),
            poa: PoaType::Y,
            ..Default::default()
        });
        claim
    }

    #[test]
    fn rejects_unknown_module() {
        let mut claim = base_claim();
        claim.modules = vec!["not_a_module".into()];
        assert!(validate_claim(&claim).is_err());
    }

    #[test]
    fn rejects_missing_principal_dx() {
        let mut claim = base_claim();
        claim.principal_dx = None;
        assert!(validate_claim(&claim).is_err());
    }

    #[test]
    fn rejects_thru_before_from() {
        let mut claim = base_claim();
        claim.thru_date = Some(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert!(validate_claim(&claim).is_err());
    }

    #[test]
    fn rejects_los_below_non_covered_days() {
        let mut claim = base_claim();
        claim.non_covered_days = 20;
        assert!(validate_claim(&claim).is_err());
    }

    #[test]
    fn accepts_well_formed_claim() {
        assert!(validate_claim(&base_claim()).is_ok());
    }
}
