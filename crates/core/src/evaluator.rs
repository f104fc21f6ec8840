//! Per-criterion matching and progress evaluation.
//!
//! Pure functions: no I/O, deterministic for identical inputs.

use crate::campaign::{Criterion, TargetType, Transaction};
use crate::progress::CriterionProgress;

/// Percentage at which a target counts as completed.
pub const COMPLETE_PCT: f64 = 100.0;

/// Ratio of `current` to `target` as a percentage clamped to `[0, 100]`.
///
/// A target that is zero, negative or not finite yields 0 rather than an
/// error, as does a non-finite ratio.
pub fn ratio_percentage(current: f64, target: f64) -> f64 {
    if !(target.is_finite() && target > 0.0) {
        return 0.0;
    }
    let pct = current / target * 100.0;
    if pct.is_nan() {
        return 0.0;
    }
    pct.clamp(0.0, COMPLETE_PCT)
}

/// Whether a transaction satisfies every filter of the criterion.
pub fn matches(criterion: &Criterion, transaction: &Transaction) -> bool {
    if !criterion.policy_type.accepts(&transaction.category) {
        return false;
    }
    if let Some(floor) = criterion.min_value_per_policy {
        if transaction.value < floor {
            return false;
        }
    }
    criterion.contract_type.accepts(transaction.contract_type)
}

/// Sum of values or count of transactions, depending on the target type.
pub fn measure<'a>(
    target_type: TargetType,
    transactions: impl IntoIterator<Item = &'a Transaction>,
) -> f64 {
    match target_type {
        TargetType::Value => transactions.into_iter().map(|t| t.value).sum(),
        TargetType::Quantity => transactions.into_iter().count() as f64,
    }
}

/// Evaluate one criterion against the eligible transactions of a campaign.
pub fn evaluate(criterion: &Criterion, transactions: &[Transaction]) -> CriterionProgress {
    let matching: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| matches(criterion, t))
        .collect();

    let current_value = measure(criterion.target_type, matching.iter().copied());
    let percentage = ratio_percentage(current_value, criterion.target_value);

    CriterionProgress {
        target_type: criterion.target_type,
        target_value: criterion.target_value,
        matched_transactions: matching.len(),
        current_value,
        percentage,
        is_completed: percentage >= COMPLETE_PCT,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::campaign::{ContractType, ContractTypeFilter, PolicyTypeFilter};

    fn tx(id: i64, category: &str, value: f64, contract_type: ContractType) -> Transaction {
        Transaction {
            id,
            category: category.to_string(),
            value,
            contract_type,
            registered_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    fn auto_value(target: f64) -> Criterion {
        Criterion::new(
            PolicyTypeFilter::Category("auto".into()),
            TargetType::Value,
            target,
        )
    }

    // -- ratio_percentage -----------------------------------------------------

    #[test]
    fn ratio_zero_target_is_zero() {
        assert_eq!(ratio_percentage(500.0, 0.0), 0.0);
    }

    #[test]
    fn ratio_negative_target_is_zero() {
        assert_eq!(ratio_percentage(500.0, -10.0), 0.0);
    }

    #[test]
    fn ratio_is_clamped_to_hundred() {
        assert_eq!(ratio_percentage(300.0, 100.0), 100.0);
    }

    #[test]
    fn ratio_negative_current_is_clamped_to_zero() {
        assert_eq!(ratio_percentage(-50.0, 100.0), 0.0);
    }

    #[test]
    fn ratio_infinite_target_is_zero() {
        assert_eq!(ratio_percentage(10.0, f64::INFINITY), 0.0);
    }

    // -- matches --------------------------------------------------------------

    #[test]
    fn category_filter_rejects_other_categories() {
        let criterion = auto_value(100.0);
        assert!(matches(&criterion, &tx(1, "Auto", 10.0, ContractType::New)));
        assert!(!matches(&criterion, &tx(2, "life", 10.0, ContractType::New)));
    }

    #[test]
    fn floor_is_inclusive() {
        let criterion = auto_value(100.0).with_min_value(1000.0);
        assert!(matches(&criterion, &tx(1, "auto", 1000.0, ContractType::New)));
        assert!(!matches(&criterion, &tx(2, "auto", 999.99, ContractType::New)));
    }

    #[test]
    fn contract_filter_applies() {
        let criterion = auto_value(100.0).with_contract_type(ContractTypeFilter::Renewal);
        assert!(!matches(&criterion, &tx(1, "auto", 10.0, ContractType::New)));
        assert!(matches(&criterion, &tx(2, "auto", 10.0, ContractType::Renewal)));
    }

    // -- evaluate -------------------------------------------------------------

    #[test]
    fn value_criterion_sums_matching_values() {
        let txs = vec![
            tx(1, "auto", 20_000.0, ContractType::New),
            tx(2, "auto", 10_000.0, ContractType::Renewal),
            tx(3, "life", 99_000.0, ContractType::New),
        ];
        let progress = evaluate(&auto_value(50_000.0), &txs);
        assert_eq!(progress.current_value, 30_000.0);
        assert_eq!(progress.percentage, 60.0);
        assert_eq!(progress.matched_transactions, 2);
        assert!(!progress.is_completed);
    }

    #[test]
    fn quantity_criterion_counts_matches() {
        let criterion = Criterion::new(PolicyTypeFilter::Any, TargetType::Quantity, 2.0);
        let txs = vec![
            tx(1, "auto", 1.0, ContractType::New),
            tx(2, "life", 1.0, ContractType::New),
        ];
        let progress = evaluate(&criterion, &txs);
        assert_eq!(progress.current_value, 2.0);
        assert_eq!(progress.percentage, 100.0);
        assert!(progress.is_completed);
    }

    #[test]
    fn non_positive_target_never_completes() {
        let txs = vec![tx(1, "auto", 1_000.0, ContractType::New)];
        for target in [0.0, -1.0] {
            let progress = evaluate(&auto_value(target), &txs);
            assert_eq!(progress.percentage, 0.0);
            assert!(!progress.is_completed);
            assert_eq!(progress.current_value, 1_000.0);
        }
    }

    #[test]
    fn no_transactions_yields_zero() {
        let progress = evaluate(&auto_value(10.0), &[]);
        assert_eq!(progress.current_value, 0.0);
        assert_eq!(progress.percentage, 0.0);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let txs = vec![
            tx(1, "auto", 12_345.67, ContractType::New),
            tx(2, "auto", 0.33, ContractType::New),
        ];
        let criterion = auto_value(40_000.0);
        assert_eq!(evaluate(&criterion, &txs), evaluate(&criterion, &txs));
    }
}
