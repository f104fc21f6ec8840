//! Combines per-criterion progress into campaign-level progress.
//!
//! A composite campaign is an AND of its criteria, so the overall
//! percentage is the minimum over all criteria, snapping to exactly 100
//! only when every criterion is complete.

use crate::campaign::TargetType;
use crate::evaluator::COMPLETE_PCT;
use crate::progress::CriterionProgress;

/// Campaign-level result of a composite aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeOutcome {
    pub percentage: f64,
    pub is_completed: bool,
    /// Sum over value-typed criteria only.
    pub current_value: f64,
}

/// Aggregate per-criterion progress.
///
/// An empty set is never complete and reports 0%. Quantity-typed criteria
/// count toward completion but are excluded from `current_value`.
pub fn aggregate(criteria: &[CriterionProgress]) -> CompositeOutcome {
    let current_value: f64 = criteria
        .iter()
        .filter(|c| c.target_type == TargetType::Value)
        .map(|c| c.current_value)
        .sum();

    if criteria.is_empty() {
        return CompositeOutcome {
            percentage: 0.0,
            is_completed: false,
            current_value,
        };
    }

    let is_completed = criteria.iter().all(|c| c.is_completed);
    let percentage = if is_completed {
        COMPLETE_PCT
    } else {
        criteria
            .iter()
            .map(|c| c.percentage)
            .fold(COMPLETE_PCT, f64::min)
    };

    CompositeOutcome {
        percentage,
        is_completed,
        current_value,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
