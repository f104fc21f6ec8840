//! Campaign progress calculation (simple and composite strategies).
//!
//! [`calculate`] is a pure function of a campaign and its linked
//! transactions. The caller loads the data, stamps the result with a
//! generation and a timestamp via [`Calculation::into_snapshot`], and
//! decides what to do with a [`Strategy::FallbackSimple`] outcome.

use serde::Serialize;

use crate::aggregator::aggregate;
use crate::campaign::{Campaign, CampaignCriteria, CampaignKind, Criterion, TargetType, Transaction};
use crate::error::CoreError;
use crate::evaluator::{evaluate, measure, ratio_percentage, COMPLETE_PCT};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const GATE_ALL: &str = "all";
pub const GATE_COMPOSITE: &str = "composite";
pub const GATE_OFF: &str = "off";

/// Reason recorded when a composite campaign has no criteria payload.
const NO_CRITERIA_REASON: &str = "composite campaign has no criteria payload";

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Progress of a single criterion. Derived and never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriterionProgress {
    pub target_type: TargetType,
    pub target_value: f64,
    pub matched_transactions: usize,
    pub current_value: f64,
    /// Clamped to `[0, 100]`.
    pub percentage: f64,
    pub is_completed: bool,
}

/// Which calculation produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Simple,
    Composite,
    /// Composite campaign whose criteria could not be used; the simple
    /// ratio over `Campaign::target` was applied instead.
    FallbackSimple,
}

/// Complete derived state of a campaign at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub campaign_id: DbId,
    pub current_value: f64,
    pub percentage: f64,
    pub is_completed: bool,
    /// Empty unless the composite strategy ran.
    pub criteria_breakdown: Vec<CriterionProgress>,
    pub strategy: Strategy,
    pub counted_transactions: usize,
    pub computed_at: Timestamp,
    /// Monotonic per campaign; used to discard out-of-order results.
    pub generation: u64,
}

/// Result of [`calculate`] before it is stamped.
#[derive(Debug, Clone, PartialEq)]
pub struct Calculation {
    pub current_value: f64,
    pub percentage: f64,
    pub is_completed: bool,
    pub criteria_breakdown: Vec<CriterionProgress>,
    pub strategy: Strategy,
    /// Set only for [`Strategy::FallbackSimple`].
    pub fallback_reason: Option<String>,
    pub counted_transactions: usize,
}

impl Calculation {
    pub fn into_snapshot(
        self,
        campaign_id: DbId,
        generation: u64,
        computed_at: Timestamp,
    ) -> ProgressSnapshot {
        ProgressSnapshot {
            campaign_id,
            current_value: self.current_value,
            percentage: self.percentage,
            is_completed: self.is_completed,
            criteria_breakdown: self.criteria_breakdown,
            strategy: self.strategy,
            counted_transactions: self.counted_transactions,
            computed_at,
            generation,
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which campaign kinds honour `Campaign::accepted_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptanceGate {
    /// Gate simple and composite campaigns.
    #[default]
    All,
    /// Gate composite campaigns only.
    CompositeOnly,
    /// Count every linked transaction regardless of acceptance time.
    Disabled,
}

impl AcceptanceGate {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_ascii_lowercase().as_str() {
            GATE_ALL => Ok(Self::All),
            GATE_COMPOSITE => Ok(Self::CompositeOnly),
            GATE_OFF => Ok(Self::Disabled),
            _ => Err(CoreError::Validation(format!(
                "Invalid acceptance gate '{s}'. Must be one of: {GATE_ALL}, {GATE_COMPOSITE}, {GATE_OFF}"
            ))),
        }
    }

    pub fn applies_to(&self, kind: CampaignKind) -> bool {
        match self {
            Self::All => true,
            Self::CompositeOnly => kind == CampaignKind::Composite,
            Self::Disabled => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CalculationOptions {
    pub acceptance_gate: AcceptanceGate,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Transactions that count toward the campaign under the acceptance gate.
///
/// Transactions registered strictly before `accepted_at` are dropped when
/// the gate applies to the campaign's kind.
pub fn eligible_transactions(
    campaign: &Campaign,
    transactions: &[Transaction],
    gate: AcceptanceGate,
) -> Vec<Transaction> {
    match campaign.accepted_at {
        Some(accepted_at) if gate.applies_to(campaign.kind) => transactions
            .iter()
            .filter(|t| t.registered_at >= accepted_at)
            .cloned()
            .collect(),
        _ => transactions.to_vec(),
    }
}

/// Compute the progress of a campaign over its linked transactions.
pub fn calculate(
    campaign: &Campaign,
    transactions: &[Transaction],
    options: &CalculationOptions,
) -> Calculation {
    let eligible = eligible_transactions(campaign, transactions, options.acceptance_gate);

    match (campaign.kind, &campaign.criteria) {
        (CampaignKind::Simple, _) => simple(campaign, &eligible, Strategy::Simple),
        (CampaignKind::Composite, CampaignCriteria::Parsed(criteria)) => {
            composite(criteria, &eligible)
        }
        (CampaignKind::Composite, CampaignCriteria::Malformed(reason)) => Calculation {
            fallback_reason: Some(reason.clone()),
            ..simple(campaign, &eligible, Strategy::FallbackSimple)
        },
        (CampaignKind::Composite, CampaignCriteria::Absent) => Calculation {
            fallback_reason: Some(NO_CRITERIA_REASON.to_string()),
            ..simple(campaign, &eligible, Strategy::FallbackSimple)
        },
    }
}

fn simple(campaign: &Campaign, eligible: &[Transaction], strategy: Strategy) -> Calculation {
    let current_value = measure(campaign.target_type, eligible);
    let percentage = ratio_percentage(current_value, campaign.target);

    Calculation {
        current_value,
        percentage,
        is_completed: percentage >= COMPLETE_PCT,
        criteria_breakdown: Vec::new(),
        strategy,
        fallback_reason: None,
        counted_transactions: eligible.len(),
    }
}

fn composite(criteria: &[Criterion], eligible: &[Transaction]) -> Calculation {
    let breakdown: Vec<CriterionProgress> =
        criteria.iter().map(|c| evaluate(c, eligible)).collect();
    let outcome = aggregate(&breakdown);

    Calculation {
        current_value: outcome.current_value,
        percentage: outcome.percentage,
        is_completed: outcome.is_completed,
        criteria_breakdown: breakdown,
        strategy: Strategy::Composite,
        fallback_reason: None,
        counted_transactions: eligible.len(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
