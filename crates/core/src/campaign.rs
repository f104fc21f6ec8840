//! Campaign, criterion, transaction and link types.
//!
//! Composite campaigns store their criteria as a JSON payload that has been
//! observed both as a native array and as a JSON-encoded string holding that
//! array. [`CampaignCriteria::from_payload`] accepts both shapes and
//! validates the payload once, at load time; the rest of the engine only
//! ever sees typed [`Criterion`] values.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const KIND_SIMPLE: &str = "simple";
pub const KIND_COMPOSITE: &str = "composite";

pub const TARGET_VALUE: &str = "value";
pub const TARGET_QUANTITY: &str = "quantity";

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_PENDING: &str = "pending";

pub const CONTRACT_NEW: &str = "new";
pub const CONTRACT_RENEWAL: &str = "renewal";
pub const CONTRACT_EITHER: &str = "either";

/// Policy type values that mean "any category".
const ANY_POLICY_TYPES: &[&str] = &["", "any", "all", "*"];

/// Contract type filter values that accept both new and renewal contracts.
const EITHER_CONTRACT_TYPES: &[&str] = &["", CONTRACT_EITHER, "both"];

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a campaign measures progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignKind {
    /// A single target over all linked transactions.
    Simple,
    /// An AND of independent criteria.
    Composite,
}

impl CampaignKind {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            KIND_SIMPLE => Ok(Self::Simple),
            KIND_COMPOSITE => Ok(Self::Composite),
            _ => Err(CoreError::Validation(format!(
                "Invalid campaign kind '{s}'. Must be one of: {KIND_SIMPLE}, {KIND_COMPOSITE}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => KIND_SIMPLE,
            Self::Composite => KIND_COMPOSITE,
        }
    }
}

/// Whether a target is a monetary sum or a transaction count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Value,
    Quantity,
}

impl TargetType {
    /// Convert from a database or payload string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_ascii_lowercase().as_str() {
            TARGET_VALUE => Ok(Self::Value),
            TARGET_QUANTITY => Ok(Self::Quantity),
            _ => Err(CoreError::Validation(format!(
                "Invalid target type '{s}'. Must be one of: {TARGET_VALUE}, {TARGET_QUANTITY}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Value => TARGET_VALUE,
            Self::Quantity => TARGET_QUANTITY,
        }
    }
}

/// Lifecycle status of a campaign as set by operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Active,
    Completed,
    Pending,
}

impl CampaignStatus {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            STATUS_ACTIVE => Ok(Self::Active),
            STATUS_COMPLETED => Ok(Self::Completed),
            STATUS_PENDING => Ok(Self::Pending),
            _ => Err(CoreError::Validation(format!(
                "Invalid campaign status '{s}'. Must be one of: \
                 {STATUS_ACTIVE}, {STATUS_COMPLETED}, {STATUS_PENDING}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => STATUS_ACTIVE,
            Self::Completed => STATUS_COMPLETED,
            Self::Pending => STATUS_PENDING,
        }
    }
}

/// Contract type of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    New,
    Renewal,
}

impl ContractType {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_ascii_lowercase().as_str() {
            CONTRACT_NEW => Ok(Self::New),
            CONTRACT_RENEWAL => Ok(Self::Renewal),
            _ => Err(CoreError::Validation(format!(
                "Invalid contract type '{s}'. Must be one of: {CONTRACT_NEW}, {CONTRACT_RENEWAL}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => CONTRACT_NEW,
            Self::Renewal => CONTRACT_RENEWAL,
        }
    }
}

/// Which contract types a criterion accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContractTypeFilter {
    New,
    Renewal,
    #[default]
    Either,
}

impl ContractTypeFilter {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        let normalized = s.trim().to_ascii_lowercase();
        if EITHER_CONTRACT_TYPES.contains(&normalized.as_str()) {
            return Ok(Self::Either);
        }
        ContractType::from_str_value(&normalized).map(|ct| match ct {
            ContractType::New => Self::New,
            ContractType::Renewal => Self::Renewal,
        })
    }

    /// Whether a transaction with the given contract type passes the filter.
    pub fn accepts(&self, contract_type: ContractType) -> bool {
        match self {
            Self::Either => true,
            Self::New => contract_type == ContractType::New,
            Self::Renewal => contract_type == ContractType::Renewal,
        }
    }
}

/// Category filter of a criterion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PolicyTypeFilter {
    #[default]
    Any,
    Category(String),
}

impl PolicyTypeFilter {
    pub fn from_str_value(s: &str) -> Self {
        let trimmed = s.trim();
        if ANY_POLICY_TYPES
            .iter()
            .any(|any| trimmed.eq_ignore_ascii_case(any))
        {
            Self::Any
        } else {
            Self::Category(trimmed.to_string())
        }
    }

    /// Case-insensitive category match; `Any` matches everything.
    pub fn accepts(&self, category: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Category(expected) => expected.eq_ignore_ascii_case(category.trim()),
        }
    }
}

// ---------------------------------------------------------------------------
// Criterion
// ---------------------------------------------------------------------------

/// One AND-combined clause of a composite campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub policy_type: PolicyTypeFilter,
    pub target_type: TargetType,
    pub target_value: f64,
    pub min_value_per_policy: Option<f64>,
    pub contract_type: ContractTypeFilter,
}

impl Criterion {
    pub fn new(policy_type: PolicyTypeFilter, target_type: TargetType, target_value: f64) -> Self {
        Self {
            policy_type,
            target_type,
            target_value,
            min_value_per_policy: None,
            contract_type: ContractTypeFilter::Either,
        }
    }

    pub fn with_min_value(mut self, floor: f64) -> Self {
        self.min_value_per_policy = Some(floor);
        self
    }

    pub fn with_contract_type(mut self, filter: ContractTypeFilter) -> Self {
        self.contract_type = filter;
        self
    }
}

/// Raw shape of a criterion inside the stored payload.
#[derive(Debug, Deserialize)]
struct CriterionPayload {
    #[serde(default, alias = "policyType")]
    policy_type: Option<String>,
    #[serde(alias = "targetType")]
    target_type: String,
    #[serde(alias = "targetValue")]
    target_value: serde_json::Value,
    #[serde(default, alias = "minValuePerPolicy")]
    min_value_per_policy: Option<serde_json::Value>,
    #[serde(
        default,
        alias = "contractType",
        alias = "contract_type_filter",
        alias = "contractTypeFilter"
    )]
    contract_type: Option<String>,
}

impl CriterionPayload {
    fn into_criterion(self, index: usize) -> Result<Criterion, CoreError> {
        let target_type = TargetType::from_str_value(&self.target_type)
            .map_err(|e| CoreError::MalformedCriteria(format!("criteria[{index}]: {e}")))?;

        let target_value = number_field(&self.target_value)
            .ok_or_else(|| malformed(index, "target_value must be a finite number"))?;

        let min_value_per_policy = match self.min_value_per_policy {
            None | Some(serde_json::Value::Null) => None,
            Some(raw) => Some(
                number_field(&raw)
                    .ok_or_else(|| malformed(index, "min_value_per_policy must be a finite number"))?,
            ),
        };

        let contract_type = match self.contract_type.as_deref() {
            None => ContractTypeFilter::Either,
            Some(s) => ContractTypeFilter::from_str_value(s)
                .map_err(|e| CoreError::MalformedCriteria(format!("criteria[{index}]: {e}")))?,
        };

        Ok(Criterion {
            policy_type: self
                .policy_type
                .as_deref()
                .map(PolicyTypeFilter::from_str_value)
                .unwrap_or_default(),
            target_type,
            target_value,
            min_value_per_policy,
            contract_type,
        })
    }
}

fn malformed(index: usize, reason: &str) -> CoreError {
    CoreError::MalformedCriteria(format!("criteria[{index}]: {reason}"))
}

/// Read a finite number from a JSON number or a numeric string.
fn number_field(value: &serde_json::Value) -> Option<f64> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Parse a stored criteria payload into typed criteria.
///
/// Accepts a JSON array of criterion objects, or a JSON string whose
/// content is such an array. A string is unwrapped at most once.
pub fn parse_criteria(raw: &serde_json::Value) -> Result<Vec<Criterion>, CoreError> {
    match raw {
        serde_json::Value::String(encoded) => {
            let decoded: serde_json::Value = serde_json::from_str(encoded).map_err(|e| {
                CoreError::MalformedCriteria(format!("criteria string is not valid JSON: {e}"))
            })?;
            match decoded {
                serde_json::Value::Array(items) => parse_items(items),
                _ => Err(CoreError::MalformedCriteria(
                    "criteria string must encode a JSON array".to_string(),
                )),
            }
        }
        serde_json::Value::Array(items) => parse_items(items.clone()),
        other => Err(CoreError::MalformedCriteria(format!(
            "criteria must be an array or a JSON-encoded array, got {}",
            json_type_name(other)
        ))),
    }
}

fn parse_items(items: Vec<serde_json::Value>) -> Result<Vec<Criterion>, CoreError> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let payload: CriterionPayload = serde_json::from_value(item)
                .map_err(|e| CoreError::MalformedCriteria(format!("criteria[{i}]: {e}")))?;
            payload.into_criterion(i)
        })
        .collect()
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Criteria of a campaign after load-time validation.
#[derive(Debug, Clone, PartialEq)]
pub enum CampaignCriteria {
    /// No payload stored (the normal case for simple campaigns).
    Absent,
    Parsed(Vec<Criterion>),
    /// The payload could not be parsed; carries the reason for operators.
    Malformed(String),
}

impl CampaignCriteria {
    /// Validate a stored payload. A JSON `null` counts as absent.
    pub fn from_payload(raw: Option<&serde_json::Value>) -> Self {
        match raw {
            None | Some(serde_json::Value::Null) => Self::Absent,
            Some(value) => match parse_criteria(value) {
                Ok(criteria) => Self::Parsed(criteria),
                Err(e) => Self::Malformed(e.to_string()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A sales incentive with a completion target.
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub id: DbId,
    /// Seller the campaign was assigned to.
    pub user_id: Option<DbId>,
    pub name: String,
    pub kind: CampaignKind,
    /// Target type of a simple campaign; ignored for composite ones.
    pub target_type: TargetType,
    pub target: f64,
    pub criteria: CampaignCriteria,
    pub status: CampaignStatus,
    /// When set, only transactions registered on or after this instant count.
    pub accepted_at: Option<Timestamp>,
    /// Campaigns are never deleted, only deactivated.
    pub is_active: bool,
}

impl Campaign {
    /// An active simple campaign with no owner and no acceptance time.
    pub fn simple(id: DbId, target_type: TargetType, target: f64) -> Self {
        Self {
            id,
            user_id: None,
            name: format!("campaign-{id}"),
            kind: CampaignKind::Simple,
            target_type,
            target,
            criteria: CampaignCriteria::Absent,
            status: CampaignStatus::Active,
            accepted_at: None,
            is_active: true,
        }
    }

    /// An active composite campaign over already-validated criteria.
    pub fn composite(id: DbId, criteria: Vec<Criterion>) -> Self {
        Self {
            kind: CampaignKind::Composite,
            criteria: CampaignCriteria::Parsed(criteria),
            ..Self::simple(id, TargetType::Value, 0.0)
        }
    }

    pub fn with_user(mut self, user_id: DbId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_accepted_at(mut self, accepted_at: Timestamp) -> Self {
        self.accepted_at = Some(accepted_at);
        self
    }
}

/// An insurance policy sale, owned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: DbId,
    pub category: String,
    pub value: f64,
    pub contract_type: ContractType,
    pub registered_at: Timestamp,
}

/// Association between a campaign and a transaction counted toward it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub id: DbId,
    pub campaign_id: DbId,
    pub transaction_id: DbId,
    pub is_active: bool,
    pub linked_at: Timestamp,
}

/// An active link together with its transaction, when it could be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedTransaction {
    pub link: Link,
    pub transaction: Option<Transaction>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
