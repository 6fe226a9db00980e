use crate::Category;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Versioned, admin-editable rule set that post-processes an LLM category
/// proposal. Instances are only produced by [`crate::sanitize_matrix`], so a
/// `DecisionMatrix` in hand always satisfies the schema invariants: every
/// condition refers to a declared attribute, categorical values are members
/// of `possible_values`, priorities and weights are in range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionMatrix {
    #[serde(default)]
    pub version: String,
    pub attributes: Vec<MatrixAttribute>,
    pub rules: Vec<MatrixRule>,
}

impl DecisionMatrix {
    pub fn attribute(&self, name: &str) -> Option<&MatrixAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Active rules in evaluation order: priority descending, source order
    /// as the stable tie-break.
    pub fn rules_by_priority(&self) -> Vec<&MatrixRule> {
        let mut rules: Vec<&MatrixRule> = self.rules.iter().filter(|r| r.active).collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        rules
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<String>,
    pub weight: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Categorical,
    Numeric,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRule {
    pub rule_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub priority: u8,
    #[serde(default = "default_true")]
    pub active: bool,
    pub conditions: Vec<RuleCondition>,
    pub action: RuleAction,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub attribute: String,
    pub operator: ConditionOperator,
    /// Scalar for comparison operators, list for `in` / `not_in`.
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
}

impl ConditionOperator {
    /// Operators whose `value` is a list rather than a scalar.
    pub fn takes_list(&self) -> bool {
        matches!(self, ConditionOperator::In | ConditionOperator::NotIn)
    }

    /// Operators that order numerically.
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            ConditionOperator::Gt | ConditionOperator::Lt | ConditionOperator::Ge | ConditionOperator::Le
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    #[serde(rename_all = "camelCase")]
    Override {
        target_category: Category,
        #[serde(default)]
        rationale: String,
    },
    #[serde(rename_all = "camelCase")]
    AdjustConfidence {
        confidence_adjustment: f64,
        #[serde(default)]
        rationale: String,
    },
    #[serde(rename_all = "camelCase")]
    FlagReview {
        #[serde(default)]
        rationale: String,
    },
}

impl RuleAction {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleAction::Override { .. } => "override",
            RuleAction::AdjustConfidence { .. } => "adjust_confidence",
            RuleAction::FlagReview { .. } => "flag_review",
        }
    }
}
