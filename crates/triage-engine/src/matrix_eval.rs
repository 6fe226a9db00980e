use crate::classify::Exchange;
use crate::prompts;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};
use triage_core::{
    Category, ConditionOperator, DecisionMatrix, MatrixAttribute, MatrixEvaluation, RuleAction,
    RuleCondition, SanitizedMatrix, TriggeredRule, sanitize_matrix,
};
use triage_llm::{ChatBackend, LlmError, Message, ParseOutcome, parse_json_response};

/// What the matrix did to a proposal.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub category: Category,
    pub confidence: f64,
    /// A `flag_review` rule fired; the session routes to manual review.
    pub flagged_for_review: bool,
    pub evaluation: MatrixEvaluation,
}

/// Evaluate a sanitized matrix against extracted attributes, seeding the
/// accumulator from the model's proposal.
///
/// Rules run in priority order (descending, source order on ties) with AND
/// semantics over their conditions. The first `override` encountered wins;
/// later overrides still show up in `triggered_rules` but cannot replace
/// the category. `adjust_confidence` actions sum, and the final confidence
/// is clamped into `[0, 1]`. Deterministic: the same attributes and matrix
/// always produce the same record.
pub fn evaluate(
    matrix: &DecisionMatrix,
    attributes: &BTreeMap<String, Value>,
    proposed: Category,
    confidence: f64,
) -> EvaluationOutcome {
    let mut category = proposed;
    let mut overridden = false;
    let mut flagged = false;
    let mut adjustment_sum = 0.0;
    let mut triggered = Vec::new();

    for rule in matrix.rules_by_priority() {
        if !rule.conditions.iter().all(|c| condition_holds(attributes, c)) {
            continue;
        }
        debug!(rule = %rule.name, priority = rule.priority, action = rule.action.kind(), "rule triggered");
        triggered.push(TriggeredRule {
            rule_id: rule.rule_id.clone(),
            rule_name: rule.name.clone(),
            priority: rule.priority,
            action: rule.action.clone(),
        });

        match &rule.action {
            RuleAction::Override { target_category, .. } => {
                if !overridden {
                    category = *target_category;
                    overridden = true;
                }
            }
            RuleAction::AdjustConfidence { confidence_adjustment, .. } => {
                adjustment_sum += confidence_adjustment;
            }
            RuleAction::FlagReview { .. } => flagged = true,
        }
    }

    let final_confidence = (confidence + adjustment_sum).clamp(0.0, 1.0);
    if !triggered.is_empty() {
        info!(
            triggered = triggered.len(),
            overridden,
            flagged,
            confidence = final_confidence,
            "matrix evaluation"
        );
    }

    EvaluationOutcome {
        category,
        confidence: final_confidence,
        flagged_for_review: flagged,
        evaluation: MatrixEvaluation {
            matrix_version: matrix.version.clone(),
            triggered_rules: triggered,
            overridden,
            // The applied total, clamped so that original + total stays in
            // range.
            confidence_adjustment_total: final_confidence - confidence,
        },
    }
}

fn condition_holds(attributes: &BTreeMap<String, Value>, condition: &RuleCondition) -> bool {
    let Some(actual) = attributes.get(&condition.attribute) else {
        return false;
    };
    // An unknown attribute never drives a rule, not even `not_in`.
    if actual.as_str().is_some_and(|s| s.eq_ignore_ascii_case("unknown")) {
        return false;
    }

    match condition.operator {
        ConditionOperator::Eq => values_equal(actual, &condition.value),
        ConditionOperator::Ne => !values_equal(actual, &condition.value),
        ConditionOperator::Gt | ConditionOperator::Lt | ConditionOperator::Ge | ConditionOperator::Le => {
            let (Some(left), Some(right)) = (as_number(actual), as_number(&condition.value)) else {
                return false;
            };
            match condition.operator {
                ConditionOperator::Gt => left > right,
                ConditionOperator::Lt => left < right,
                ConditionOperator::Ge => left >= right,
                ConditionOperator::Le => left <= right,
                _ => unreachable!(),
            }
        }
        ConditionOperator::In => condition
            .value
            .as_array()
            .is_some_and(|list| list.iter().any(|v| values_equal(actual, v))),
        ConditionOperator::NotIn => condition
            .value
            .as_array()
            .is_some_and(|list| !list.iter().any(|v| values_equal(actual, v))),
    }
}

/// Equality that tolerates the model's casing and numeric strings.
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(a), Some(b)) = (a.as_str(), b.as_str()) {
        return a.trim().eq_ignore_ascii_case(b.trim());
    }
    if let (Some(a), Some(b)) = (as_number(a), as_number(b)) {
        return (a - b).abs() < f64::EPSILON;
    }
    a == b
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Generate a matrix from scratch with the model and run it through the
/// same sanitization as an admin save. Rules referencing attributes outside
/// the catalog are dropped, never invented.
pub async fn generate_matrix(
    backend: &impl ChatBackend,
    template: Option<&str>,
    catalog: &[MatrixAttribute],
) -> Result<(ParseOutcome<SanitizedMatrix>, Exchange), LlmError> {
    let system = prompts::matrix_generation_system_prompt(template, catalog);
    let messages = vec![
        Message::system(system),
        Message::user("Generate the decision matrix now."),
    ];
    let outcome = backend.chat(messages.clone()).await?;
    let exchange = Exchange::new(messages, &outcome, backend.provider());

    let parsed = match parse_json_response::<Value>(&outcome.content) {
        ParseOutcome::Parsed(value) => match sanitize_matrix(&value) {
            Ok(sanitized) => ParseOutcome::Parsed(sanitized),
            Err(e) => ParseOutcome::malformed(e.to_string(), outcome.content.clone()),
        },
        ParseOutcome::Malformed { reason, raw } => ParseOutcome::Malformed { reason, raw },
    };
    Ok((parsed, exchange))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matrix(rules: Value) -> DecisionMatrix {
        let raw = json!({
            "version": "1.0",
            "attributes": [
                {"name": "frequency", "type": "categorical",
                 "possibleValues": ["hourly", "daily", "weekly", "monthly"], "weight": 0.8},
                {"name": "complexity", "type": "categorical",
                 "possibleValues": ["low", "medium", "high"], "weight": 0.8},
                {"name": "volume", "type": "numeric", "weight": 0.7},
                {"name": "rule_based", "type": "boolean", "weight": 0.9}
            ],
            "rules": rules
        });
        let mut matrix = sanitize_matrix(&raw).expect("valid matrix").matrix;
        matrix.version = "1.0".into();
        matrix
    }

    fn attrs(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn override_rule_replaces_category() {
        let m = matrix(json!([{
            "ruleId": "r1", "name": "automation candidate", "priority": 95,
            "conditions": [
                {"attribute": "frequency", "operator": "in", "value": ["daily", "hourly"]},
                {"attribute": "complexity", "operator": "==", "value": "low"}
            ],
            "action": {"type": "override", "targetCategory": "RPA", "rationale": "repetitive"}
        }]));
        let out = evaluate(
            &m,
            &attrs(&[("frequency", json!("daily")), ("complexity", json!("low"))]),
            Category::Digitise,
            0.80,
        );
        assert_eq!(out.category, Category::Rpa);
        assert!(out.evaluation.overridden);
        assert_eq!(out.evaluation.triggered_rules.len(), 1);
        assert!((out.confidence - 0.80).abs() < f64::EPSILON);
    }

    #[test]
    fn first_override_wins_later_ones_still_recorded() {
        let m = matrix(json!([
            {"ruleId": "low", "name": "low priority override", "priority": 40,
             "conditions": [{"attribute": "complexity", "operator": "==", "value": "low"}],
             "action": {"type": "override", "targetCategory": "Simplify"}},
            {"ruleId": "high", "name": "high priority override", "priority": 90,
             "conditions": [{"attribute": "complexity", "operator": "==", "value": "low"}],
             "action": {"type": "override", "targetCategory": "RPA"}}
        ]));
        let out = evaluate(&m, &attrs(&[("complexity", json!("low"))]), Category::Digitise, 0.7);
        assert_eq!(out.category, Category::Rpa);
        assert_eq!(out.evaluation.triggered_rules.len(), 2);
        assert_eq!(out.evaluation.triggered_rules[0].rule_id, "high");
    }

    #[test]
    fn equal_priorities_resolve_by_source_order() {
        let m = matrix(json!([
            {"ruleId": "first", "name": "first in source", "priority": 50,
             "conditions": [{"attribute": "complexity", "operator": "==", "value": "low"}],
             "action": {"type": "override", "targetCategory": "Eliminate"}},
            {"ruleId": "second", "name": "second in source", "priority": 50,
             "conditions": [{"attribute": "complexity", "operator": "==", "value": "low"}],
             "action": {"type": "override", "targetCategory": "RPA"}}
        ]));
        let out = evaluate(&m, &attrs(&[("complexity", json!("low"))]), Category::Digitise, 0.7);
        assert_eq!(out.category, Category::Eliminate);
    }

    #[test]
    fn adjustments_sum_and_clamp() {
        let m = matrix(json!([
            {"ruleId": "a", "name": "boost one", "priority": 60,
             "conditions": [{"attribute": "rule_based", "operator": "==", "value": true}],
             "action": {"type": "adjust_confidence", "confidenceAdjustment": 0.05}},
            {"ruleId": "b", "name": "boost two", "priority": 50,
             "conditions": [{"attribute": "volume", "operator": ">=", "value": 100}],
             "action": {"type": "adjust_confidence", "confidenceAdjustment": 0.10}}
        ]));
        let out = evaluate(
            &m,
            &attrs(&[("rule_based", json!(true)), ("volume", json!(500))]),
            Category::Digitise,
            0.96,
        );
        assert!((out.confidence - 1.0).abs() < f64::EPSILON);
        // The recorded total is the applied delta, not the raw sum of 0.15.
        assert!((out.evaluation.confidence_adjustment_total - 0.04).abs() < 1e-9);
        assert!(!out.evaluation.overridden);
    }

    #[test]
    fn flag_review_marks_the_outcome() {
        let m = matrix(json!([{
            "ruleId": "r", "name": "sensitive data needs eyes", "priority": 80,
            "conditions": [{"attribute": "complexity", "operator": "==", "value": "high"}],
            "action": {"type": "flag_review", "rationale": "complex judgement"}
        }]));
        let out = evaluate(&m, &attrs(&[("complexity", json!("high"))]), Category::AiAgent, 0.9);
        assert!(out.flagged_for_review);
        assert_eq!(out.category, Category::AiAgent);
    }

    #[test]
    fn unknown_attribute_value_triggers_nothing() {
        let m = matrix(json!([{
            "ruleId": "r", "name": "not in monthly batch", "priority": 50,
            "conditions": [{"attribute": "frequency", "operator": "not_in", "value": ["monthly"]}],
            "action": {"type": "adjust_confidence", "confidenceAdjustment": 0.2}
        }]));
        let out = evaluate(&m, &attrs(&[("frequency", json!("unknown"))]), Category::Rpa, 0.7);
        assert!(out.evaluation.triggered_rules.is_empty());
        assert!((out.confidence - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_attribute_fails_the_condition() {
        let m = matrix(json!([{
            "ruleId": "r", "name": "needs volume", "priority": 50,
            "conditions": [{"attribute": "volume", "operator": ">", "value": 10}],
            "action": {"type": "flag_review"}
        }]));
        let out = evaluate(&m, &attrs(&[]), Category::Rpa, 0.7);
        assert!(!out.flagged_for_review);
    }

    #[test]
    fn categorical_comparison_ignores_model_casing() {
        let m = matrix(json!([{
            "ruleId": "r", "name": "daily work", "priority": 50,
            "conditions": [{"attribute": "frequency", "operator": "==", "value": "daily"}],
            "action": {"type": "adjust_confidence", "confidenceAdjustment": 0.1}
        }]));
        let out = evaluate(&m, &attrs(&[("frequency", json!("Daily"))]), Category::Rpa, 0.5);
        assert_eq!(out.evaluation.triggered_rules.len(), 1);
    }

    #[test]
    fn numeric_strings_compare_numerically() {
        let m = matrix(json!([{
            "ruleId": "r", "name": "bulk volume", "priority": 50,
            "conditions": [{"attribute": "volume", "operator": ">=", "value": 100}],
            "action": {"type": "adjust_confidence", "confidenceAdjustment": 0.1}
        }]));
        let out = evaluate(&m, &attrs(&[("volume", json!("500"))]), Category::Rpa, 0.5);
        assert_eq!(out.evaluation.triggered_rules.len(), 1);
    }

    #[test]
    fn inactive_rules_never_run() {
        let m = matrix(json!([{
            "ruleId": "r", "name": "disabled", "priority": 99, "active": false,
            "conditions": [{"attribute": "complexity", "operator": "==", "value": "low"}],
            "action": {"type": "override", "targetCategory": "Eliminate"}
        }]));
        let out = evaluate(&m, &attrs(&[("complexity", json!("low"))]), Category::Rpa, 0.7);
        assert_eq!(out.category, Category::Rpa);
        assert!(out.evaluation.triggered_rules.is_empty());
    }

    #[test]
    fn evaluation_is_deterministic() {
        let m = matrix(json!([
            {"ruleId": "a", "name": "one", "priority": 60,
             "conditions": [{"attribute": "rule_based", "operator": "==", "value": true}],
             "action": {"type": "adjust_confidence", "confidenceAdjustment": -0.2}},
            {"ruleId": "b", "name": "two", "priority": 60,
             "conditions": [{"attribute": "volume", "operator": "<", "value": 10}],
             "action": {"type": "flag_review"}}
        ]));
        let attributes = attrs(&[("rule_based", json!(true)), ("volume", json!(3))]);
        let first = evaluate(&m, &attributes, Category::AiAgent, 0.8);
        let second = evaluate(&m, &attributes, Category::AiAgent, 0.8);
        assert_eq!(first.evaluation, second.evaluation);
    }
}
