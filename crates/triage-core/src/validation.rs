use crate::{
    AttributeKind, Category, ConditionOperator, DecisionMatrix, MatrixAttribute, MatrixRule,
    RuleAction, RuleCondition,
};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("matrix is not a JSON object")]
    NotAnObject,

    #[error("matrix has no usable rules and no attributes")]
    Empty,
}

/// A matrix that survived sanitization, with one warning per fragment that
/// was coerced or dropped along the way.
#[derive(Debug)]
pub struct SanitizedMatrix {
    pub matrix: DecisionMatrix,
    pub warnings: Vec<String>,
}

/// Parse and sanitize a raw matrix document. Applied on every load and every
/// save, whether the document came from an admin or from a model.
///
/// Filter-and-warn, never silent repair: invalid fragments are dropped (or
/// coerced where the schema allows it — array target categories, out-of-range
/// priorities and weights) and each drop/coercion is recorded. The matrix is
/// usable as long as at least one rule survives or the attribute set is
/// non-empty.
pub fn sanitize_matrix(raw: &Value) -> Result<SanitizedMatrix, MatrixError> {
    let obj = raw.as_object().ok_or(MatrixError::NotAnObject)?;
    let mut warnings = Vec::new();

    let attributes = sanitize_attributes(obj.get("attributes"), &mut warnings);
    let rules = sanitize_rules(obj.get("rules"), &attributes, &mut warnings);

    if attributes.is_empty() && rules.is_empty() {
        return Err(MatrixError::Empty);
    }

    for w in &warnings {
        warn!(warning = %w, "matrix sanitization");
    }

    Ok(SanitizedMatrix {
        matrix: DecisionMatrix {
            version: obj
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            attributes,
            rules,
        },
        warnings,
    })
}

fn sanitize_attributes(raw: Option<&Value>, warnings: &mut Vec<String>) -> Vec<MatrixAttribute> {
    let mut attributes = Vec::new();
    let Some(list) = raw.and_then(Value::as_array) else {
        return attributes;
    };

    for (i, entry) in list.iter().enumerate() {
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        if name.is_empty() {
            warnings.push(format!("attribute {i} dropped: empty name"));
            continue;
        }

        let kind = match entry.get("type").cloned() {
            Some(v) => match serde_json::from_value::<AttributeKind>(v) {
                Ok(kind) => kind,
                Err(_) => {
                    warnings.push(format!("attribute {name:?} dropped: unknown type"));
                    continue;
                }
            },
            None => {
                warnings.push(format!("attribute {name:?} dropped: missing type"));
                continue;
            }
        };

        let possible_values: Vec<String> = entry
            .get("possibleValues")
            .and_then(Value::as_array)
            .map(|vals| {
                vals.iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        Value::Bool(b) => Some(b.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if kind == AttributeKind::Categorical && possible_values.is_empty() {
            warnings.push(format!("attribute {name:?} dropped: categorical without possibleValues"));
            continue;
        }

        let mut weight = entry.get("weight").and_then(Value::as_f64).unwrap_or(1.0);
        if !(0.0..=1.0).contains(&weight) {
            warnings.push(format!("attribute {name:?}: weight {weight} clamped into [0, 1]"));
            weight = weight.clamp(0.0, 1.0);
        }

        attributes.push(MatrixAttribute {
            name,
            kind,
            possible_values,
            weight,
            description: entry
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    attributes
}

fn sanitize_rules(
    raw: Option<&Value>,
    attributes: &[MatrixAttribute],
    warnings: &mut Vec<String>,
) -> Vec<MatrixRule> {
    let mut rules = Vec::new();
    let Some(list) = raw.and_then(Value::as_array) else {
        return rules;
    };

    for (i, entry) in list.iter().enumerate() {
        let rule_id = entry
            .get("ruleId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        if rule_id.is_empty() || name.is_empty() {
            warnings.push(format!("rule {i} dropped: missing ruleId or name"));
            continue;
        }

        let mut priority = entry.get("priority").and_then(Value::as_f64).unwrap_or(0.0);
        if !(0.0..=100.0).contains(&priority) {
            warnings.push(format!("rule {name:?}: priority {priority} clamped into [0, 100]"));
            priority = priority.clamp(0.0, 100.0);
        }

        let Some(action) = sanitize_action(entry.get("action"), &name, warnings) else {
            continue;
        };

        let mut conditions = Vec::new();
        for cond in entry
            .get("conditions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            if let Some(valid) = sanitize_condition(cond, attributes, &name, warnings) {
                conditions.push(valid);
            }
        }
        if conditions.is_empty() {
            warnings.push(format!("rule {name:?} dropped: no valid conditions"));
            continue;
        }

        rules.push(MatrixRule {
            rule_id,
            name,
            description: entry
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            priority: priority.round() as u8,
            active: entry.get("active").and_then(Value::as_bool).unwrap_or(true),
            conditions,
            action,
        });
    }

    rules
}

fn sanitize_action(raw: Option<&Value>, rule: &str, warnings: &mut Vec<String>) -> Option<RuleAction> {
    let Some(action) = raw else {
        warnings.push(format!("rule {rule:?} dropped: missing action"));
        return None;
    };
    match action.get("type").and_then(Value::as_str) {
        Some("override") => {
            let Some(target) = action.get("targetCategory") else {
                warnings.push(format!("rule {rule:?} dropped: missing targetCategory"));
                return None;
            };
            // Models sometimes emit an array here; coerce to the first element.
            let target_str = match target {
                Value::Array(items) => {
                    let first = items.first().and_then(Value::as_str);
                    if let Some(first) = first {
                        warnings.push(format!(
                            "rule {rule:?}: array targetCategory coerced to first element {first:?}"
                        ));
                    }
                    first
                }
                Value::String(s) => Some(s.as_str()),
                _ => None,
            };
            match target_str.and_then(Category::parse_lenient) {
                Some(target_category) => Some(RuleAction::Override {
                    target_category,
                    rationale: action_rationale(action),
                }),
                None => {
                    warnings.push(format!("rule {rule:?} dropped: invalid targetCategory"));
                    None
                }
            }
        }
        Some("adjust_confidence") => {
            let Some(mut adjustment) = action.get("confidenceAdjustment").and_then(Value::as_f64) else {
                warnings.push(format!("rule {rule:?} dropped: missing confidenceAdjustment"));
                return None;
            };
            if !(-1.0..=1.0).contains(&adjustment) {
                warnings.push(format!(
                    "rule {rule:?}: confidenceAdjustment {adjustment} clamped into [-1, 1]"
                ));
                adjustment = adjustment.clamp(-1.0, 1.0);
            }
            Some(RuleAction::AdjustConfidence {
                confidence_adjustment: adjustment,
                rationale: action_rationale(action),
            })
        }
        Some("flag_review") => Some(RuleAction::FlagReview {
            rationale: action_rationale(action),
        }),
        other => {
            warnings.push(format!("rule {rule:?} dropped: unknown action type {other:?}"));
            None
        }
    }
}

fn action_rationale(action: &Value) -> String {
    action
        .get("rationale")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn sanitize_condition(
    raw: &Value,
    attributes: &[MatrixAttribute],
    rule: &str,
    warnings: &mut Vec<String>,
) -> Option<RuleCondition> {
    let attr_name = raw.get("attribute").and_then(Value::as_str).unwrap_or_default();
    let Some(attribute) = attributes.iter().find(|a| a.name == attr_name) else {
        warnings.push(format!("rule {rule:?}: condition dropped, unknown attribute {attr_name:?}"));
        return None;
    };

    let operator = match raw.get("operator").cloned() {
        Some(v) => match serde_json::from_value::<ConditionOperator>(v) {
            Ok(op) => op,
            Err(_) => {
                warnings.push(format!("rule {rule:?}: condition on {attr_name:?} dropped, unknown operator"));
                return None;
            }
        },
        None => {
            warnings.push(format!("rule {rule:?}: condition on {attr_name:?} dropped, missing operator"));
            return None;
        }
    };

    let value = raw.get("value").cloned().unwrap_or(Value::Null);

    if operator.takes_list() {
        let Some(items) = value.as_array() else {
            warnings.push(format!(
                "rule {rule:?}: condition on {attr_name:?} dropped, {op} requires a list",
                op = if operator == ConditionOperator::In { "in" } else { "not_in" }
            ));
            return None;
        };
        if attribute.kind == AttributeKind::Categorical {
            for item in items {
                let member = item
                    .as_str()
                    .map(|s| attribute.possible_values.iter().any(|v| v == s))
                    .unwrap_or(false);
                if !member {
                    warnings.push(format!(
                        "rule {rule:?}: condition dropped, {item} is not a possible value of {attr_name:?}"
                    ));
                    return None;
                }
            }
        }
    } else {
        if value.is_array() {
            warnings.push(format!(
                "rule {rule:?}: condition on {attr_name:?} dropped, scalar operator given a list"
            ));
            return None;
        }
        match attribute.kind {
            AttributeKind::Categorical => {
                let member = value
                    .as_str()
                    .map(|s| attribute.possible_values.iter().any(|v| v == s))
                    .unwrap_or(false);
                if operator.is_ordering() {
                    warnings.push(format!(
                        "rule {rule:?}: condition dropped, ordering operator on categorical {attr_name:?}"
                    ));
                    return None;
                }
                if !member {
                    warnings.push(format!(
                        "rule {rule:?}: condition dropped, {value} is not a possible value of {attr_name:?}"
                    ));
                    return None;
                }
            }
            AttributeKind::Numeric => {
                if value.as_f64().is_none() {
                    warnings.push(format!(
                        "rule {rule:?}: condition dropped, numeric {attr_name:?} compared to non-number"
                    ));
                    return None;
                }
            }
            AttributeKind::Boolean => {
                if !value.is_boolean() || operator.is_ordering() {
                    warnings.push(format!(
                        "rule {rule:?}: condition dropped, boolean {attr_name:?} needs ==/!= with a bool"
                    ));
                    return None;
                }
            }
        }
    }

    Some(RuleCondition {
        attribute: attribute.name.clone(),
        operator,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_matrix() -> Value {
        json!({
            "version": "1.0",
            "attributes": [
                {
                    "name": "frequency",
                    "type": "categorical",
                    "possibleValues": ["hourly", "daily", "weekly", "monthly"],
                    "weight": 0.8,
                    "description": "How often the process runs"
                },
                {
                    "name": "volume",
                    "type": "numeric",
                    "weight": 0.6
                },
                {
                    "name": "rule_based",
                    "type": "boolean",
                    "weight": 0.9
                }
            ],
            "rules": [
                {
                    "ruleId": "r-automation",
                    "name": "High-frequency rule-based work",
                    "priority": 95,
                    "active": true,
                    "conditions": [
                        {"attribute": "frequency", "operator": "in", "value": ["daily", "hourly"]},
                        {"attribute": "rule_based", "operator": "==", "value": true}
                    ],
                    "action": {"type": "override", "targetCategory": "RPA", "rationale": "repetitive"}
                }
            ]
        })
    }

    #[test]
    fn valid_matrix_passes_without_warnings() {
        let out = sanitize_matrix(&raw_matrix()).unwrap();
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert_eq!(out.matrix.attributes.len(), 3);
        assert_eq!(out.matrix.rules.len(), 1);
    }

    #[test]
    fn array_target_category_coerced_to_first() {
        let mut raw = raw_matrix();
        raw["rules"][0]["action"]["targetCategory"] = json!(["AI Agent", "RPA"]);
        let out = sanitize_matrix(&raw).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("coerced")));
        match &out.matrix.rules[0].action {
            RuleAction::Override { target_category, .. } => assert_eq!(*target_category, Category::AiAgent),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn unknown_attribute_condition_dropped_then_rule_dropped() {
        let mut raw = raw_matrix();
        raw["rules"][0]["conditions"] = json!([
            {"attribute": "does_not_exist", "operator": "==", "value": "x"}
        ]);
        let out = sanitize_matrix(&raw).unwrap();
        assert!(out.matrix.rules.is_empty());
        assert!(out.warnings.iter().any(|w| w.contains("unknown attribute")));
        assert!(out.warnings.iter().any(|w| w.contains("no valid conditions")));
    }

    #[test]
    fn categorical_value_must_be_member() {
        let mut raw = raw_matrix();
        raw["rules"][0]["conditions"] = json!([
            {"attribute": "frequency", "operator": "==", "value": "yearly"}
        ]);
        let out = sanitize_matrix(&raw).unwrap();
        assert!(out.matrix.rules.is_empty());
    }

    #[test]
    fn priority_and_weight_are_clamped() {
        let mut raw = raw_matrix();
        raw["rules"][0]["priority"] = json!(180);
        raw["attributes"][0]["weight"] = json!(3.5);
        let out = sanitize_matrix(&raw).unwrap();
        assert_eq!(out.matrix.rules[0].priority, 100);
        assert!((out.matrix.attributes[0].weight - 1.0).abs() < f64::EPSILON);
        assert_eq!(out.warnings.len(), 2);
    }

    #[test]
    fn adjustment_clamped_into_unit_interval() {
        let mut raw = raw_matrix();
        raw["rules"][0]["action"] = json!({"type": "adjust_confidence", "confidenceAdjustment": 2.0});
        let out = sanitize_matrix(&raw).unwrap();
        match &out.matrix.rules[0].action {
            RuleAction::AdjustConfidence { confidence_adjustment, .. } => {
                assert!((confidence_adjustment - 1.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn scalar_list_mismatch_drops_condition() {
        let mut raw = raw_matrix();
        raw["rules"][0]["conditions"] = json!([
            {"attribute": "frequency", "operator": "in", "value": "daily"},
            {"attribute": "volume", "operator": ">", "value": [10]}
        ]);
        let out = sanitize_matrix(&raw).unwrap();
        assert!(out.matrix.rules.is_empty());
        assert_eq!(
            out.warnings.iter().filter(|w| w.contains("dropped")).count(),
            3,
            "{:?}",
            out.warnings
        );
    }

    #[test]
    fn empty_matrix_is_rejected() {
        let err = sanitize_matrix(&json!({"attributes": [], "rules": []})).unwrap_err();
        assert!(matches!(err, MatrixError::Empty));
    }

    #[test]
    fn attributes_alone_keep_the_matrix_usable() {
        let mut raw = raw_matrix();
        raw["rules"] = json!([]);
        let out = sanitize_matrix(&raw).unwrap();
        assert!(out.matrix.rules.is_empty());
        assert_eq!(out.matrix.attributes.len(), 3);
    }

    #[test]
    fn reserialization_is_stable() {
        let out = sanitize_matrix(&raw_matrix()).unwrap();
        let json = serde_json::to_value(&out.matrix).unwrap();
        let again = sanitize_matrix(&json).unwrap();
        assert!(again.warnings.is_empty());
        assert_eq!(again.matrix, out.matrix);
    }
}
