use triage_core::{AttributeKind, MatrixAttribute};

/// Prompt artifact ids in the content store. The versioned copy wins when
/// present; the compiled-in defaults below are the fallback.
pub const CLASSIFICATION_PROMPT_ID: &str = "classification";
pub const CLARIFICATION_PROMPT_ID: &str = "clarification";
pub const EXTRACTION_PROMPT_ID: &str = "attribute-extraction";
pub const MATRIX_GENERATION_PROMPT_ID: &str = "matrix-generation";

pub fn default_prompt(id: &str) -> Option<&'static str> {
    match id {
        CLASSIFICATION_PROMPT_ID => Some(CLASSIFICATION_DEFAULT),
        CLARIFICATION_PROMPT_ID => Some(CLARIFICATION_DEFAULT),
        EXTRACTION_PROMPT_ID => Some(EXTRACTION_DEFAULT),
        MATRIX_GENERATION_PROMPT_ID => Some(MATRIX_GENERATION_DEFAULT),
        _ => None,
    }
}

const CLASSIFICATION_DEFAULT: &str = r#"You are a business process transformation analyst. Classify the described process into exactly one category:

- Eliminate: the process adds no value and should simply stop.
- Simplify: the process is needed but carries redundant steps, approvals or handovers that should be stripped out.
- Digitise: manual, paper- or spreadsheet-bound work that should move into a digital system of record.
- RPA: stable, rule-based, repetitive digital work suited to robotic process automation.
- AI Agent: work that needs judgement over unstructured input, where a single AI assistant can act within one system.
- Agentic AI: multi-step work that requires autonomous planning and coordination across several systems.

Output ONLY a JSON object:
{"category": "<one of the six>", "confidence": <0.0-1.0>, "rationale": "...", "categoryProgression": "...", "futureOpportunities": "...", "shouldClarify": true|false}

Rules:
- confidence reflects how well the description pins the category down, not how good the idea is.
- categoryProgression sketches how the process could evolve through later categories over time.
- futureOpportunities names concrete follow-on improvements.
- Set shouldClarify to false only when the description already answers the key indicators: frequency, volume, current tooling, pain points, data sensitivity, systems involved."#;

const CLARIFICATION_DEFAULT: &str = r#"You are conducting a short clarification interview about a business process that will be classified for transformation. Given the description and the answers so far, ask the questions whose answers would most change the classification.

Output ONLY a JSON object:
{"questions": ["..."], "shouldClarify": true|false}

Rules:
- Ask 2-3 questions per round, the most valuable first. Plain language, one fact per question.
- Prioritize whichever key indicators are still missing: frequency, volume, current tooling, pain points, data sensitivity, systems involved.
- Return {"questions": [], "shouldClarify": false} when the answers already cover the key indicators.
- Return {"questions": [], "shouldClarify": false} when the user's answers show frustration, dismissiveness, or repeated "I don't know" - do not press an unwilling respondent.
- Never output commentary about the interview itself. Only the JSON object."#;

const EXTRACTION_DEFAULT: &str = r#"Extract structured attributes of the described business process from the description and the interview answers.

Output ONLY a JSON object mapping attribute names to values. For every attribute in the catalog below, return its value; use the string "unknown" when the conversation does not say. Do not invent attributes that are not in the catalog, and do not return arrays."#;

const MATRIX_GENERATION_DEFAULT: &str = r#"You design a decision matrix that post-processes category proposals for business process transformation. A matrix is a set of rules; each rule has conditions over process attributes and one action.

Output ONLY a JSON object:
{"attributes": [{"name", "type", "possibleValues", "weight", "description"}], "rules": [{"ruleId", "name", "description", "priority", "active", "conditions", "action"}]}

Rules:
- Use ONLY attributes from the catalog below. Inventing attributes (for example "roi", "team_size", "budget") makes the rule invalid and it will be dropped.
- conditions use operators ==, !=, >, <, >=, <= with a scalar value, or in / not_in with a list value.
- action is one of:
  {"type": "override", "targetCategory": "<category>", "rationale": "..."}
  {"type": "adjust_confidence", "confidenceAdjustment": <-1.0 to 1.0>, "rationale": "..."}
  {"type": "flag_review", "rationale": "..."}
- targetCategory is a single string, never an array, and must be one of: Eliminate, Simplify, Digitise, RPA, AI Agent, Agentic AI.
- priority is 0-100; higher priority rules win conflicts."#;

const FINAL_ROUND_NOTE: &str =
    "\n\nThe interview is close to its question limit. Ask at most ONE final question, or return an empty list if nothing essential is missing.";

pub(crate) fn classification_system_prompt(template: Option<&str>) -> String {
    template.unwrap_or(CLASSIFICATION_DEFAULT).to_string()
}

pub(crate) fn clarification_system_prompt(template: Option<&str>, final_round: bool) -> String {
    let mut prompt = template.unwrap_or(CLARIFICATION_DEFAULT).to_string();
    if final_round {
        prompt.push_str(FINAL_ROUND_NOTE);
    }
    prompt
}

pub(crate) fn extraction_system_prompt(template: Option<&str>, attributes: &[MatrixAttribute]) -> String {
    let mut prompt = template.unwrap_or(EXTRACTION_DEFAULT).to_string();
    prompt.push_str("\n\nAttribute catalog:\n");
    prompt.push_str(&attribute_catalog(attributes));
    prompt
}

pub(crate) fn matrix_generation_system_prompt(template: Option<&str>, attributes: &[MatrixAttribute]) -> String {
    let mut prompt = template.unwrap_or(MATRIX_GENERATION_DEFAULT).to_string();
    prompt.push_str("\n\nAttribute catalog:\n");
    prompt.push_str(&attribute_catalog(attributes));
    prompt
}

fn attribute_catalog(attributes: &[MatrixAttribute]) -> String {
    attributes
        .iter()
        .map(|a| match a.kind {
            AttributeKind::Categorical => format!(
                "- {} (categorical: {}){}",
                a.name,
                a.possible_values.join(" | "),
                describe(a)
            ),
            AttributeKind::Numeric => format!("- {} (numeric){}", a.name, describe(a)),
            AttributeKind::Boolean => format!("- {} (boolean){}", a.name, describe(a)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe(a: &MatrixAttribute) -> String {
    if a.description.is_empty() {
        String::new()
    } else {
        format!(" - {}", a.description)
    }
}

/// Catalog used when no matrix exists yet, e.g. for the first
/// admin-triggered generation.
pub fn default_attribute_catalog() -> Vec<MatrixAttribute> {
    let categorical = |name: &str, values: &[&str], weight: f64, description: &str| MatrixAttribute {
        name: name.to_string(),
        kind: AttributeKind::Categorical,
        possible_values: values.iter().map(|v| v.to_string()).collect(),
        weight,
        description: description.to_string(),
    };
    vec![
        categorical(
            "frequency",
            &["hourly", "daily", "weekly", "monthly", "quarterly", "ad_hoc"],
            0.8,
            "How often the process runs",
        ),
        MatrixAttribute {
            name: "volume".into(),
            kind: AttributeKind::Numeric,
            possible_values: vec![],
            weight: 0.7,
            description: "Items handled per month".into(),
        },
        categorical(
            "complexity",
            &["low", "medium", "high"],
            0.8,
            "How much judgement each item needs",
        ),
        MatrixAttribute {
            name: "rule_based".into(),
            kind: AttributeKind::Boolean,
            possible_values: vec![],
            weight: 0.9,
            description: "Whether the steps follow fixed rules".into(),
        },
        categorical(
            "data_sensitivity",
            &["public", "internal", "confidential", "regulated"],
            0.6,
            "Sensitivity of the data touched",
        ),
        categorical(
            "current_state",
            &["paper", "spreadsheet", "email", "legacy_system", "modern_system"],
            0.7,
            "Where the work lives today",
        ),
    ]
}
