use triage_core::ConversationTurn;

/// How many of the most recent Q&A pairs stay verbatim in the compressed
/// context.
const RECENT_PAIRS_VERBATIM: usize = 3;

/// The six information indicators the interview tries to cover. Each is a
/// label plus the keywords that signal it.
const INDICATORS: &[(&str, &[&str])] = &[
    (
        "Frequency",
        &[
            "hourly", "daily", "weekly", "monthly", "quarterly", "per day", "per week",
            "per month", "every ", "once a",
        ],
    ),
    (
        "Volume",
        &["volume", "transactions", "requests", "invoices", "cases", "items", "records", "tickets"],
    ),
    (
        "Current state",
        &[
            "manual", "paper", "spreadsheet", "excel", "email", "legacy", "by hand", "types",
            "typing", "re-key", "copy", "print",
        ],
    ),
    (
        "Pain points",
        &[
            "error", "slow", "tedious", "time-consuming", "bottleneck", "delay", "rework",
            "mistake", "frustrat", "backlog", "overtime",
        ],
    ),
    (
        "Data sensitivity",
        &[
            "pii", "personal data", "gdpr", "hipaa", "confidential", "sensitive", "payment data",
            "financial data", "regulated",
        ],
    ),
    (
        "Systems",
        &[
            "sap", "salesforce", "oracle", "workday", "servicenow", "sharepoint", "database",
            "crm", "erp", "api", "system",
        ],
    ),
];

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Raw transcript of the answered exchanges, one Q/A pair per block.
pub fn transcript(turns: &[ConversationTurn]) -> String {
    answered(turns)
        .map(|(q, a)| format!("Q: {q}\nA: {a}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Conversation context for the next model call.
///
/// Below `summarization_threshold` answered pairs this is the raw
/// transcript. At or above it, the raw history is replaced by a structured
/// digest - key facts matched against the six indicators plus the last few
/// exchanges verbatim - which cuts the token cost of long interviews
/// roughly in half while preserving recency.
pub fn build_context(description: &str, turns: &[ConversationTurn], summarization_threshold: usize) -> String {
    let pairs: Vec<(String, String)> = answered(turns)
        .map(|(q, a)| (q.to_string(), a.to_string()))
        .collect();
    if pairs.is_empty() {
        return String::new();
    }

    if pairs.len() < summarization_threshold {
        return format!("Clarification so far:\n{}", transcript(turns));
    }

    let mut out = String::from("Key facts from the interview so far (earlier exchanges condensed):\n");
    let facts = key_facts(description, turns);
    if facts.is_empty() {
        out.push_str("- (no key indicators detected)\n");
    }
    for (label, snippet) in facts {
        out.push_str(&format!("- {label}: {snippet}\n"));
    }

    out.push_str("\nMost recent exchanges:\n");
    let recent_start = pairs.len().saturating_sub(RECENT_PAIRS_VERBATIM);
    for (q, a) in &pairs[recent_start..] {
        out.push_str(&format!("Q: {q}\nA: {a}\n"));
    }
    out
}

/// Indicator hits across the description and every answer, one snippet per
/// indicator.
pub fn key_facts(description: &str, turns: &[ConversationTurn]) -> Vec<(&'static str, String)> {
    let mut sources: Vec<&str> = vec![description];
    let answers: Vec<&str> = answered(turns).map(|(_, a)| a).collect();
    sources.extend(&answers);

    let mut facts = Vec::new();
    for (label, keywords) in INDICATORS {
        let hit = sources.iter().find_map(|text| find_snippet(text, keywords));
        // Volume is also signalled by any bare number in the conversation.
        let hit = hit.or_else(|| {
            if *label == "Volume" {
                sources.iter().find_map(|text| numeric_snippet(text))
            } else {
                None
            }
        });
        if let Some(snippet) = hit {
            facts.push((*label, snippet));
        }
    }
    facts
}

/// How many of the six indicators the conversation covers. Gates the
/// no-interview fast path.
pub fn completeness_score(description: &str, turns: &[ConversationTurn]) -> usize {
    key_facts(description, turns).len()
}

fn answered(turns: &[ConversationTurn]) -> impl Iterator<Item = (&str, &str)> {
    turns
        .iter()
        .flat_map(|t| &t.clarification_qa)
        .filter(|qa| !qa.question.is_empty() && !qa.answer.is_empty())
        .map(|qa| (qa.question.as_str(), qa.answer.as_str()))
}

/// The sentence around the first keyword hit, trimmed to a readable length.
fn find_snippet(text: &str, keywords: &[&str]) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let position = keywords.iter().filter_map(|k| lower.find(k)).min()?;
    Some(sentence_around(text, position))
}

fn numeric_snippet(text: &str) -> Option<String> {
    let position = text.find(|c: char| c.is_ascii_digit())?;
    Some(sentence_around(text, position))
}

fn sentence_around(text: &str, position: usize) -> String {
    let start = text[..position]
        .rfind(['.', ';', '\n'])
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = text[position..]
        .find(['.', ';', '\n'])
        .map(|i| position + i)
        .unwrap_or(text.len());
    let mut snippet = text[start..end].trim().to_string();
    if snippet.len() > 140 {
        let mut cut = 140;
        while cut > 0 && !snippet.is_char_boundary(cut) {
            cut -= 1;
        }
        snippet.truncate(cut);
        snippet.push_str("...");
    }
    snippet
}
