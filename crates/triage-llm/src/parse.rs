use serde::de::DeserializeOwned;

/// Extract JSON from text that may be wrapped in markdown code fences.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }
    trimmed
}

/// What came back when a raw model response was parsed.
///
/// Malformed output is a normal value, not an error: the model answering in
/// the wrong shape is expected behavior that the caller downgrades to an
/// empty round or a degraded proposal. Only transport-level problems are
/// `LlmError`s.
#[derive(Debug)]
pub enum ParseOutcome<T> {
    Parsed(T),
    Malformed { reason: String, raw: String },
}

impl<T> ParseOutcome<T> {
    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        ParseOutcome::Malformed {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        match self {
            ParseOutcome::Parsed(value) => ParseOutcome::Parsed(f(value)),
            ParseOutcome::Malformed { reason, raw } => ParseOutcome::Malformed { reason, raw },
        }
    }

    /// Chain a fallible refinement; the closure's error becomes a
    /// `Malformed` carrying the original raw text.
    pub fn and_then<U>(self, raw_text: &str, f: impl FnOnce(T) -> Result<U, String>) -> ParseOutcome<U> {
        match self {
            ParseOutcome::Parsed(value) => match f(value) {
                Ok(refined) => ParseOutcome::Parsed(refined),
                Err(reason) => ParseOutcome::Malformed {
                    reason,
                    raw: raw_text.to_string(),
                },
            },
            ParseOutcome::Malformed { reason, raw } => ParseOutcome::Malformed { reason, raw },
        }
    }
}

/// Deserialize a raw model response, stripping code fences first.
pub fn parse_json_response<T: DeserializeOwned>(raw: &str) -> ParseOutcome<T> {
    let json = extract_json(raw);
    match serde_json::from_str::<T>(json) {
        Ok(value) => ParseOutcome::Parsed(value),
        Err(e) => ParseOutcome::Malformed {
            reason: format!("invalid JSON: {e}"),
            raw: raw.to_string(),
        },
    }
}
