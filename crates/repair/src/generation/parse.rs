//! Best-effort extraction of a draft from raw provider output
//!
//! Providers are asked for a JSON object but routinely wrap it in prose or
//! fences, or produce something slightly off. Strategies are tried in order
//! and the first candidate that decodes wins; total failure degrades to an
//! empty draft instead of an error.

use diagram_common::DraftResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::sanitizer::sanitize_code;

pub const UNPARSEABLE_EXPLANATION: &str =
    "I could not produce a diagram from that request. Please try rephrasing it.";

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("valid fenced json regex"));

static GREEDY_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid greedy object regex"));

static FENCED_MERMAID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:mermaid|Mermaid)\s*\n(.*?)```").expect("valid fenced mermaid regex"));

#[derive(Deserialize)]
struct RawDraft {
    #[serde(default, alias = "mermaid", alias = "code", alias = "diagramSource", alias = "diagram_source")]
    diagram: Option<String>,
    #[serde(default, alias = "answer", alias = "message", alias = "chatAnswer")]
    explanation: Option<String>,
}

type Strategy = fn(&str) -> Option<&str>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("balanced_braces", balanced_object),
    ("fenced_json", fenced_json),
    ("greedy_object", greedy_object),
];

/// Parse provider output into a draft. Never fails.
pub fn parse_draft(raw: &str) -> DraftResult {
    for (name, strategy) in STRATEGIES {
        if let Some(draft) = strategy(raw).and_then(decode) {
            debug!(strategy = name, diagram_len = draft.diagram_source.len(), "Parsed provider output");
            return draft;
        }
    }

    if let Some(draft) = bare_mermaid_block(raw) {
        debug!(strategy = "fenced_mermaid", "Parsed provider output");
        return draft;
    }

    warn!(
        output_preview = %raw.chars().take(200).collect::<String>(),
        "Could not parse provider output, degrading to empty draft"
    );
    DraftResult::empty(UNPARSEABLE_EXPLANATION)
}

fn decode(candidate: &str) -> Option<DraftResult> {
    let parsed: RawDraft = serde_json::from_str(candidate).ok()?;
    if parsed.diagram.is_none() && parsed.explanation.is_none() {
        return None;
    }
    Some(DraftResult::new(
        sanitize_code(parsed.diagram.as_deref().unwrap_or_default()),
        parsed.explanation.unwrap_or_default().trim(),
    ))
}

/// First complete top-level `{...}`, respecting string literals and escapes
fn balanced_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn fenced_json(raw: &str) -> Option<&str> {
    FENCED_JSON
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn greedy_object(raw: &str) -> Option<&str> {
    GREEDY_OBJECT.find(raw).map(|m| m.as_str())
}

/// Plain ```` ```mermaid ```` block; the remaining prose becomes the explanation
fn bare_mermaid_block(raw: &str) -> Option<DraftResult> {
    let caps = FENCED_MERMAID.captures(raw)?;
    let whole = caps.get(0)?;
    let code = sanitize_code(caps.get(1)?.as_str());
    if code.is_empty() {
        return None;
    }
    let explanation = format!("{}{}", &raw[..whole.start()], &raw[whole.end()..]);
    Some(DraftResult::new(code, explanation.trim()))
}
