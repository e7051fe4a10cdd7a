//! Terminal rendering of generation outcomes

use diagram_common::{GenerationOutcome, ValidationStatus};

pub fn format_outcome(outcome: &GenerationOutcome) -> String {
    let mut out = String::new();

    if !outcome.chat_answer.is_empty() {
        out.push_str(&outcome.chat_answer);
        out.push_str("\n\n");
    }

    if !outcome.diagram_source.is_empty() {
        out.push_str("```mermaid\n");
        out.push_str(&outcome.diagram_source);
        out.push_str("\n```\n");
    }

    out.push_str(&status_line(outcome));
    out
}

pub fn status_line(outcome: &GenerationOutcome) -> String {
    let fixes = match outcome.attempts {
        0 => String::new(),
        1 => ", 1 fix attempt".to_string(),
        n => format!(", {n} fix attempts"),
    };

    match (outcome.success, outcome.validation) {
        (true, ValidationStatus::Verified) => format!("✓ rendered{fixes}"),
        (true, ValidationStatus::Inconclusive) => format!("? not confirmed by a renderer{fixes}"),
        (true, _) => "- not validated".to_string(),
        (false, _) => format!(
            "✗ failed{fixes}: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
