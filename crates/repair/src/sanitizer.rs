//! Strip code fences from provider output

const FENCE: &str = "```";

/// Remove a wrapping ```` ```mermaid ```` / ```` ``` ```` fence and surrounding whitespace.
///
/// Idempotent: the result is a fixed point of the stripping pass.
pub fn sanitize_code(raw: &str) -> String {
    let mut current = raw.trim();
    loop {
        let next = strip_fences_once(current);
        if next.len() == current.len() {
            return next.to_string();
        }
        current = next;
    }
}

/// `None` passes through untouched.
pub fn sanitize_optional(raw: Option<&str>) -> Option<String> {
    raw.map(sanitize_code)
}

fn strip_fences_once(code: &str) -> &str {
    let mut code = code;

    if let Some(rest) = code.strip_prefix(FENCE) {
        code = match rest.find('\n') {
            // Opening line holds at most an info string such as `mermaid`
            Some(idx) if !rest[..idx].trim().contains(char::is_whitespace) => &rest[idx + 1..],
            // Diagram text shares the opening line with the tag
            _ => strip_language_tag(rest),
        };
    }

    if let Some(rest) = code.strip_suffix(FENCE) {
        code = rest;
    }

    code.trim()
}

fn strip_language_tag(rest: &str) -> &str {
    let tag = "mermaid";
    match rest.get(..tag.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(tag) => {
            let after = &rest[tag.len()..];
            if after.chars().next().map_or(true, char::is_whitespace) {
                after
            } else {
                rest
            }
        }
        _ => rest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_mermaid_fence() {
        let raw = "```mermaid\ngraph TD\n  A-->B\n```";
        assert_eq!(sanitize_code(raw), "graph TD\n  A-->B");
    }

    #[test]
    fn test_strips_bare_fence_and_whitespace() {
        let raw = "\n\n```\nsequenceDiagram\n  Alice->>Bob: hi\n```\n  ";
        assert_eq!(sanitize_code(raw), "sequenceDiagram\n  Alice->>Bob: hi");
    }

    #[test]
    fn test_uppercase_language_tag() {
        assert_eq!(sanitize_code("```Mermaid\npie\n```"), "pie");
    }

    #[test]
    fn test_single_line_fence() {
        assert_eq!(sanitize_code("```mermaid graph LR; A-->B```"), "graph LR; A-->B");
    }

    #[test]
    fn test_tag_and_source_on_opening_line() {
        assert_eq!(sanitize_code("```mermaid graph TD\nA-->B\n```"), "graph TD\nA-->B");
        assert_eq!(sanitize_code("```mermaid \ngraph TD\nA-->B\n```"), "graph TD\nA-->B");
        assert_eq!(sanitize_code("```Mermaid\tflowchart LR\n  a --> b\n```"), "flowchart LR\n  a --> b");
    }

    #[test]
    fn test_tag_prefix_of_longer_word_is_kept() {
        assert_eq!(sanitize_code("```mermaidish A\nB\n```"), "mermaidish A\nB");
    }

    #[test]
    fn test_unfenced_source_is_only_trimmed() {
        assert_eq!(sanitize_code("  graph TD\nA-->B  "), "graph TD\nA-->B");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize_code(""), "");
        assert_eq!(sanitize_optional(None), None);
        assert_eq!(sanitize_optional(Some("")), Some(String::new()));
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "",
            "```",
            "``````",
            "```\n```\n```",
            "```mermaid\n```mermaid\ngraph TD\n```\n```",
            "graph TD\nA-->B",
            "  ```mermaid\nflowchart LR\n  a --> b\n```  ",
            "```mermaid graph TD```",
            "text before ```mermaid\ngraph TD\n```",
        ];
        for input in inputs {
            let once = sanitize_code(input);
            assert_eq!(sanitize_code(&once), once, "not idempotent for {input:?}");
        }
    }
}
