use std::sync::LazyLock;

use regex::Regex;

/// Lines that look syntactically complete: a `"key": <value>` field, a flat
/// object or string array element, or a bare closing brace/bracket line —
/// each with an optional trailing comma.
static COMPLETE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)^\s*(
            "[^"]*"\s*:\s*(
                "(\\.|[^"\\])*"      # complete string value
                | -?\d+(\.\d+)?      # number
                | true | false | null
                | \[[^\[\]]*\]       # flat array
                | \{[^{}]*\}         # flat object
            )
            | \{[^{}]*\}             # flat object element (an issue)
            | "(\\.|[^"\\])*"        # string array element
            | [}\]]+
        )\s*,?\s*$"#,
    )
    .expect("complete-line regex is valid")
});

/// Repair model output truncated mid-field by an output-length ceiling.
///
/// Scan lines from the end backward for the last one that looks complete,
/// drop everything after it, strip a dangling comma, then close any string
/// left open and append closers for unmatched `{`/`[`. Scoped to the review
/// schema's shapes — this is a heuristic, not a general JSON repairer.
pub fn repair(text: &str) -> String {
    let text = text.trim_end();
    if text.is_empty() {
        return String::new();
    }

    let kept = truncate_to_last_complete_line(text).unwrap_or_else(|| text.to_string());
    let kept = close_open_string(kept);
    let kept = strip_dangling_tail(kept);
    balance_brackets(kept)
}

/// Drop trailing lines until the last line looks syntactically complete.
/// Returns None when no line qualifies (single-line responses cut mid-field
/// are handled by string closing and bracket balancing instead).
fn truncate_to_last_complete_line(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return None;
    }
    let last_complete = lines.iter().rposition(|l| COMPLETE_LINE.is_match(l))?;
    if last_complete == lines.len() - 1 {
        return Some(text.to_string());
    }
    Some(lines[..=last_complete].join("\n"))
}

/// Close a double-quoted string left open at the end of the text.
fn close_open_string(text: String) -> String {
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => in_string = !in_string,
            _ => {}
        }
    }
    if in_string {
        let mut closed = text;
        // A trailing lone backslash would escape the closing quote.
        if closed.ends_with('\\') && !closed.ends_with("\\\\") {
            closed.pop();
        }
        closed.push('"');
        closed
    } else {
        text
    }
}

/// Strip a dangling comma or a dangling `"key":` left at the tail after
/// truncation.
fn strip_dangling_tail(text: String) -> String {
    let trimmed = text.trim_end();
    if let Some(rest) = trimmed.strip_suffix(',') {
        return rest.trim_end().to_string();
    }
    if trimmed.ends_with(':') {
        // Walk back over the quoted key preceding the colon.
        let without_colon = trimmed[..trimmed.len() - 1].trim_end();
        if without_colon.ends_with('"')
            && let Some(open) = without_colon[..without_colon.len() - 1].rfind('"')
        {
            let cut = without_colon[..open].trim_end();
            let cut = cut.strip_suffix(',').unwrap_or(cut).trim_end();
            return cut.to_string();
        }
    }
    trimmed.to_string()
}

/// Count unmatched `{`/`[` outside strings and append the matching closers
/// in reverse opening order.
fn balance_brackets(text: String) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = text;
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}
