/// Best-effort textual cleanup of a raw model response into a JSON
/// candidate. Not a parser — the output is not assumed to be valid JSON.
///
/// Steps, applied unconditionally and in order: strip a wrapping fenced code
/// block; cut everything before the first `{` and after a trailing unmatched
/// fence marker; convert unescaped single quotes to double quotes outside of
/// double-quoted strings; quote bareword object keys; remove trailing commas
/// before a closing brace/bracket.
pub fn normalize(raw: &str) -> String {
    let text = strip_fences(raw);
    let text = clip_to_object(text);
    let text = single_to_double_quotes(text);
    let text = quote_bareword_keys(&text);
    strip_trailing_commas(&text)
}

/// Strip a fenced code block when the whole response is wrapped in one.
/// Handles ```json and bare ``` fences.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

/// Discard prose before the first `{` and anything after a final unmatched
/// fence marker (models close a fence they never opened around the tail).
fn clip_to_object(text: &str) -> &str {
    let start = text.find('{').unwrap_or(0);
    let clipped = &text[start..];
    match clipped.rfind("```") {
        Some(pos) => clipped[..pos].trim_end(),
        None => clipped.trim_end(),
    }
}

/// Convert unescaped single quotes to double quotes while outside an
/// already-double-quoted string, tracking quote state character by character.
fn single_to_double_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_double = false;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                out.push(c);
                escaped = true;
            }
            '"' => {
                out.push(c);
                in_double = !in_double;
            }
            '\'' if !in_double => out.push('"'),
            c => out.push(c),
        }
    }
    out
}

/// Quote bareword object keys: `key:` → `"key":`. Only rewrites identifiers
/// that follow `{` or `,` (outside strings) and precede a colon.
fn quote_bareword_keys(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut expect_key = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                expect_key = false;
                out.push(c);
                i += 1;
            }
            '{' | ',' => {
                expect_key = true;
                out.push(c);
                i += 1;
            }
            c if c.is_whitespace() => {
                out.push(c);
                i += 1;
            }
            c if expect_key && (c.is_ascii_alphabetic() || c == '_') => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                // Only a key if a colon follows (past whitespace).
                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ':' {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                } else {
                    out.push_str(&word);
                }
                expect_key = false;
            }
            c => {
                expect_key = false;
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Remove trailing commas before `}` or `]`, outside strings.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
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
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            c => out.push(c),
        }
    }
    out
}
