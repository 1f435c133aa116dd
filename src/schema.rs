use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Issue list ceiling per review.
pub const MAX_ISSUES: usize = 20;

/// Ceiling for every other list field.
pub const MAX_LIST_ITEMS: usize = 15;

/// Per-string character ceiling. Bounds downstream storage and rendering.
pub const MAX_STRING_CHARS: usize = 5000;

pub const DEFAULT_SCORE: u8 = 5;
pub const DEFAULT_CONFIDENCE: u8 = 3;

/// Fixed, recognizable summary for the fallback review.
pub const FALLBACK_SUMMARY: &str =
    "Automated review unavailable; the model response could not be obtained.";

/// Issue severity. Model vocabulary outside the enum coerces to `Medium`.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    /// Sort rank: lower is more severe. Used when truncating issue lists.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    /// Coerce loose model vocabulary. Unknown values become the default
    /// rather than rejecting the whole issue.
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "critical" | "blocker" => Self::Critical,
            "high" | "major" => Self::High,
            "medium" | "moderate" => Self::Medium,
            "low" | "minor" | "info" => Self::Low,
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Issue category. `System` is reserved for synthetic fallback issues.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Performance,
    #[default]
    Quality,
    Style,
    Testing,
    Documentation,
    Accessibility,
    Dependencies,
    System,
}

impl Category {
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "security" => Self::Security,
            "performance" | "perf" => Self::Performance,
            "quality" | "correctness" => Self::Quality,
            "style" | "formatting" => Self::Style,
            "testing" | "tests" | "test" => Self::Testing,
            "documentation" | "docs" => Self::Documentation,
            "accessibility" | "a11y" => Self::Accessibility,
            "dependencies" | "deps" => Self::Dependencies,
            "system" => Self::System,
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Performance => "performance",
            Self::Quality => "quality",
            Self::Style => "style",
            Self::Testing => "testing",
            Self::Documentation => "documentation",
            Self::Accessibility => "accessibility",
            Self::Dependencies => "dependencies",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Issue {
    pub severity: Severity,
    pub description: String,
    pub suggestion: String,
    pub category: Category,
    pub citation: String,
    pub auto_fixable: bool,
}

impl Issue {
    /// Build an issue from one loosely-typed JSON object, coercing every
    /// field. Any shape of input produces a valid issue.
    fn from_value(v: &Value) -> Self {
        Self {
            severity: Severity::coerce(str_field(v, "severity")),
            description: sanitize_text(str_field(v, "description")),
            suggestion: sanitize_text(str_field(v, "suggestion")),
            category: Category::coerce(str_field(v, "category")),
            citation: sanitize_text(str_field(v, "citation")),
            auto_fixable: v
                .get("auto_fixable")
                .or_else(|| v.get("autoFixable"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    /// Dedup key for aggregation.
    pub fn dedup_key(&self) -> (Severity, String) {
        (self.severity, self.description.clone())
    }
}

/// The single schema every code path converges to, including every
/// error/fallback path. Every list field is length-capped and every string
/// field is length-capped and control-character-free.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct CanonicalReview {
    pub score: u8,
    pub confidence: u8,
    pub summary: String,
    pub issues: Vec<Issue>,
    pub suggestions: Vec<String>,
    pub security: Vec<String>,
    pub performance: Vec<String>,
    pub dependencies: Vec<String>,
    pub accessibility: Vec<String>,
    pub sources: Vec<String>,
}

impl Default for CanonicalReview {
    fn default() -> Self {
        Self {
            score: DEFAULT_SCORE,
            confidence: DEFAULT_CONFIDENCE,
            summary: String::new(),
            issues: Vec::new(),
            suggestions: Vec::new(),
            security: Vec::new(),
            performance: Vec::new(),
            dependencies: Vec::new(),
            accessibility: Vec::new(),
            sources: Vec::new(),
        }
    }
}

impl CanonicalReview {
    /// Build a review from one loosely-typed JSON value, coercing and
    /// defaulting every field. Missing list fields become empty arrays.
    pub fn from_value(v: &Value) -> Self {
        let review = Self {
            score: clamp_score(v.get("score"), DEFAULT_SCORE),
            confidence: clamp_score(v.get("confidence"), DEFAULT_CONFIDENCE),
            summary: str_field(v, "summary").to_string(),
            issues: v
                .get("issues")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter(|i| i.is_object()).map(Issue::from_value).collect())
                .unwrap_or_default(),
            suggestions: string_list(v, "suggestions"),
            security: string_list(v, "security"),
            performance: string_list(v, "performance"),
            dependencies: string_list(v, "dependencies"),
            accessibility: string_list(v, "accessibility"),
            sources: string_list(v, "sources"),
        };
        review.sanitized()
    }

    /// Apply every cap: scores clamped, strings sanitized and truncated,
    /// lists truncated. Idempotent; run on every construction path.
    pub fn sanitized(mut self) -> Self {
        self.score = self.score.clamp(1, 10);
        self.confidence = self.confidence.clamp(1, 10);
        self.summary = sanitize_text(&self.summary);
        self.issues.truncate(MAX_ISSUES);
        for issue in &mut self.issues {
            issue.description = sanitize_text(&issue.description);
            issue.suggestion = sanitize_text(&issue.suggestion);
            issue.citation = sanitize_text(&issue.citation);
        }
        for list in [
            &mut self.suggestions,
            &mut self.security,
            &mut self.performance,
            &mut self.dependencies,
            &mut self.accessibility,
            &mut self.sources,
        ] {
            list.truncate(MAX_LIST_ITEMS);
            for item in list.iter_mut() {
                *item = sanitize_text(item);
            }
        }
        self
    }

    /// Fixed, schema-valid placeholder returned when the pipeline cannot
    /// obtain a usable result. Recognizable by its summary and the single
    /// synthetic `system` issue.
    pub fn fallback() -> Self {
        Self {
            score: DEFAULT_SCORE,
            confidence: 1,
            summary: FALLBACK_SUMMARY.to_string(),
            issues: vec![Issue {
                severity: Severity::Medium,
                description: "The automated review did not complete; a manual review is recommended."
                    .to_string(),
                suggestion: "Re-run the review once the model service is reachable.".to_string(),
                category: Category::System,
                citation: String::new(),
                auto_fixable: false,
            }],
            ..Self::default()
        }
    }

    /// True if this is the designated fallback placeholder.
    pub fn is_fallback(&self) -> bool {
        self.summary == FALLBACK_SUMMARY
            && self.issues.len() == 1
            && self.issues[0].category == Category::System
    }
}

fn str_field<'a>(v: &'a Value, key: &str) -> &'a str {
    v.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Accept an array of strings, dropping non-string entries. A bare string
/// where an array was expected becomes a one-element list.
fn string_list(v: &Value, key: &str) -> Vec<String> {
    match v.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Clamp a score-like field to [1,10]. Accepts integers, floats, and numeric
/// strings — the model's output types cannot be trusted to be exact.
fn clamp_score(v: Option<&Value>, default: u8) -> u8 {
    let n = match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n.is_finite() => (n.round() as i64).clamp(1, 10) as u8,
        _ => default,
    }
}

/// Truncate to the string cap on a char boundary, strip control characters
/// (keeping newlines and tabs), and escape `<`/`>` for HTML-adjacent sinks.
pub fn sanitize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(MAX_STRING_CHARS));
    let mut emitted = 0usize;
    for c in raw.chars() {
        if emitted >= MAX_STRING_CHARS {
            break;
        }
        match c {
            '<' => {
                out.push_str("&lt;");
                emitted += 4;
            }
            '>' => {
                out.push_str("&gt;");
                emitted += 4;
            }
            c if c.is_control() && c != '\n' && c != '\t' => {}
            c => {
                out.push(c);
                emitted += 1;
            }
        }
    }
    out
}
