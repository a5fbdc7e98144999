//! Code-fence extraction from model replies.
//!
//! Model replies usually wrap the payload in a Markdown fence and surround it
//! with chatter. Both functions here are total: when nothing matches, the
//! trimmed input comes back unchanged.

use std::sync::LazyLock;

use regex::Regex;

static ANY_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[\w+-]*[ \t]*\r?\n?([\s\S]*?)```").expect("fence pattern is valid")
});

/// Returns the body of the first fenced block in `text`.
///
/// With a `hint`, a block whose info string starts with the hint
/// (case-insensitive) wins over earlier untagged blocks. Without a matching
/// fence the trimmed text is returned as-is. The result is always trimmed.
///
/// # Example
///
/// ```
/// # use umlsmith_parser::extract_code;
/// let reply = "Sure! ```plantuml\n@startuml\nA->B\n@enduml\n``` Hope that helps";
/// assert_eq!(extract_code(reply, Some("plantuml")), "@startuml\nA->B\n@enduml");
/// ```
pub fn extract_code(text: &str, hint: Option<&str>) -> String {
    if let Some(body) = hint.and_then(|hint| tagged_fence(text, hint)) {
        return body;
    }

    ANY_FENCE
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map_or_else(|| text.trim(), |body| body.as_str().trim())
        .to_string()
}

fn tagged_fence(text: &str, hint: &str) -> Option<String> {
    let hint = hint.trim();
    if hint.is_empty() {
        return None;
    }
    let boundary = if hint.ends_with(|c: char| c.is_alphanumeric() || c == '_') {
        r"\b"
    } else {
        ""
    };
    let pattern = format!(
        r"(?i)```{}{boundary}[^\n]*?\r?\n?([\s\S]*?)```",
        regex::escape(hint)
    );

    Regex::new(&pattern)
        .ok()?
        .captures(text)?
        .get(1)
        .map(|body| body.as_str().trim().to_string())
}

/// Returns the JSON payload embedded in `text`.
///
/// Tries a `json` fence, then any fence, then the span from the first `[`
/// to the last `]`, then the span from the first `{` to the last `}`. The
/// result is not validated; callers parse it and handle failure.
pub fn extract_json(text: &str) -> String {
    if let Some(body) = tagged_fence(text, "json") {
        return body;
    }
    if let Some(body) = ANY_FENCE.captures(text).and_then(|captures| captures.get(1)) {
        return body.as_str().trim().to_string();
    }

    delimited_span(text, '[', ']')
        .or_else(|| delimited_span(text, '{', '}'))
        .unwrap_or_else(|| text.trim())
        .to_string()
}

fn delimited_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start < end).then(|| &text[start..=end])
}
