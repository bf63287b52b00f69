//! Line-level helpers for `key = value` configuration files.

/// What: Check whether a line should be skipped (comment or empty).
///
/// Inputs:
/// - `line`: Raw line from the file.
///
/// Output:
/// - `true` for blank lines and lines starting with `#`, `//` or `;`.
#[must_use]
pub fn skip_comment_or_empty(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with("//")
        || trimmed.starts_with(';')
}

/// What: Parse a key-value pair from a line.
///
/// Inputs:
/// - `line`: Line containing `key=value`
///
/// Output:
/// - `Some((key, value))` with both sides trimmed and any inline comment
///   removed from the value; `None` when there is no `=`.
#[must_use]
pub fn parse_key_value(line: &str) -> Option<(String, String)> {
    let (key, value) = line.trim().split_once('=')?;
    Some((
        key.trim().to_string(),
        strip_inline_comment(value.trim()).to_string(),
    ))
}

/// Remove a trailing ` // ...` or ` # ...` comment from a value.
///
/// A marker only starts a comment when whitespace precedes it, so URLs,
/// paths containing `#` and values such as `#fff` survive.
#[must_use]
pub fn strip_inline_comment(s: &str) -> &str {
    let mut prev_space = false;
    for (i, c) in s.char_indices() {
        if prev_space && (c == '#' || s[i..].starts_with("//")) {
            return s[..i].trim();
        }
        prev_space = c.is_whitespace();
    }
    s.trim()
}

/// Loose boolean: `true`, `1`, `yes`, `on` (any case) are true.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
