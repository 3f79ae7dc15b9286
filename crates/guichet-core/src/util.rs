//! Shared utility functions used across multiple modules.

use regex::Regex;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Normalize an email address: trim surrounding whitespace and lowercase.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Normalize a phone number to international (E.164-like) format.
///
/// Accepts separators (spaces, dots, dashes, parentheses). French national
/// numbers (`0X XX XX XX XX`) are converted to `+33`; `00`-prefixed
/// international numbers are converted to `+`. Returns `None` when the
/// value cannot be read as a plausible phone number.
pub fn normalize_phone(value: &str) -> Option<String> {
    let compact: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | '-' | '(' | ')'))
        .collect();

    let (prefix, digits) = if let Some(rest) = compact.strip_prefix('+') {
        ("+".to_string(), rest.to_string())
    } else if let Some(rest) = compact.strip_prefix("00") {
        ("+".to_string(), rest.to_string())
    } else if compact.len() == 10 && compact.starts_with('0') {
        // French national format
        ("+33".to_string(), compact[1..].to_string())
    } else {
        return None;
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = format!("{prefix}{digits}");
    // "+" plus country code and subscriber number
    if normalized.len() < 9 || normalized.len() > 16 {
        return None;
    }

    Some(normalized)
}

/// Shape check for email addresses (local@domain.tld, no full RFC parse).
#[must_use]
pub fn is_plausible_email(value: &str) -> bool {
    let re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid regex");
    re.is_match(value)
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}
