use crate::regex::{Regex, compile};
use once_cell::sync::Lazy;

static COLLAPSE_SPACE_REGEX: Lazy<Regex> = Lazy::new(|| compile(r"\s+"));

/// Removes formatting from an ISBN, making it suitable for web queries.
///
/// Spaces and hyphens are dropped and the result is lowercased, so a
/// trailing check digit `X` becomes `x`. Nothing is validated: malformed
/// identifiers pass through normalized but otherwise untouched.
///
/// # Arguments
///
/// * `isbn` - The identifier as printed or typed
///
/// ```
/// use biblio_webquery::normalize_isbn;
///
/// assert_eq!(normalize_isbn("0-312-53861-8"), "0312538618");
/// ```
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.replace([' ', '-'], "").to_lowercase().trim().to_string()
}

/// Collapses every run of whitespace into a single space and trims the ends.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    COLLAPSE_SPACE_REGEX.replace_all(s.trim(), " ").into_owned()
}
