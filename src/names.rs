//! Heuristics for turning free-form author strings into [`PersonalName`]s.
//!
//! Catalogue systems supply author fields in wildly varying shapes: reversed
//! or natural order, joined with "and" or commas, decorated with "by",
//! "et al.", bracketed asides or trailing clauses about illustrators. The
//! functions here strip the decoration with an ordered table of patterns,
//! split the remainder into individual names and decompose each one.
//!
//! # Example
//!
//! ```
//! use biblio_webquery::{parse_editing_info, parse_names};
//!
//! let (edited, authors) =
//!     parse_editing_info("Stephen P. Schoenberger, Bali Pulendran, editors.");
//! assert!(edited);
//!
//! let names = parse_names(&authors);
//! assert_eq!(names.len(), 2);
//! assert_eq!(names[0].family, "Schoenberger");
//! assert_eq!(names[0].other, "P.");
//! ```

use crate::record::PersonalName;
use crate::regex::{Regex, compile};
use crate::utils::collapse_whitespace;
use once_cell::sync::Lazy;
use tracing::trace;

/// Decoration removed from author lists, applied in order.
///
/// Later entries assume the earlier ones have already removed the
/// surrounding noise, so the order must be kept.
static STRIP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // "by ..."
        r"(?i)^by\s+",
        r"(?i)\s*;\s+with an introduction by .*$",
        r"(?i)^\[\s*",
        r"(?i)\s*\]$",
        // "..."
        r"(?i)\.{3,}",
        // "et al."
        r"(?i)et[\. ]al\.",
        r"(?i)\[",
        r"(?i)\]",
        r"(?i)\([^\)]+\)",
        r"(?i)\s*;.*$",
    ]
    .into_iter()
    .map(compile)
    .collect()
});

/// Phrases marking the names as editors, tried in order.
static EDITOR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // "edited by ..."
        r"(?i)^edited by\s+",
        // "..., editors"
        r"(?i)\s*, editors\.?$",
        // "editors, ..."
        r"(?i)^editors,?\s*",
    ]
    .into_iter()
    .map(compile)
    .collect()
});

static AND_REGEX: Lazy<Regex> = Lazy::new(|| compile(r"\s+and\s+"));

/// Decomposes a single name into given, other and family parts.
///
/// Names containing `", "` are read as "Family, Given Other"; anything else
/// as "Given Other Family". A single word ends up as the given name with no
/// family name, and a trailing period is dropped from the family name since
/// catalogue strings often end in one.
///
/// # Arguments
///
/// * `name` - One person's name, in either order
///
/// ```
/// use biblio_webquery::parse_single_name;
///
/// let name = parse_single_name("Richardson, Leonard");
/// assert_eq!(name.family, "Richardson");
/// assert_eq!(name.given, "Leonard");
///
/// let name = parse_single_name("Madonna");
/// assert_eq!(name.given, "Madonna");
/// assert!(name.family.is_empty());
/// ```
pub fn parse_single_name(name: &str) -> PersonalName {
    let name = collapse_whitespace(name);

    let (given, other, family) = match name.split_once(", ") {
        Some((family, given_other)) => {
            let (given, other) = given_other.split_once(' ').unwrap_or((given_other, ""));
            (given, other.to_string(), family.trim())
        }
        None => {
            let tokens: Vec<&str> = name.split(' ').collect();
            match tokens.as_slice() {
                [given, other @ .., family] => (*given, other.join(" "), *family),
                [given] => (*given, String::new(), ""),
                [] => ("", String::new(), ""),
            }
        }
    };
    let family = family.strip_suffix('.').unwrap_or(family);

    PersonalName::new(given)
        .with_other(other)
        .with_family(family)
}

/// Cleans up a list of names into a consistent sequence of [`PersonalName`]s.
///
/// Decoration such as a leading "by", "et al.", bracketed and parenthesized
/// asides and any clause after a semicolon is removed first. Names joined by
/// "and" are then treated as comma separated, the list is split on `", "`
/// and every piece is parsed with [`parse_single_name`]. Source order is kept,
/// and a piece left empty by the cleanup still yields a name with an empty
/// `given` so the count matches the source.
///
/// # Arguments
///
/// * `names` - The raw author field from a webservice record
///
/// ```
/// use biblio_webquery::parse_names;
///
/// let names = parse_names("Leonard Richardson and Sam Ruby.");
/// assert_eq!(names.len(), 2);
/// assert_eq!(names[0].family, "Richardson");
/// assert_eq!(names[1].family, "Ruby");
///
/// assert!(parse_names("").is_empty());
/// ```
pub fn parse_names(names: &str) -> Vec<PersonalName> {
    let names = names.trim();
    if names.is_empty() {
        return Vec::new();
    }

    let stripped = STRIP_PATTERNS
        .iter()
        .fold(names.to_string(), |acc, re| re.replace_all(&acc, "").into_owned());
    let joined = AND_REGEX.replace_all(&stripped, ", ");
    trace!(raw = names, cleaned = %joined, "splitting author list");

    joined
        .split(", ")
        .map(parse_single_name)
        .collect()
}

/// Detects whether a names string describes editors.
///
/// Returns whether an editing phrase ("edited by ...", "..., editors",
/// "editors, ...") was recognised, along with the string with that phrase
/// removed. Only the first matching phrase is removed. Call this before
/// [`parse_names`], otherwise the marker ends up glued to the last name.
///
/// # Arguments
///
/// * `names` - The raw author field from a webservice record
///
/// ```
/// use biblio_webquery::parse_editing_info;
///
/// assert_eq!(
///     parse_editing_info("Stephen P. Schoenberger, Bali Pulendran, editors."),
///     (true, "Stephen P. Schoenberger, Bali Pulendran".to_string())
/// );
/// assert_eq!(parse_editing_info("Madonna"), (false, "Madonna".to_string()));
/// ```
pub fn parse_editing_info(names: &str) -> (bool, String) {
    let names = names.trim();
    if names.is_empty() {
        return (false, String::new());
    }

    EDITOR_PATTERNS
        .iter()
        .find(|re| re.is_match(names))
        .map(|re| (true, re.replace_all(names, "").into_owned()))
        .unwrap_or_else(|| (false, names.to_string()))
}
