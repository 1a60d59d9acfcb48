//! Splitting publication statements into publisher, city and year.
//!
//! Publication details are set out inconsistently even in curated
//! bibliographic data, e.g. `"New York: Asia Pub. House, c1979."` next to a
//! bare `"HarperTorch"`. The patterns below are tried in order and the first
//! one that matches decides the result.

use crate::regex::{Regex, compile};
use once_cell::sync::Lazy;

/// Publication statement layouts, most specific first.
static PUBLISHER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // "<city>: <publisher>, c<year>."
        r"(?i)^(?P<city>.*)\s*:\s*(?P<pub>.*)\s*,\s*c?(?P<year>\d{4})\.?$",
        r"(?i)^(?P<pub>.*)\.?$",
    ]
    .into_iter()
    .map(compile)
    .collect()
});

/// The parts of a publication statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublisherInfo {
    pub publisher: String,
    pub city: String,
    pub year: String,
}

impl From<PublisherInfo> for (String, String, String) {
    fn from(PublisherInfo { publisher, city, year }: PublisherInfo) -> Self {
        (publisher, city, year)
    }
}

/// Parses a string of publisher information.
///
/// Returns the publisher, the city of publication and the year of
/// publication, in that order. Parts that cannot be found are empty strings;
/// this never fails.
///
/// # Arguments
///
/// * `publisher` - Text giving publisher details
///
/// ```
/// use biblio_webquery::parse_publisher;
///
/// assert_eq!(
///     parse_publisher("New York: Asia Pub. House, c1979."),
///     ("Asia Pub. House".to_string(), "New York".to_string(), "1979".to_string())
/// );
/// assert_eq!(
///     parse_publisher("HarperTorch"),
///     ("HarperTorch".to_string(), String::new(), String::new())
/// );
/// ```
pub fn parse_publisher(publisher: &str) -> (String, String, String) {
    parse_publisher_info(publisher).into()
}

/// Like [`parse_publisher`], but with the parts named.
pub fn parse_publisher_info(publisher: &str) -> PublisherInfo {
    let publisher = publisher.trim();
    PUBLISHER_PATTERNS
        .iter()
        .find_map(|re| re.captures(publisher))
        .map(|caps| {
            let group = |name: &str| {
                caps.name(name)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default()
            };
            PublisherInfo {
                publisher: group("pub"),
                city: group("city"),
                year: group("year"),
            }
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case("New York: Asia Pub. House, c1979.", "Asia Pub. House", "New York", "1979")]
    #[case("New York : LearningExpress, 1999.", "LearningExpress", "New York", "1999")]
    #[case(
        "Berkeley Heights, NJ: Enslow Publishers, c2000.",
        "Enslow Publishers",
        "Berkeley Heights, NJ",
        "2000"
    )]
    #[case("Boston : Bedford/St. Martins, C2010", "Bedford/St. Martins", "Boston", "2010")]
    #[case("HarperTorch", "HarperTorch", "", "")]
    #[case("HarperTorch\n", "HarperTorch", "", "")]
    #[case("New York: Asia Pub. House, c1979.\n", "Asia Pub. House", "New York", "1979")]
    #[case("  Signet Classic  ", "Signet Classic", "", "")]
    #[case("Farnham ; O'Reilly, 2007.", "Farnham ; O'Reilly, 2007.", "", "")]
    #[case("", "", "", "")]
    fn test_parse_publisher(
        #[case] input: &str,
        #[case] publisher: &str,
        #[case] city: &str,
        #[case] year: &str,
    ) {
        assert_eq!(
            parse_publisher(input),
            (publisher.to_string(), city.to_string(), year.to_string())
        );
    }

    #[test]
    fn test_unmatched_input_yields_empty_parts() {
        assert_eq!(parse_publisher_info("Line one\nline two"), PublisherInfo::default());
    }
}
