//! Normalized bibliographic records and personal names.
//!
//! These are the structures the provider translators populate. A record is
//! built empty, filled in field by field while a webservice response is
//! translated, and only read afterwards.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The kind of work a [`BibRecord`] describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// Not determined by the provider.
    #[default]
    #[serde(rename = "")]
    Unknown,
    Book,
    /// A book whose authors are its editors.
    Collection,
    /// Audio, video, microform and other non-print forms.
    Misc,
}

impl RecordType {
    /// The short lowercase name of the type, empty for [`RecordType::Unknown`].
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Unknown => "",
            RecordType::Book => "book",
            RecordType::Collection => "collection",
            RecordType::Misc => "misc",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A name, as used for authors and editors.
///
/// The terms `given`, `other` and `family` are used in preference to
/// first/middle/last as they do not assume any particular ordering.
/// Only `given` is required, which allows single names such as "Madonna".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalName {
    /// The forename, e.g. "John"
    pub given: String,
    /// Any middle names, e.g. "James Richard"
    pub other: String,
    /// Surname, e.g. "Smith"
    pub family: String,
    /// Honorific such as "Dr."
    pub title: Option<String>,
    /// Name particle such as "van"
    pub prefix: Option<String>,
    /// Generational suffix such as "Jr."
    pub suffix: Option<String>,
}

impl PersonalName {
    /// Creates a name with only the given name set.
    #[must_use]
    pub fn new(given: impl Into<String>) -> Self {
        Self {
            given: given.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_other(mut self, other: impl Into<String>) -> Self {
        self.other = other.into();
        self
    }

    #[must_use]
    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = family.into();
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// The family name if there is one, otherwise the given name.
    ///
    /// This is what gets used when a single word has to stand for the person,
    /// e.g. in a file name.
    pub fn sort_name(&self) -> &str {
        if self.family.is_empty() {
            &self.given
        } else {
            &self.family
        }
    }
}

impl fmt::Display for PersonalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            self.prefix.as_deref(),
            self.title.as_deref(),
            Some(self.given.as_str()),
            Some(self.other.as_str()),
            Some(self.family.as_str()),
            self.suffix.as_deref(),
        ];
        let joined = parts
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .join(" ");
        f.write_str(&joined)
    }
}

/// A single bibliographic entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BibRecord {
    /// Usually the ISBN the record was retrieved by
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub lang: String,
    pub title: String,
    /// Authors in source order; the first is the primary author
    pub authors: Vec<PersonalName>,
    pub year: Option<String>,
    /// Whether `authors` are editors rather than authors
    pub edited: bool,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub publisher: String,
    /// City of publication
    pub city: String,
    pub journal: String,
    pub note: String,
    /// External identifiers keyed by kind, e.g. "isbn", "lccn", "oclcnum"
    pub ext_references: HashMap<String, Vec<String>>,
}

impl BibRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends values to the external references of the given kind.
    ///
    /// Existing values for `key` are kept; the new ones are added after them.
    pub fn add_ext_references<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ext_references
            .entry(key.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// The title up to the first `:` or `?`, trimmed.
    ///
    /// Titles without either character are returned whole.
    ///
    /// ```
    /// use biblio_webquery::BibRecord;
    ///
    /// let mut rec = BibRecord::new();
    /// rec.title = "RESTful Web Services : Web services for the real world".to_string();
    /// assert_eq!(rec.short_title(), "RESTful Web Services");
    /// ```
    pub fn short_title(&self) -> &str {
        match self.title.find([':', '?']) {
            Some(idx) => self.title[..idx].trim(),
            None => &self.title,
        }
    }

    /// The first listed author, if any.
    pub fn primary_author(&self) -> Option<&PersonalName> {
        self.authors.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case("Everything's an argument : with readings", "Everything's an argument")]
    #[case("Who moved my cheese? An amazing way", "Who moved my cheese")]
    #[case("1984", "1984")]
    #[case("  Padded title  ", "  Padded title  ")]
    #[case("", "")]
    fn test_short_title(#[case] title: &str, #[case] expected: &str) {
        let rec = BibRecord {
            title: title.to_string(),
            ..Default::default()
        };
        assert_eq!(rec.short_title(), expected);
    }

    #[test]
    fn test_ext_references_are_appended() {
        let mut rec = BibRecord::new();
        rec.add_ext_references("isbn", ["0596529260"]);
        rec.add_ext_references("isbn", vec!["9780596529260".to_string()]);
        rec.add_ext_references("lccn", Vec::<String>::new());
        assert_eq!(
            rec.ext_references["isbn"],
            vec!["0596529260", "9780596529260"]
        );
        assert!(rec.ext_references["lccn"].is_empty());
    }

    #[test]
    fn test_new_records_do_not_share_containers() {
        let mut first = BibRecord::new();
        first.keywords.push("rest".to_string());
        first.add_ext_references("isbn", ["1"]);
        let second = BibRecord::new();
        assert!(second.keywords.is_empty());
        assert!(second.ext_references.is_empty());
    }

    #[test]
    fn test_personal_name_display() {
        let name = PersonalName::new("John")
            .with_other("James")
            .with_family("Smith")
            .with_title("Dr.")
            .with_suffix("Jr.");
        assert_eq!(name.to_string(), "Dr. John James Smith Jr.");
        assert_eq!(PersonalName::new("Madonna").to_string(), "Madonna");
    }

    #[test]
    fn test_sort_name_falls_back_to_given() {
        assert_eq!(PersonalName::new("Madonna").sort_name(), "Madonna");
        let name = PersonalName::new("Sam").with_family("Ruby");
        assert_eq!(name.sort_name(), "Ruby");
    }

    #[test]
    fn test_record_type_serializes_lowercase() {
        let rec = BibRecord {
            record_type: RecordType::Collection,
            ..Default::default()
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["type"], "collection");
        assert_eq!(RecordType::Unknown.to_string(), "");
    }
}
