//! Querying the WorldCat xISBN service for bibliographic information.
//!
//! xISBN answers metadata queries with one entry per edition, each a flat
//! set of mostly free-text fields. [`xisbn_to_bibrecords`] translates those
//! entries into [`BibRecord`]s, running the author field through the editor
//! detection and name parsing heuristics.

use crate::names::{parse_editing_info, parse_names};
use crate::record::{BibRecord, RecordType};
use crate::throttle::SharedThrottle;
use crate::utils::normalize_isbn;
use crate::webquery::{BibdataQuery, Fetch, Lookup, WebQuery};
use crate::{Result, WebQueryError};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const XISBN_ROOT_URL: &str = "http://xisbn.worldcat.org/webservices/xid/isbn/";

/// ONIX product form codes for printed books.
const BOOK_FORMS: &[&str] = &["BA", "BB", "BC"];

/// Response formats offered by xISBN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XisbnFormat {
    Xml,
    Html,
    Json,
    Python,
    Ruby,
    Php,
    Csv,
    Txt,
}

impl XisbnFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            XisbnFormat::Xml => "xml",
            XisbnFormat::Html => "html",
            XisbnFormat::Json => "json",
            XisbnFormat::Python => "python",
            XisbnFormat::Ruby => "ruby",
            XisbnFormat::Php => "php",
            XisbnFormat::Csv => "csv",
            XisbnFormat::Txt => "txt",
        }
    }
}

/// Request types understood by xISBN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XisbnMethod {
    GetMetadata,
    GetEditions,
    To13,
    To10,
    FixChecksum,
    Hyphen,
}

impl XisbnMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            XisbnMethod::GetMetadata => "getMetadata",
            XisbnMethod::GetEditions => "getEditions",
            XisbnMethod::To13 => "to13",
            XisbnMethod::To10 => "to10",
            XisbnMethod::FixChecksum => "fixChecksum",
            XisbnMethod::Hyphen => "hyphen",
        }
    }
}

/// Client for the xISBN webservice.
#[derive(Debug, Clone)]
pub struct XisbnQuery {
    query: WebQuery,
}

impl XisbnQuery {
    /// Creates a client fetching through `fetcher`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            query: WebQuery::with_fetcher(XISBN_ROOT_URL, fetcher),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.query = self.query.with_timeout(timeout);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: SharedThrottle) -> Self {
        self.query = self.query.with_limit(limit);
        self
    }

    pub fn webquery(&self) -> &WebQuery {
        &self.query
    }

    /// A generalised query for xISBN.
    ///
    /// The ISBN is normalized before it is sent. `fields` lists the fields
    /// to include in the response; `["*"]` asks for all of them.
    ///
    /// # Arguments
    ///
    /// * `isbn` - An ISBN-10 or ISBN-13
    /// * `method` - The request type
    /// * `format` - The form of the response
    /// * `fields` - The fields to include in the response
    pub fn query_service(
        &self,
        isbn: &str,
        method: XisbnMethod,
        format: XisbnFormat,
        fields: &[&str],
    ) -> Result<String> {
        let sub_url = format!(
            "{}?method={}&format={}&fl={}",
            normalize_isbn(isbn),
            method.as_str(),
            format.as_str(),
            fields.join(",")
        );
        self.query.request(&sub_url)
    }

    /// Returns publication data for an ISBN as records.
    pub fn query_bibdata_by_isbn(&self, isbn: &str) -> Result<Lookup> {
        let response =
            self.query_service(isbn, XisbnMethod::GetMetadata, XisbnFormat::Json, &["*"])?;
        xisbn_to_bibrecords(&response).map(Lookup::from_records)
    }

    /// Returns the raw description of every edition associated with an ISBN.
    pub fn query_editions_by_isbn(&self, isbn: &str, format: XisbnFormat) -> Result<String> {
        self.query_service(isbn, XisbnMethod::GetEditions, format, &["*"])
    }

    /// Runs one of the methods that answer with ISBNs and collects them.
    pub fn query_isbn(&self, isbn: &str, method: XisbnMethod) -> Result<Vec<String>> {
        let response = self.query_service(isbn, method, XisbnFormat::Json, &["*"])?;
        Ok(xisbn_to_list(&response)?
            .into_iter()
            .flat_map(|entry| entry.isbn)
            .collect())
    }

    pub fn query_isbn10_to_13(&self, isbn: &str) -> Result<Vec<String>> {
        self.query_isbn(isbn, XisbnMethod::To13)
    }

    pub fn query_isbn13_to_10(&self, isbn: &str) -> Result<Vec<String>> {
        self.query_isbn(isbn, XisbnMethod::To10)
    }

    pub fn query_fix_isbn_csum(&self, isbn: &str) -> Result<Vec<String>> {
        self.query_isbn(isbn, XisbnMethod::FixChecksum)
    }

    pub fn query_hyphenate_isbn(&self, isbn: &str) -> Result<Vec<String>> {
        self.query_isbn(isbn, XisbnMethod::Hyphen)
    }
}

impl BibdataQuery for XisbnQuery {
    fn query_bibdata_by_isbn(&self, isbn: &str) -> Result<Lookup> {
        XisbnQuery::query_bibdata_by_isbn(self, isbn)
    }
}

#[derive(Debug, Deserialize)]
struct XisbnResponse {
    #[serde(default = "default_stat")]
    stat: String,
    #[serde(default)]
    list: Vec<XisbnEntry>,
}

fn default_stat() -> String {
    "ok".to_string()
}

/// One entry of an xISBN reply.
///
/// List fields may come either as arrays or as space-delimited strings.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct XisbnEntry {
    #[serde(deserialize_with = "one_or_many")]
    pub isbn: Vec<String>,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub lang: String,
    pub city: String,
    pub year: String,
    #[serde(deserialize_with = "one_or_many")]
    pub form: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub lccn: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub oclcnum: Vec<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => s.split_whitespace().map(String::from).collect(),
        OneOrMany::Many(v) => v,
    })
}

/// Decodes an xISBN JSON reply into its entries.
///
/// An `unknownId` status means the identifier was valid but unknown, and
/// gives an empty list.
///
/// # Errors
///
/// Returns [`WebQueryError::Parse`] for malformed JSON and
/// [`WebQueryError::Query`] for any other status than `ok`.
pub fn xisbn_to_list(json: &str) -> Result<Vec<XisbnEntry>> {
    let response: XisbnResponse = serde_json::from_str(json)?;
    match response.stat.as_str() {
        "ok" => Ok(response.list),
        "unknownId" => Ok(Vec::new()),
        status => Err(WebQueryError::Query(format!(
            "response status was bad ({status})"
        ))),
    }
}

/// Translates an xISBN JSON reply into records.
///
/// # Errors
///
/// See [`xisbn_to_list`].
pub fn xisbn_to_bibrecords(json: &str) -> Result<Vec<BibRecord>> {
    let records: Vec<BibRecord> = xisbn_to_list(json)?.into_iter().map(BibRecord::from).collect();
    debug!(count = records.len(), "decoded xISBN records");
    Ok(records)
}

impl From<XisbnEntry> for BibRecord {
    fn from(entry: XisbnEntry) -> Self {
        let (edited, authors) = parse_editing_info(&entry.author);
        let form = entry
            .form
            .first()
            .and_then(|f| f.split_whitespace().next())
            .unwrap_or("")
            .to_uppercase();
        let record_type = match (BOOK_FORMS.contains(&form.as_str()), edited) {
            (true, true) => RecordType::Collection,
            (true, false) => RecordType::Book,
            // AA (Audio), DA (Digital), FA (Film), MA (Microform), VA (Video)
            (false, _) => RecordType::Misc,
        };

        let mut record = BibRecord {
            id: entry.isbn.first().cloned().unwrap_or_default(),
            record_type,
            lang: entry.lang,
            title: entry.title,
            authors: parse_names(&authors),
            year: Some(entry.year).filter(|y| !y.is_empty()),
            edited,
            publisher: entry.publisher,
            city: entry.city,
            ..Default::default()
        };
        record.add_ext_references("isbn", entry.isbn);
        record.add_ext_references("lccn", entry.lccn);
        record.add_ext_references("oclcnum", entry.oclcnum);
        record
    }
}
