//! Querying ISBNdb for bibliographic information.
//!
//! ISBNdb requires an access key and answers in XML. Its book entries
//! usually carry authors both as a list of `Person` elements and as a free
//! text `AuthorsText`; the structured list is preferred when present.

use crate::names::{parse_editing_info, parse_names, parse_single_name};
use crate::publisher::parse_publisher_info;
use crate::record::{BibRecord, RecordType};
use crate::throttle::SharedThrottle;
use crate::utils::normalize_isbn;
use crate::webquery::{BibdataQuery, Fetch, Lookup, WebQuery};
use crate::{Result, WebQueryError};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const ISBNDB_ROOT_URL: &str = "http://isbndb.com/api/books.xml?access_key={key}&";

/// Result blocks requested when looking up publication data.
const BIBDATA_RESULTS: &[&str] = &["authors", "subjects", "texts", "details"];

/// Client for the ISBNdb webservice.
#[derive(Debug, Clone)]
pub struct IsbndbQuery {
    query: WebQuery,
}

impl IsbndbQuery {
    /// Creates a client using the access key `key`.
    #[must_use]
    pub fn new(key: impl Into<String>, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            query: WebQuery::with_fetcher(ISBNDB_ROOT_URL, fetcher).with_key(key),
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

    /// A generalised query for ISBNdb.
    ///
    /// ISBN values are normalized before they are sent. Not every
    /// combination of index and result blocks makes sense to the service.
    ///
    /// # Arguments
    ///
    /// * `index` - The index to search, e.g. "isbn" or "name"
    /// * `value` - The value to search the index for
    /// * `results` - The result blocks to include in the response
    pub fn query_service(&self, index: &str, value: &str, results: &[&str]) -> Result<String> {
        let value = if index == "isbn" {
            normalize_isbn(value)
        } else {
            value.to_string()
        };
        let mut sub_url = format!("index1={}&value1={}", index, urlencoding::encode(&value));
        if !results.is_empty() {
            sub_url.push_str("&results=");
            sub_url.push_str(&results.join(","));
        }
        self.query.request(&sub_url)
    }

    /// Returns publication data for an ISBN as records.
    pub fn query_bibdata_by_isbn(&self, isbn: &str) -> Result<Lookup> {
        let response = self.query_service("isbn", isbn, BIBDATA_RESULTS)?;
        isbndb_xml_to_bibrecords(&response).map(Lookup::from_records)
    }

    /// Searches author data by name, returning the raw XML.
    pub fn query_author_by_name(&self, name: &str, results: &[&str]) -> Result<String> {
        self.query_service("name", name, results)
    }

    /// Searches author data by ISBNdb's `person_id`, returning the raw XML.
    pub fn query_author_by_id(&self, person_id: &str, results: &[&str]) -> Result<String> {
        self.query_service("person_id", person_id, results)
    }
}

impl BibdataQuery for IsbndbQuery {
    fn query_bibdata_by_isbn(&self, isbn: &str) -> Result<Lookup> {
        IsbndbQuery::query_bibdata_by_isbn(self, isbn)
    }
}

/// A minimal element tree, enough to walk an ISBNdb reply.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart) -> Result<Self> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            attributes.push((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                attr.unescape_value()?.into_owned(),
            ));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            ..Default::default()
        })
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// The trimmed text of the first child called `name`, empty if missing.
    fn find_text(&self, name: &str) -> String {
        self.find(name)
            .map(|child| child.text.trim().to_string())
            .unwrap_or_default()
    }

    /// Every element called `name` below this one, in document order.
    fn descendants<'a>(&'a self, name: &'a str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.descendants(name, found);
        }
    }
}

fn read_tree(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    loop {
        let finished = match reader.read_event()? {
            Event::Start(e) => {
                stack.push(Element::from_start(&e)?);
                None
            }
            Event::Empty(e) => {
                let element = Element::from_start(&e)?;
                match stack.last_mut() {
                    Some(parent) => {
                        parent.children.push(element);
                        None
                    }
                    None => Some(element),
                }
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&e.unescape()?);
                }
                None
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e));
                }
                None
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    WebQueryError::Parse("unbalanced closing tag in ISBNdb document".to_string())
                })?;
                match stack.last_mut() {
                    Some(parent) => {
                        parent.children.push(element);
                        None
                    }
                    None => Some(element),
                }
            }
            Event::Eof => {
                return Err(WebQueryError::Parse(
                    "ISBNdb document is empty or truncated".to_string(),
                ));
            }
            _ => None,
        };
        if let Some(root) = finished {
            return Ok(root);
        }
    }
}

/// Translates an ISBNdb XML reply into records.
///
/// # Errors
///
/// Returns [`WebQueryError::Parse`] if the XML is malformed or is not an
/// `ISBNdb` document holding a single `BookList`, and
/// [`WebQueryError::Query`] if the service reported an error instead.
pub fn isbndb_xml_to_bibrecords(xml: &str) -> Result<Vec<BibRecord>> {
    let root = read_tree(xml)?;
    if root.name != "ISBNdb" {
        return Err(WebQueryError::Parse(format!(
            "ISBNdb document root should be 'ISBNdb', not '{}'",
            root.name
        )));
    }
    if let Some(message) = root.find("ErrorMessage") {
        return Err(WebQueryError::Query(message.text.trim().to_string()));
    }
    if root.children.len() != 1 {
        return Err(WebQueryError::Parse(format!(
            "ISBNdb document root has wrong number of children ({})",
            root.children.len()
        )));
    }
    let book_list = &root.children[0];
    if book_list.name != "BookList" {
        return Err(WebQueryError::Parse(format!(
            "ISBNdb document should contain 'BookList', not '{}'",
            book_list.name
        )));
    }

    let records: Vec<BibRecord> = book_list.find_all("BookData").map(book_data_to_record).collect();
    debug!(count = records.len(), "decoded ISBNdb records");
    Ok(records)
}

fn book_data_to_record(book: &Element) -> BibRecord {
    let mut record = BibRecord {
        record_type: RecordType::Book,
        id: book.attribute("isbn").unwrap_or_default().to_string(),
        abstract_text: book.find_text("Summary"),
        note: book.find_text("Notes"),
        ..Default::default()
    };

    record.title = match book.find_text("TitleLong") {
        long if long.is_empty() => book.find_text("Title"),
        long => long,
    };

    let mut subjects = Vec::new();
    book.descendants("Subject", &mut subjects);
    record.keywords = subjects
        .into_iter()
        .map(|subject| subject.text.trim().to_string())
        .filter(|subject| !subject.is_empty())
        .collect();

    let people: Vec<&Element> = book
        .find("Authors")
        .map(|authors| authors.find_all("Person").collect())
        .unwrap_or_default();
    if !people.is_empty() {
        record.authors = people
            .into_iter()
            .map(|person| parse_single_name(person.text.trim()))
            .collect();
    } else {
        let (edited, authors) = parse_editing_info(&book.find_text("AuthorsText"));
        record.edited = edited;
        record.authors = parse_names(&authors);
    }

    let publisher_text = book.find_text("PublisherText");
    if !publisher_text.is_empty() {
        let info = parse_publisher_info(&publisher_text);
        record.publisher = info.publisher;
        record.city = info.city;
        record.year = Some(info.year).filter(|year| !year.is_empty());
    }

    let isbns = [book.attribute("isbn"), book.attribute("isbn13")]
        .into_iter()
        .flatten()
        .filter(|isbn| !isbn.is_empty());
    record.add_ext_references("isbn", isbns);
    record
}
