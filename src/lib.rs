//! Retrieve bibliographic metadata from public webservices by ISBN, and
//! normalize the inconsistently formatted text those services return.
//!
//! `biblio-webquery` talks to WorldCat xISBN, ISBNdb and the Library of
//! Congress. Their answers are free text put together by many different
//! catalogue systems, so most of this crate is about normalizing it into a
//! uniform [`BibRecord`].
//!
//! # Key Features
//!
//! - **Name parsing**: split author strings into [`PersonalName`]s, in either
//!   "Family, Given" or "Given Family" order, stripping decoration such as
//!   "by", "et al." and trailing clauses
//! - **Editor detection**: recognise "edited by ..." and "..., editors"
//! - **Publisher parsing**: split `"New York: Asia Pub. House, c1979."` into
//!   publisher, city and year
//! - **ISBN normalization** for use in queries
//! - **Query throttling**: stay within per-second or absolute query limits
//! - **Webservice clients** for xISBN, ISBNdb and the Library of Congress,
//!   over any transport implementing [`Fetch`]
//!
//! # Basic Usage
//!
//! ```rust
//! use biblio_webquery::{parse_editing_info, parse_names, parse_publisher};
//!
//! let (edited, authors) = parse_editing_info("Leonard Richardson and Sam Ruby.");
//! assert!(!edited);
//! let names = parse_names(&authors);
//! assert_eq!(names[0].family, "Richardson");
//!
//! let (publisher, city, year) = parse_publisher("New York: Asia Pub. House, c1979.");
//! assert_eq!((publisher.as_str(), city.as_str(), year.as_str()), ("Asia Pub. House", "New York", "1979"));
//! ```
//!
//! # Querying a Service
//!
//! ```rust
//! use biblio_webquery::{BibdataQuery, Lookup, XisbnQuery};
//! use biblio_webquery::throttle::IntervalThrottle;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let transport = |_url: &str, _timeout: Duration| -> biblio_webquery::Result<String> {
//!     Ok(r#"{"stat":"ok","list":[{"isbn":["0596529260"],"title":"RESTful web services",
//!            "author":"Leonard Richardson and Sam Ruby.","form":["BA"]}]}"#.to_string())
//! };
//! let xisbn = XisbnQuery::new(Arc::new(transport))
//!     .with_limit(IntervalThrottle::one_second().shared());
//!
//! match xisbn.query_bibdata_by_isbn("0-596-52926-0").unwrap() {
//!     Lookup::Found(records) => assert_eq!(records[0].authors[1].family, "Ruby"),
//!     Lookup::NotFound => unreachable!(),
//! }
//! ```
//!
//! # Error Handling
//!
//! The text normalizers never fail; they return whatever they could make of
//! their input. Queries return the crate's [`Result`], whose
//! [`WebQueryError`] separates throttling, transport, parse and service
//! errors. A service that simply has no record answers with
//! [`Lookup::NotFound`] rather than an error.
//!
//! # Thread Safety
//!
//! Throttles check and record a query under a single lock, so one throttle
//! can be shared between threads and clients without exceeding its limit.

use thiserror::Error;

pub mod config;
#[cfg(feature = "xml")]
pub mod isbndb;
pub mod loc;
pub mod names;
pub mod publisher;
pub mod record;
mod regex;
pub mod throttle;
mod utils;
pub mod webquery;
pub mod xisbn;

// Reexports
pub use config::{Service, ServiceConfig, ThrottleConfig};
#[cfg(feature = "xml")]
pub use isbndb::IsbndbQuery;
pub use loc::LocQuery;
pub use names::{parse_editing_info, parse_names, parse_single_name};
pub use publisher::parse_publisher;
pub use record::{BibRecord, PersonalName, RecordType};
pub use throttle::{FailAction, Throttle};
pub use utils::normalize_isbn;
pub use webquery::{BibdataQuery, Fetch, Lookup, WebQuery};
#[cfg(feature = "http")]
pub use webquery::HttpFetcher;
pub use xisbn::XisbnQuery;

/// A specialized Result type for webservice queries.
pub type Result<T> = std::result::Result<T, WebQueryError>;

/// Represents errors that can occur while querying a webservice.
#[derive(Error, Debug)]
pub enum WebQueryError {
    /// The service answered, but with a bad status.
    #[error("Query error: {0}")]
    Query(String),

    /// The service's answer could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A throttle refused the query.
    #[error("Query limit exceeded: {0}")]
    QueryThrottle(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for WebQueryError {
    fn from(err: serde_json::Error) -> Self {
        WebQueryError::Parse(err.to_string())
    }
}

#[cfg(feature = "xml")]
impl From<quick_xml::Error> for WebQueryError {
    fn from(err: quick_xml::Error) -> Self {
        WebQueryError::Parse(err.to_string())
    }
}

#[cfg(feature = "xml")]
impl From<quick_xml::events::attributes::AttrError> for WebQueryError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        WebQueryError::Parse(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for WebQueryError {
    fn from(err: reqwest::Error) -> Self {
        WebQueryError::Transport(err.to_string())
    }
}
