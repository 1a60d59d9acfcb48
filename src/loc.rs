//! Querying the Library of Congress SRU gateway for bibliographic information.
//!
//! Replies are returned as raw XML in the requested record schema; they are
//! not translated into [`BibRecord`](crate::BibRecord)s.

use crate::Result;
use crate::throttle::SharedThrottle;
use crate::utils::normalize_isbn;
use crate::webquery::{Fetch, WebQuery};
use std::sync::Arc;
use std::time::Duration;

pub const LOC_ROOT_URL: &str =
    "http://z3950.loc.gov:7090/voyager?operation=searchRetrieve&version=1.1";

/// Most records asked for in one search.
const MAX_RECORDS: usize = 5;

/// Record schemas the gateway can answer in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordSchema {
    #[default]
    Mods,
    OpacXml,
    Dc,
    MarcXml,
}

impl RecordSchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSchema::Mods => "mods",
            RecordSchema::OpacXml => "opacxml",
            RecordSchema::Dc => "dc",
            RecordSchema::MarcXml => "marcxml",
        }
    }
}

/// Client for the Library of Congress.
#[derive(Debug, Clone)]
pub struct LocQuery {
    query: WebQuery,
}

impl LocQuery {
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            query: WebQuery::with_fetcher(LOC_ROOT_URL, fetcher),
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

    /// Returns the metadata for a publication specified by ISBN.
    pub fn query_bibdata_by_isbn(&self, isbn: &str, schema: RecordSchema) -> Result<String> {
        let sub_url = format!(
            "&recordSchema={}&startRecord=1&maximumRecords={}&query=bath.standardIdentifier={}",
            schema.as_str(),
            MAX_RECORDS,
            normalize_isbn(isbn)
        );
        self.query.request(&sub_url)
    }
}
