//! The common request path shared by every webservice client.
//!
//! A [`WebQuery`] holds a service's root URL, an optional access key, a
//! timeout and the throttles limiting its use. Every request goes through
//! [`WebQuery::request`], which checks each throttle before handing the URL
//! to the transport.
//!
//! The transport is anything implementing [`Fetch`]. Closures work, which
//! keeps tests off the network:
//!
//! ```
//! use biblio_webquery::webquery::WebQuery;
//! use std::time::Duration;
//!
//! let query = WebQuery::new(
//!     "http://example.org/api?",
//!     |url: &str, _timeout: Duration| -> biblio_webquery::Result<String> {
//!         Ok(format!("fetched {url}"))
//!     },
//! );
//! assert_eq!(query.request("isbn=0596529260").unwrap(), "fetched http://example.org/api?isbn=0596529260");
//! ```

use crate::record::BibRecord;
use crate::throttle::SharedThrottle;
use crate::{Result, WebQueryError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Timeout applied to requests unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Placeholder in a root or sub URL that is replaced by the access key.
pub const KEY_PLACEHOLDER: &str = "{key}";

/// The transport used to retrieve a URL.
pub trait Fetch: Send + Sync {
    /// Retrieves `url`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Implementations report network failures as
    /// [`WebQueryError::Transport`].
    fn fetch(&self, url: &str, timeout: Duration) -> Result<String>;
}

impl<F> Fetch for F
where
    F: Fn(&str, Duration) -> Result<String> + Send + Sync,
{
    fn fetch(&self, url: &str, timeout: Duration) -> Result<String> {
        self(url, timeout)
    }
}

/// The outcome of a lookup that reached the service.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The service knew the identifier.
    Found(Vec<BibRecord>),
    /// The service answered but had no record for the identifier.
    NotFound,
}

impl Lookup {
    /// Wraps decoded records, treating an empty list as not found.
    pub fn from_records(records: Vec<BibRecord>) -> Self {
        if records.is_empty() {
            Lookup::NotFound
        } else {
            Lookup::Found(records)
        }
    }

    /// The records found, empty when nothing was.
    pub fn into_records(self) -> Vec<BibRecord> {
        match self {
            Lookup::Found(records) => records,
            Lookup::NotFound => Vec::new(),
        }
    }
}

/// A webservice that returns bibliographic records for an ISBN.
pub trait BibdataQuery: Send + Sync {
    /// Looks up the publication data for an ISBN-10 or ISBN-13.
    ///
    /// # Errors
    ///
    /// Throttle, transport, parse and service errors are passed on.
    fn query_bibdata_by_isbn(&self, isbn: &str) -> Result<Lookup>;
}

/// A client for one webservice.
#[derive(Clone)]
pub struct WebQuery {
    root_url: String,
    key: Option<String>,
    timeout: Duration,
    limits: Vec<SharedThrottle>,
    fetcher: Arc<dyn Fetch>,
}

impl WebQuery {
    /// Creates a client for the service at `root_url`.
    ///
    /// `root_url` is the stem common to every request; the part that varies
    /// is passed to [`WebQuery::request`].
    pub fn new(root_url: impl Into<String>, fetcher: impl Fetch + 'static) -> Self {
        Self::with_fetcher(root_url, Arc::new(fetcher))
    }

    /// Creates a client that shares an existing transport.
    pub fn with_fetcher(root_url: impl Into<String>, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            root_url: root_url.into(),
            key: None,
            timeout: DEFAULT_TIMEOUT,
            limits: Vec::new(),
            fetcher,
        }
    }

    /// Sets the access key substituted for [`KEY_PLACEHOLDER`].
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a throttle that must allow every request.
    #[must_use]
    pub fn with_limit(mut self, limit: SharedThrottle) -> Self {
        self.limits.push(limit);
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: impl IntoIterator<Item = SharedThrottle>) -> Self {
        self.limits.extend(limits);
        self
    }

    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn limits(&self) -> &[SharedThrottle] {
        &self.limits
    }

    /// Sends a request to the webservice and returns the response body.
    ///
    /// Every throttle is checked first, in the order they were added. The
    /// full URL is the root URL followed by `sub_url`.
    ///
    /// # Errors
    ///
    /// Fails if a throttle refuses the query, if the URL needs an access key
    /// that was not given, or if the transport fails.
    pub fn request(&self, sub_url: &str) -> Result<String> {
        for limit in &self.limits {
            limit.check_limit(&self.root_url)?;
        }
        let url = self.build_request_url(sub_url)?;
        debug!(%url, timeout = ?self.timeout, "sending webservice request");
        self.fetcher.fetch(&url, self.timeout)
    }

    /// Assembles the full URL, filling in the access key if there is one.
    fn build_request_url(&self, sub_url: &str) -> Result<String> {
        let url = format!("{}{}", self.root_url, sub_url);
        match (&self.key, url.contains(KEY_PLACEHOLDER)) {
            (Some(key), _) => Ok(url.replace(KEY_PLACEHOLDER, key)),
            (None, true) => Err(WebQueryError::Config(format!(
                "request to {} requires an access key",
                self.root_url
            ))),
            (None, false) => Ok(url),
        }
    }
}

impl fmt::Debug for WebQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebQuery")
            .field("root_url", &self.root_url)
            .field("timeout", &self.timeout)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// A [`Fetch`] implementation on a blocking `reqwest` client.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "http")]
impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<String> {
        let body = self
            .client
            .get(url)
            .timeout(timeout)
            .send()?
            .error_for_status()?
            .text()?;
        Ok(body)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::throttle::AbsoluteNumberThrottle;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Answers every request with a canned body and records the URLs asked for.
    #[derive(Debug, Default)]
    pub(crate) struct StubFetcher {
        body: String,
        pub(crate) urls: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        pub(crate) fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                urls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn requested(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    impl Fetch for StubFetcher {
        fn fetch(&self, url: &str, _timeout: Duration) -> Result<String> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(self.body.clone())
        }
    }

    #[test]
    fn test_request_joins_root_and_sub_url() {
        let stub = StubFetcher::new("ok");
        let query = WebQuery::with_fetcher("http://example.org/", stub.clone());
        assert_eq!(query.request("isbn/123").unwrap(), "ok");
        assert_eq!(stub.requested(), vec!["http://example.org/isbn/123"]);
    }

    #[test]
    fn test_request_substitutes_key() {
        let stub = StubFetcher::new("ok");
        let query = WebQuery::with_fetcher("http://example.org/api?access_key={key}&", stub.clone())
            .with_key("SECRET");
        query.request("value1=1").unwrap();
        assert_eq!(
            stub.requested(),
            vec!["http://example.org/api?access_key=SECRET&value1=1"]
        );
    }

    #[test]
    fn test_request_without_required_key_fails() {
        let stub = StubFetcher::new("ok");
        let query = WebQuery::with_fetcher("http://example.org/api?access_key={key}&", stub.clone());
        assert!(matches!(
            query.request("value1=1"),
            Err(WebQueryError::Config(_))
        ));
        assert!(stub.requested().is_empty());
    }

    #[test]
    fn test_throttle_is_checked_before_fetching() {
        let stub = StubFetcher::new("ok");
        let query = WebQuery::with_fetcher("http://example.org/", stub.clone())
            .with_limit(AbsoluteNumberThrottle::new(1).shared());
        assert!(query.request("a").is_ok());
        assert!(matches!(
            query.request("b"),
            Err(WebQueryError::QueryThrottle(_))
        ));
        assert_eq!(stub.requested(), vec!["http://example.org/a"]);
    }

    fn empty_body(_url: &str, _timeout: Duration) -> Result<String> {
        Ok(String::new())
    }

    #[test]
    fn test_throttle_shared_between_clients() {
        let limit = AbsoluteNumberThrottle::new(1).shared();
        let first = WebQuery::new("http://one.example/", empty_body).with_limit(limit.clone());
        let second = WebQuery::new("http://two.example/", empty_body).with_limit(limit.clone());
        assert!(first.request("").is_ok());
        assert!(second.request("").is_err());
        assert!(limit.check_limit("third").is_err());
    }

    #[test]
    fn test_transport_error_propagates() {
        let query = WebQuery::new("http://example.org/", |url: &str, timeout: Duration| -> Result<String> {
            Err(WebQueryError::Transport(format!("{url} timed out after {timeout:?}")))
        })
        .with_timeout(Duration::from_millis(250));
        let err = query.request("x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Transport error: http://example.org/x timed out after 250ms"
        );
    }

    #[test]
    fn test_lookup_from_records() {
        assert_eq!(Lookup::from_records(Vec::new()), Lookup::NotFound);
        let found = Lookup::from_records(vec![BibRecord::new()]);
        assert_eq!(found.into_records().len(), 1);
        assert!(Lookup::NotFound.into_records().is_empty());
    }
}
