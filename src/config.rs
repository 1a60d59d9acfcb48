//! Service registry and declarative client configuration.
//!
//! A [`ServiceConfig`] names one of the known [`Service`]s together with its
//! access key, timeout and throttles, and can be loaded with serde from any
//! format:
//!
//! ```rust
//! use biblio_webquery::{Service, ServiceConfig};
//!
//! let config: ServiceConfig = serde_json::from_str(
//!     r#"{"service": "xisbn", "limits": [{"kind": "interval", "wait_secs": 1.0}]}"#,
//! ).unwrap();
//! assert_eq!(config.service, Service::Xisbn);
//! assert!(config.validate().is_ok());
//! ```

use crate::throttle::{
    AbsoluteNumberThrottle, DEFAULT_WAIT_DURATION, FailAction, IntervalThrottle, SharedThrottle,
};
use crate::webquery::{BibdataQuery, DEFAULT_TIMEOUT, Fetch};
use crate::xisbn::XisbnQuery;
use crate::{Result, WebQueryError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Converts a number of seconds from configuration into a [`Duration`].
fn duration_from_secs(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| WebQueryError::Config(format!("invalid {field} '{secs}'")))
}

/// Declarative form of a throttle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ThrottleConfig {
    /// Only one query per `wait_secs` seconds. Waits by default.
    Interval {
        wait_secs: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fail_action: Option<FailAction>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_duration_secs: Option<f64>,
    },
    /// At most `max` queries in total. Raises by default.
    Absolute {
        max: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fail_action: Option<FailAction>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_duration_secs: Option<f64>,
    },
}

impl ThrottleConfig {
    /// Builds the throttle this configuration describes.
    pub fn build(&self) -> Result<SharedThrottle> {
        match self {
            ThrottleConfig::Interval {
                wait_secs,
                fail_action,
                wait_duration_secs,
            } => {
                let throttle = IntervalThrottle::new(duration_from_secs("wait_secs", *wait_secs)?);
                let fail_action = fail_action.unwrap_or(throttle.fail_action());
                Ok(throttle
                    .with_fail_action(fail_action)
                    .with_wait_duration(wait_duration(*wait_duration_secs)?)
                    .shared())
            }
            ThrottleConfig::Absolute {
                max,
                fail_action,
                wait_duration_secs,
            } => {
                let throttle = AbsoluteNumberThrottle::new(*max);
                let fail_action = fail_action.unwrap_or(throttle.fail_action());
                Ok(throttle
                    .with_fail_action(fail_action)
                    .with_wait_duration(wait_duration(*wait_duration_secs)?)
                    .shared())
            }
        }
    }
}

fn wait_duration(secs: Option<f64>) -> Result<Duration> {
    secs.map_or(Ok(DEFAULT_WAIT_DURATION), |secs| {
        duration_from_secs("wait_duration_secs", secs)
    })
}

/// The webservices that can answer publication lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    #[default]
    Xisbn,
    Isbndb,
}

impl Service {
    /// Every known service, default first.
    pub fn all() -> &'static [Service] {
        &[Service::Xisbn, Service::Isbndb]
    }

    pub fn id(&self) -> &'static str {
        match self {
            Service::Xisbn => "xisbn",
            Service::Isbndb => "isbndb",
        }
    }

    /// Human readable name of the service.
    pub fn title(&self) -> &'static str {
        match self {
            Service::Xisbn => "WorldCat xISBN",
            Service::Isbndb => "ISBNdb",
        }
    }

    pub fn requires_key(&self) -> bool {
        matches!(self, Service::Isbndb)
    }
}

impl FromStr for Service {
    type Err = WebQueryError;

    fn from_str(s: &str) -> Result<Self> {
        let id = s.trim().to_lowercase();
        Service::all()
            .iter()
            .copied()
            .find(|service| service.id() == id)
            .ok_or_else(|| WebQueryError::Config(format!("unrecognised service '{s}'")))
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A service together with the settings needed to query it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service: Service,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub timeout_secs: f64,
    pub limits: Vec<ThrottleConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service: Service::default(),
            key: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs_f64(),
            limits: Vec::new(),
        }
    }
}

impl ServiceConfig {
    #[must_use]
    pub fn new(service: Service) -> Self {
        Self {
            service,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: ThrottleConfig) -> Self {
        self.limits.push(limit);
        self
    }

    /// Checks that an access key is given exactly when the service needs one.
    pub fn validate(&self) -> Result<()> {
        let has_key = self.key.as_deref().is_some_and(|key| !key.is_empty());
        match (self.service.requires_key(), has_key) {
            (true, false) => Err(WebQueryError::Config(format!(
                "{} requires an access key",
                self.service.title()
            ))),
            (false, true) => Err(WebQueryError::Config(format!(
                "{} does not take an access key",
                self.service.title()
            ))),
            _ => Ok(()),
        }
    }

    /// Builds a client for the configured service over `fetcher`.
    pub fn build(&self, fetcher: Arc<dyn Fetch>) -> Result<Box<dyn BibdataQuery>> {
        self.validate()?;
        let timeout = duration_from_secs("timeout_secs", self.timeout_secs)?;
        let limits = self
            .limits
            .iter()
            .map(ThrottleConfig::build)
            .collect::<Result<Vec<_>>>()?;
        debug!(service = %self.service, limits = limits.len(), "building client");

        match self.service {
            Service::Xisbn => {
                let query = limits
                    .into_iter()
                    .fold(XisbnQuery::new(fetcher).with_timeout(timeout), |query, limit| {
                        query.with_limit(limit)
                    });
                Ok(Box::new(query))
            }
            #[cfg(feature = "xml")]
            Service::Isbndb => {
                let key = self.key.clone().unwrap_or_default();
                let query = limits.into_iter().fold(
                    crate::isbndb::IsbndbQuery::new(key, fetcher).with_timeout(timeout),
                    |query, limit| query.with_limit(limit),
                );
                Ok(Box::new(query))
            }
            #[cfg(not(feature = "xml"))]
            Service::Isbndb => Err(WebQueryError::Config(
                "ISBNdb support requires the `xml` feature".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webquery::Lookup;
    use crate::webquery::tests::StubFetcher;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("xisbn", Service::Xisbn)]
    #[case("ISBNdb", Service::Isbndb)]
    #[case(" isbndb ", Service::Isbndb)]
    fn test_service_from_str(#[case] input: &str, #[case] expected: Service) {
        assert_eq!(input.parse::<Service>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_service() {
        let err = "amazon".parse::<Service>().unwrap_err();
        assert!(matches!(err, WebQueryError::Config(msg) if msg.contains("amazon")));
    }

    #[test]
    fn test_service_registry() {
        assert_eq!(Service::default(), Service::Xisbn);
        assert_eq!(Service::all().len(), 2);
        assert_eq!(Service::Xisbn.title(), "WorldCat xISBN");
        assert!(!Service::Xisbn.requires_key());
        assert!(Service::Isbndb.requires_key());
    }

    #[test]
    fn test_throttle_config_from_json() {
        let limits: Vec<ThrottleConfig> = serde_json::from_str(
            r#"[
                {"kind": "interval", "wait_secs": 1.5},
                {"kind": "absolute", "max": 500, "fail_action": "WAIT", "wait_duration_secs": 0.1}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            limits,
            vec![
                ThrottleConfig::Interval {
                    wait_secs: 1.5,
                    fail_action: None,
                    wait_duration_secs: None,
                },
                ThrottleConfig::Absolute {
                    max: 500,
                    fail_action: Some(FailAction::Wait),
                    wait_duration_secs: Some(0.1),
                },
            ]
        );
    }

    #[test]
    fn test_absolute_config_raises() {
        let throttle = ThrottleConfig::Absolute {
            max: 1,
            fail_action: None,
            wait_duration_secs: None,
        }
        .build()
        .unwrap();
        assert!(throttle.check_limit("test").is_ok());
        assert!(matches!(
            throttle.check_limit("test"),
            Err(WebQueryError::QueryThrottle(_))
        ));
    }

    #[test]
    fn test_negative_interval_is_rejected() {
        let config = ThrottleConfig::Interval {
            wait_secs: -1.0,
            fail_action: None,
            wait_duration_secs: None,
        };
        assert!(matches!(config.build(), Err(WebQueryError::Config(_))));
    }

    #[rstest]
    #[case(Service::Xisbn, None, true)]
    #[case(Service::Xisbn, Some("secret"), false)]
    #[case(Service::Isbndb, Some("secret"), true)]
    #[case(Service::Isbndb, None, false)]
    #[case(Service::Isbndb, Some(""), false)]
    fn test_validate_key(
        #[case] service: Service,
        #[case] key: Option<&str>,
        #[case] valid: bool,
    ) {
        let config = ServiceConfig {
            key: key.map(str::to_string),
            ..ServiceConfig::new(service)
        };
        assert_eq!(config.validate().is_ok(), valid);
    }

    #[test]
    fn test_service_config_defaults() {
        let config: ServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.timeout_secs, 5.0);
    }

    #[test]
    fn test_build_xisbn_client() {
        let stub = StubFetcher::new(r#"{"stat":"unknownId"}"#);
        let client = ServiceConfig::new(Service::Xisbn)
            .with_limit(ThrottleConfig::Absolute {
                max: 1,
                fail_action: None,
                wait_duration_secs: None,
            })
            .build(stub.clone())
            .unwrap();

        assert_eq!(client.query_bibdata_by_isbn("0-596-52926-0").unwrap(), Lookup::NotFound);
        assert!(matches!(
            client.query_bibdata_by_isbn("0-596-52926-0"),
            Err(WebQueryError::QueryThrottle(_))
        ));
        assert_eq!(stub.requested().len(), 1);
    }

    #[cfg(feature = "xml")]
    #[test]
    fn test_build_isbndb_client_uses_key() {
        let stub = StubFetcher::new("<ISBNdb><BookList/></ISBNdb>");
        let client = ServiceConfig::new(Service::Isbndb)
            .with_key("ABC123")
            .build(stub.clone())
            .unwrap();

        assert_eq!(client.query_bibdata_by_isbn("0596529260").unwrap(), Lookup::NotFound);
        assert!(stub.requested()[0].contains("access_key=ABC123"));
    }

    #[test]
    fn test_build_rejects_missing_key() {
        let stub = StubFetcher::new("");
        let result = ServiceConfig::new(Service::Isbndb).build(stub);
        assert!(matches!(result, Err(WebQueryError::Config(_))));
    }
}
