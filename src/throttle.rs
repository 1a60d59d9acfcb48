//! Throttles that keep webservice queries within usage limits.
//!
//! Webservices often ask users to send no more than one request a second,
//! or no more than 500 a day. A [`QueryThrottle`] pairs one such rule (a
//! [`QueryLimit`]) with the action to take when it is exceeded: fail
//! straight away or sleep until the rule allows the query.
//!
//! A throttle may be given to several clients through [`SharedThrottle`], in
//! which case one combined limit applies to all of them.
//!
//! # Example
//!
//! ```
//! use biblio_webquery::throttle::{AbsoluteNumberThrottle, Throttle};
//! use biblio_webquery::WebQueryError;
//!
//! let throttle = AbsoluteNumberThrottle::new(2);
//! assert!(throttle.check_limit("xisbn").is_ok());
//! assert!(throttle.check_limit("xisbn").is_ok());
//! assert!(matches!(
//!     throttle.check_limit("xisbn"),
//!     Err(WebQueryError::QueryThrottle(_))
//! ));
//! ```

use crate::{Result, WebQueryError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// A throttle that can be handed to several clients at once.
pub type SharedThrottle = Arc<dyn Throttle>;

/// Polling period used by [`FailAction::Wait`] unless configured otherwise.
pub const DEFAULT_WAIT_DURATION: Duration = Duration::from_secs(1);

/// What to do when a query would exceed its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FailAction {
    /// Fail with [`WebQueryError::QueryThrottle`] without querying.
    Raise,
    /// Sleep and re-check until the limit allows the query.
    ///
    /// With a limit that can never be satisfied again, such as an
    /// [`AbsoluteNumber`] that is used up, this blocks forever.
    Wait,
}

impl FromStr for FailAction {
    type Err = WebQueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RAISE" => Ok(FailAction::Raise),
            "WAIT" => Ok(FailAction::Wait),
            _ => Err(WebQueryError::Config(format!(
                "unrecognised fail action '{s}'"
            ))),
        }
    }
}

impl fmt::Display for FailAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailAction::Raise => f.write_str("RAISE"),
            FailAction::Wait => f.write_str("WAIT"),
        }
    }
}

/// Something that gates queries before they are sent.
pub trait Throttle: Send + Sync + fmt::Debug {
    /// Checks, and if allowed records, a query by `caller`.
    ///
    /// `caller` names the service being throttled so that one limit can
    /// treat several services differently.
    ///
    /// # Errors
    ///
    /// Returns [`WebQueryError::QueryThrottle`] when the limit is exceeded
    /// and the fail action is [`FailAction::Raise`].
    fn check_limit(&self, caller: &str) -> Result<()>;
}

/// A rule deciding whether another query is allowed.
pub trait QueryLimit: Send + fmt::Debug {
    /// Whether a query by `caller` would stay within the limit.
    fn within_limit(&self, caller: &str) -> bool;

    /// Records a query that was allowed through.
    fn log_success(&mut self, caller: &str);
}

/// Enforces a [`QueryLimit`] with a configured [`FailAction`].
///
/// The check of the limit and the logging of a success happen under one
/// lock, so concurrent callers can never both slip through the last free
/// slot. The lock is released while a waiting caller sleeps.
#[derive(Debug)]
pub struct QueryThrottle<L> {
    limit: Mutex<L>,
    fail_action: FailAction,
    wait_duration: Duration,
}

/// Allows a query only once a period has passed since the last one.
pub type IntervalThrottle = QueryThrottle<WaitNSeconds>;

/// Allows a fixed total number of queries.
pub type AbsoluteNumberThrottle = QueryThrottle<AbsoluteNumber>;

impl<L: QueryLimit> QueryThrottle<L> {
    /// Wraps a limit with the given fail action.
    #[must_use]
    pub fn with_limit(limit: L, fail_action: FailAction) -> Self {
        Self {
            limit: Mutex::new(limit),
            fail_action,
            wait_duration: DEFAULT_WAIT_DURATION,
        }
    }

    #[must_use]
    pub fn with_fail_action(mut self, fail_action: FailAction) -> Self {
        self.fail_action = fail_action;
        self
    }

    /// Sets how long a waiting caller sleeps between checks.
    #[must_use]
    pub fn with_wait_duration(mut self, wait_duration: Duration) -> Self {
        self.wait_duration = wait_duration;
        self
    }

    pub fn fail_action(&self) -> FailAction {
        self.fail_action
    }

    pub fn wait_duration(&self) -> Duration {
        self.wait_duration
    }

    /// Boxes the throttle so it can be shared between clients.
    pub fn shared(self) -> SharedThrottle
    where
        L: 'static,
    {
        Arc::new(self)
    }

    /// Checks the limit and logs a success in one step.
    fn try_log_success(&self, caller: &str) -> bool {
        let mut limit = self.limit.lock().unwrap_or_else(PoisonError::into_inner);
        if limit.within_limit(caller) {
            limit.log_success(caller);
            true
        } else {
            false
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&L) -> T) -> T {
        let limit = self.limit.lock().unwrap_or_else(PoisonError::into_inner);
        f(&limit)
    }
}

impl<L: QueryLimit> Throttle for QueryThrottle<L> {
    fn check_limit(&self, caller: &str) -> Result<()> {
        if self.try_log_success(caller) {
            return Ok(());
        }

        match self.fail_action {
            FailAction::Raise => {
                warn!(caller, "query limit exceeded");
                Err(WebQueryError::QueryThrottle(
                    "query limit exceeded".to_string(),
                ))
            }
            FailAction::Wait => {
                warn!(caller, wait = ?self.wait_duration, "query limit reached, waiting");
                loop {
                    thread::sleep(self.wait_duration);
                    if self.try_log_success(caller) {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Limit a query to every N seconds at most.
#[derive(Debug, Clone)]
pub struct WaitNSeconds {
    wait: Duration,
    prev_time: Option<Instant>,
}

impl WaitNSeconds {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            prev_time: None,
        }
    }
}

impl QueryLimit for WaitNSeconds {
    fn within_limit(&self, _caller: &str) -> bool {
        self.prev_time
            .is_none_or(|prev| prev.elapsed() > self.wait)
    }

    fn log_success(&mut self, _caller: &str) {
        self.prev_time = Some(Instant::now());
    }
}

impl QueryThrottle<WaitNSeconds> {
    /// Holds queries until `wait` has passed since the previous one.
    ///
    /// When shared by many clients the default [`FailAction::Wait`] can leave
    /// a large population of queries on hold.
    #[must_use]
    pub fn new(wait: Duration) -> Self {
        Self::with_limit(WaitNSeconds::new(wait), FailAction::Wait)
    }

    /// The common one-query-a-second limit.
    #[must_use]
    pub fn one_second() -> Self {
        Self::new(Duration::from_secs(1))
    }

    /// The enforced period between queries.
    pub fn wait(&self) -> Duration {
        self.with_state(|limit| limit.wait)
    }
}

/// Limit queries to a maximum number.
///
/// This only counts queries made through this instance, so it is a crude
/// stand-in for per-day limits that span several runs of a program.
#[derive(Debug, Clone)]
pub struct AbsoluteNumber {
    max: usize,
    query_count: usize,
}

impl AbsoluteNumber {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            query_count: 0,
        }
    }
}

impl QueryLimit for AbsoluteNumber {
    fn within_limit(&self, _caller: &str) -> bool {
        self.query_count < self.max
    }

    fn log_success(&mut self, _caller: &str) {
        self.query_count += 1;
    }
}

impl QueryThrottle<AbsoluteNumber> {
    /// Allows `max` queries in total, failing afterwards.
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self::with_limit(AbsoluteNumber::new(max), FailAction::Raise)
    }

    /// The 500 queries a day allowed by ISBNdb.
    #[must_use]
    pub fn max_500() -> Self {
        Self::new(500)
    }

    pub fn max(&self) -> usize {
        self.with_state(|limit| limit.max)
    }

    /// The number of queries allowed through so far.
    pub fn query_count(&self) -> usize {
        self.with_state(|limit| limit.query_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[test]
    fn test_interval_raise_within_wait_period() {
        let throttle = IntervalThrottle::new(Duration::from_millis(200))
            .with_fail_action(FailAction::Raise);
        assert!(throttle.check_limit("xisbn").is_ok());
        let err = throttle.check_limit("xisbn").unwrap_err();
        assert!(matches!(err, WebQueryError::QueryThrottle(_)));
        assert_eq!(err.to_string(), "Query limit exceeded: query limit exceeded");
    }

    #[test]
    fn test_interval_raise_after_wait_period() {
        let throttle = IntervalThrottle::new(Duration::from_millis(30))
            .with_fail_action(FailAction::Raise);
        assert!(throttle.check_limit("xisbn").is_ok());
        thread::sleep(Duration::from_millis(60));
        assert!(throttle.check_limit("xisbn").is_ok());
    }

    #[test]
    fn test_interval_wait_blocks_until_allowed() {
        let wait = Duration::from_millis(50);
        let throttle =
            IntervalThrottle::new(wait).with_wait_duration(Duration::from_millis(10));
        assert_eq!(throttle.fail_action(), FailAction::Wait);

        let start = Instant::now();
        throttle.check_limit("xisbn").unwrap();
        throttle.check_limit("xisbn").unwrap();
        assert!(start.elapsed() >= wait);
    }

    #[test]
    fn test_absolute_number_raises_after_max() {
        let throttle = AbsoluteNumberThrottle::new(3);
        for _ in 0..3 {
            assert!(throttle.check_limit("isbndb").is_ok());
        }
        assert!(matches!(
            throttle.check_limit("isbndb"),
            Err(WebQueryError::QueryThrottle(_))
        ));
        assert_eq!(throttle.query_count(), 3);
    }

    #[test]
    fn test_absolute_number_zero_allows_nothing() {
        let throttle = AbsoluteNumberThrottle::new(0);
        assert!(throttle.check_limit("isbndb").is_err());
        assert_eq!(throttle.query_count(), 0);
    }

    #[test]
    fn test_absolute_number_is_atomic_across_threads() {
        let throttle = AbsoluteNumberThrottle::new(10);
        let allowed: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        (0..5)
                            .filter(|_| throttle.check_limit("isbndb").is_ok())
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(allowed, 10);
        assert_eq!(throttle.query_count(), 10);
    }

    #[test]
    fn test_shared_throttle_combines_callers() {
        let shared = AbsoluteNumberThrottle::new(2).shared();
        let other = Arc::clone(&shared);
        assert!(shared.check_limit("xisbn").is_ok());
        assert!(other.check_limit("isbndb").is_ok());
        assert!(shared.check_limit("xisbn").is_err());
    }

    #[test]
    fn test_convenience_constructors() {
        assert_eq!(IntervalThrottle::one_second().wait(), Duration::from_secs(1));
        let max = AbsoluteNumberThrottle::max_500();
        assert_eq!(max.max(), 500);
        assert_eq!(max.fail_action(), FailAction::Raise);
        assert_eq!(max.wait_duration(), DEFAULT_WAIT_DURATION);
    }

    #[rstest]
    #[case("RAISE", FailAction::Raise)]
    #[case("raise", FailAction::Raise)]
    #[case(" Wait ", FailAction::Wait)]
    fn test_fail_action_from_str(#[case] input: &str, #[case] expected: FailAction) {
        assert_eq!(input.parse::<FailAction>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_fail_action_is_config_error() {
        let err = "RETRY".parse::<FailAction>().unwrap_err();
        assert!(matches!(err, WebQueryError::Config(_)));
    }
}
