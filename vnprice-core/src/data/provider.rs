//! Provider trait, source tags and the error classification every adapter
//! must map its failures into.
//!
//! The `BarProvider` trait abstracts over the upstream market-data sources
//! (TCBS, VCI, scripted test providers) so the orchestrator can fail over
//! between them without knowing which concrete adapter it talks to.

use crate::domain::{Bar, DateRange, TickerSymbol};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Which of the two interchangeable upstream sources handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Primary,
    Secondary,
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceTag::Primary => f.write_str("primary"),
            SourceTag::Secondary => f.write_str("secondary"),
        }
    }
}

/// The three failure classes the orchestrator reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Provider refused the request for quota reasons. Triggers failover.
    RateLimited,
    /// Network failure, 5xx, malformed body. Retried with backoff.
    Transient,
    /// Invalid ticker or request. Never retried.
    Permanent,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::RateLimited => f.write_str("rate limited"),
            ErrorKind::Transient => f.write_str("transient error"),
            ErrorKind::Permanent => f.write_str("permanent error"),
        }
    }
}

/// A classified failure of one provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    /// Classify a `reqwest` transport error. Anything that is not clearly a
    /// bad request is treated as transient.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::new(classify_status(status.as_u16()), err.to_string());
        }
        if err.is_builder() {
            return Self::permanent(err.to_string());
        }
        Self::transient(err.to_string())
    }
}

/// Map an HTTP status code to an [`ErrorKind`].
///
/// 429 and 403 are how both Vietnamese sources signal quota exhaustion.
/// Unknown codes default to `Transient` so nothing is lost without a retry.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        429 | 403 => ErrorKind::RateLimited,
        400 | 401 | 404 | 405 | 410 | 422 => ErrorKind::Permanent,
        500..=599 => ErrorKind::Transient,
        _ => ErrorKind::Transient,
    }
}

/// An upstream source of daily bars.
///
/// Implementations only fetch and classify. Retries, failover and chunking
/// live in the orchestrator above this trait.
pub trait BarProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for `ticker` within `range` (inclusive).
    ///
    /// An empty `Ok` means the provider has no bars in the range.
    fn fetch(&self, ticker: &TickerSymbol, range: &DateRange) -> Result<Vec<Bar>, ProviderError>;
}

impl<P: BarProvider + ?Sized> BarProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, ticker: &TickerSymbol, range: &DateRange) -> Result<Vec<Bar>, ProviderError> {
        (**self).fetch(ticker, range)
    }
}

/// The primary/secondary pair the orchestrator fails over between.
#[derive(Clone)]
pub struct ProviderSet {
    primary: Arc<dyn BarProvider>,
    secondary: Arc<dyn BarProvider>,
}

impl ProviderSet {
    pub fn new(primary: Arc<dyn BarProvider>, secondary: Arc<dyn BarProvider>) -> Self {
        Self { primary, secondary }
    }

    pub fn get(&self, source: SourceTag) -> &dyn BarProvider {
        match source {
            SourceTag::Primary => self.primary.as_ref(),
            SourceTag::Secondary => self.secondary.as_ref(),
        }
    }
}

impl fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSet")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(429), ErrorKind::RateLimited);
        assert_eq!(classify_status(403), ErrorKind::RateLimited);
        assert_eq!(classify_status(404), ErrorKind::Permanent);
        assert_eq!(classify_status(400), ErrorKind::Permanent);
        assert_eq!(classify_status(502), ErrorKind::Transient);
        assert_eq!(classify_status(503), ErrorKind::Transient);
    }

    #[test]
    fn unknown_status_defaults_to_transient() {
        assert_eq!(classify_status(418), ErrorKind::Transient);
        assert_eq!(classify_status(302), ErrorKind::Transient);
    }

    #[test]
    fn provider_error_display() {
        let e = ProviderError::rate_limited("HTTP 429");
        assert_eq!(e.to_string(), "rate limited: HTTP 429");
    }

    #[test]
    fn source_tag_display() {
        assert_eq!(SourceTag::Primary.to_string(), "primary");
        assert_eq!(SourceTag::Secondary.to_string(), "secondary");
    }
}
