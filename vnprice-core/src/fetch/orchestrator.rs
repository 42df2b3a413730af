//! Fetch orchestrator: resolves planned units against the provider pair with
//! failover, bounded retry and mode escalation.

use super::backoff::{RetryPolicy, Sleeper, ThreadSleeper};
use super::events::{EventSink, FetchEvent, NullSink};
use super::merge::Gap;
use super::mode::ModeFlag;
use super::planner::{split_range, FetchMode, FetchUnit};
use super::state::{FetchState, Transition};
use crate::data::{ErrorKind, ProviderSet};
use crate::domain::{Bar, DateRange, TickerSymbol};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Minimum spacing between consecutive degraded-mode units of a run.
pub const DEFAULT_DEGRADED_DELAY: Duration = Duration::from_secs(5);

/// Terminal failure of one unit after local recovery was exhausted.
///
/// `classification` is always `Permanent`; `last_kind` is the kind of the
/// final provider error.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error(
    "{} {}: failed after {attempts} attempt(s), last error {last_kind}: {message}",
    unit.ticker,
    unit.range
)]
pub struct FetchError {
    pub unit: FetchUnit,
    pub classification: ErrorKind,
    pub last_kind: ErrorKind,
    pub attempts: u32,
    pub message: String,
}

/// Everything one ticker's fetch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerOutcome {
    pub ticker: TickerSymbol,
    pub range: DateRange,
    /// Successfully resolved units with their bars, in resolution order.
    pub resolved: Vec<(FetchUnit, Vec<Bar>)>,
    /// The unit that stopped this ticker, if any.
    pub failure: Option<FetchError>,
}

impl TickerOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn bar_count(&self) -> usize {
        self.resolved.iter().map(|(_, bars)| bars.len()).sum()
    }

    /// All bars in chunk order, before any dedup.
    pub fn bars(&self) -> impl Iterator<Item = &Bar> {
        self.resolved.iter().flat_map(|(_, bars)| bars.iter())
    }

    /// The unfetched tail of the range when a unit failed.
    pub fn gap(&self) -> Option<Gap> {
        let error = self.failure.as_ref()?;
        let range = DateRange::new(error.unit.range.start(), self.range.end()).ok()?;
        Some(Gap {
            range,
            error: error.clone(),
        })
    }
}

pub struct Orchestrator {
    providers: ProviderSet,
    mode: Arc<ModeFlag>,
    policy: RetryPolicy,
    degraded_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
    events: Arc<dyn EventSink>,
    /// Secondary requests issued while degraded, shared by every worker.
    degraded_requests: Mutex<u64>,
}

impl Orchestrator {
    pub fn new(providers: ProviderSet, mode: Arc<ModeFlag>) -> Self {
        Self {
            providers,
            mode,
            policy: RetryPolicy::default(),
            degraded_delay: DEFAULT_DEGRADED_DELAY,
            sleeper: Arc::new(ThreadSleeper),
            events: Arc::new(NullSink),
            degraded_requests: Mutex::new(0),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_degraded_delay(mut self, delay: Duration) -> Self {
        self.degraded_delay = delay;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn mode(&self) -> FetchMode {
        self.mode.current()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resolve one unit, driving its state machine to a terminal phase.
    pub fn resolve(&self, unit: &FetchUnit) -> Result<Vec<Bar>, FetchError> {
        let mut state = FetchState::start(unit.source, self.mode.is_degraded(), self.policy.max_retries);
        let mut last_message = String::new();

        loop {
            let source = state.source();
            let (outcome, bars) = match self.providers.get(source).fetch(&unit.ticker, &unit.range) {
                Ok(bars) => (Ok(()), bars),
                Err(e) => {
                    let kind = e.kind;
                    last_message = e.message;
                    (Err(kind), Vec::new())
                }
            };

            match state.on_outcome(outcome) {
                Transition::Done => {
                    self.events.emit(&FetchEvent::Resolved {
                        unit: unit.clone(),
                        source,
                        bars: bars.len(),
                        attempts: state.calls,
                    });
                    return Ok(bars);
                }
                Transition::Failover => {
                    self.events.emit(&FetchEvent::Failover {
                        unit: unit.clone(),
                        message: last_message.clone(),
                    });
                }
                Transition::Retry { escalate } => {
                    if escalate && self.mode.escalate() {
                        self.events.emit(&FetchEvent::ModeEscalated {
                            unit: unit.clone(),
                            mode: self.mode.current(),
                        });
                        // the escalating reply counts as the first degraded request
                        *self.lock_degraded() += 1;
                    }
                    let attempt = state.retries + 1;
                    let delay = self.policy.backoff(attempt);
                    state.next_delay = Some(delay);
                    self.events.emit(&FetchEvent::RetryScheduled {
                        unit: unit.clone(),
                        source,
                        attempt,
                        delay,
                        kind: state.last_kind.unwrap_or(ErrorKind::Transient),
                    });
                    self.sleeper.sleep(delay);
                    state.resume(self.mode.is_degraded());
                }
                Transition::Exhausted => {
                    let error = FetchError {
                        unit: unit.clone(),
                        classification: ErrorKind::Permanent,
                        last_kind: state.last_kind.unwrap_or(ErrorKind::Permanent),
                        attempts: state.calls,
                        message: last_message,
                    };
                    self.events.emit(&FetchEvent::Exhausted {
                        error: error.clone(),
                    });
                    return Err(error);
                }
            }
        }
    }

    /// Fetch one ticker's full range, chunk by chunk in chronological order.
    ///
    /// The remainder of the range is re-planned before every chunk so a mode
    /// escalation takes effect for the rest of this ticker. The first
    /// exhausted chunk stops the ticker.
    pub fn fetch_ticker(&self, ticker: &TickerSymbol, range: DateRange) -> TickerOutcome {
        let mut outcome = TickerOutcome {
            ticker: ticker.clone(),
            range,
            resolved: Vec::new(),
            failure: None,
        };
        let mut cursor = range.start();

        while let Some(remaining) = range.from_date(cursor) {
            let mode = self.mode.current();
            let chunks = split_range(remaining, mode);
            let Some(chunk) = chunks.first().copied() else {
                break;
            };
            let unit = FetchUnit {
                ticker: ticker.clone(),
                range: chunk,
                source: mode.source(),
            };
            let index = outcome.resolved.len();
            self.events.emit(&FetchEvent::ChunkPlanned {
                unit: unit.clone(),
                index,
                total: index + chunks.len(),
            });

            if mode == FetchMode::DegradedSecondaryOnly {
                self.pace_degraded();
            }

            match self.resolve(&unit) {
                Ok(bars) => outcome.resolved.push((unit, bars)),
                Err(error) => {
                    outcome.failure = Some(error);
                    break;
                }
            }

            match chunk.end().succ_opt() {
                Some(next) if chunk.end() < range.end() => cursor = next,
                _ => break,
            }
        }

        outcome
    }

    /// Hold the gate for the full degraded delay before every degraded unit
    /// except the run's first, so units from all workers go out at least
    /// `degraded_delay` apart.
    fn pace_degraded(&self) {
        let mut issued = self.lock_degraded();
        if *issued > 0 {
            tracing::debug!(delay = ?self.degraded_delay, "degraded pacing");
            self.sleeper.sleep(self.degraded_delay);
        }
        *issued += 1;
    }

    fn lock_degraded(&self) -> std::sync::MutexGuard<'_, u64> {
        self.degraded_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.providers)
            .field("mode", &self.mode.current())
            .field("policy", &self.policy)
            .field("degraded_delay", &self.degraded_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{synthetic_bars, ProviderError, ScriptedProvider, SourceTag};
    use crate::fetch::backoff::RecordingSleeper;
    use crate::fetch::events::EventLog;
    use chrono::Datelike;

    struct Harness {
        primary: Arc<ScriptedProvider>,
        secondary: Arc<ScriptedProvider>,
        mode: Arc<ModeFlag>,
        sleeper: Arc<RecordingSleeper>,
        events: Arc<EventLog>,
        orch: Orchestrator,
    }

    fn harness(primary: ScriptedProvider, secondary: ScriptedProvider) -> Harness {
        let primary = Arc::new(primary);
        let secondary = Arc::new(secondary);
        let mode = Arc::new(ModeFlag::new());
        let sleeper = Arc::new(RecordingSleeper::new());
        let events = Arc::new(EventLog::new());
        let orch = Orchestrator::new(
            ProviderSet::new(primary.clone(), secondary.clone()),
            mode.clone(),
        )
        .with_policy(RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        })
        .with_sleeper(sleeper.clone())
        .with_events(events.clone());
        Harness {
            primary,
            secondary,
            mode,
            sleeper,
            events,
            orch,
        }
    }

    fn unit(source: SourceTag) -> FetchUnit {
        FetchUnit {
            ticker: TickerSymbol::new("VCB").unwrap(),
            range: DateRange::parse("2024-01-01", "2024-03-31").unwrap(),
            source,
        }
    }

    #[test]
    fn primary_success_never_touches_secondary() {
        let h = harness(
            ScriptedProvider::synthetic("p"),
            ScriptedProvider::failing("s", ErrorKind::Permanent),
        );
        let bars = h.orch.resolve(&unit(SourceTag::Primary)).unwrap();
        assert!(!bars.is_empty());
        assert_eq!(h.secondary.call_count(), 0);
        assert_eq!(h.events.kinds(), vec!["resolved"]);
    }

    #[test]
    fn rate_limited_primary_fails_over_instantly() {
        let h = harness(
            ScriptedProvider::failing("p", ErrorKind::RateLimited),
            ScriptedProvider::synthetic("s"),
        );
        let u = unit(SourceTag::Primary);
        let bars = h.orch.resolve(&u).unwrap();
        assert_eq!(bars, synthetic_bars(&u.ticker, &u.range));
        assert_eq!(h.primary.call_count(), 1);
        assert!(h.sleeper.waits().is_empty());
        assert_eq!(h.mode.current(), FetchMode::Normal);
        assert_eq!(h.events.kinds(), vec!["failover", "resolved"]);
    }

    #[test]
    fn double_rate_limit_escalates_once() {
        let h = harness(
            ScriptedProvider::failing("p", ErrorKind::RateLimited),
            ScriptedProvider::new("s", |t, r, call| {
                if call < 2 {
                    Err(ProviderError::rate_limited("HTTP 429"))
                } else {
                    Ok(synthetic_bars(t, r))
                }
            }),
        );
        assert!(h.orch.resolve(&unit(SourceTag::Primary)).is_ok());
        assert!(h.mode.is_degraded());
        assert_eq!(h.events.count("mode_escalated"), 1);
        assert_eq!(
            h.sleeper.waits(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
        // Primary is never retried once degraded.
        assert_eq!(h.primary.call_count(), 1);
    }

    #[test]
    fn transient_exhausts_after_three_retries() {
        let h = harness(
            ScriptedProvider::failing("p", ErrorKind::Transient),
            ScriptedProvider::synthetic("s"),
        );
        let err = h.orch.resolve(&unit(SourceTag::Primary)).unwrap_err();
        assert_eq!(err.classification, ErrorKind::Permanent);
        assert_eq!(err.last_kind, ErrorKind::Transient);
        assert_eq!(err.attempts, 4);
        assert_eq!(h.primary.call_count(), 4);
        assert_eq!(h.sleeper.waits().len(), 3);
        assert_eq!(h.events.count("exhausted"), 1);
    }

    #[test]
    fn permanent_is_not_retried() {
        let h = harness(
            ScriptedProvider::failing("p", ErrorKind::Permanent),
            ScriptedProvider::synthetic("s"),
        );
        let err = h.orch.resolve(&unit(SourceTag::Primary)).unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(err.last_kind, ErrorKind::Permanent);
        assert_eq!(h.secondary.call_count(), 0);
        assert!(h.sleeper.waits().is_empty());
    }

    #[test]
    fn secondary_unit_starts_on_secondary() {
        let h = harness(
            ScriptedProvider::synthetic("p"),
            ScriptedProvider::synthetic("s"),
        );
        h.orch.resolve(&unit(SourceTag::Secondary)).unwrap();
        assert_eq!(h.primary.call_count(), 0);
        assert_eq!(h.secondary.call_count(), 1);
    }

    #[test]
    fn fetch_error_display_names_ticker_range_and_kind() {
        let h = harness(
            ScriptedProvider::failing("p", ErrorKind::Permanent),
            ScriptedProvider::synthetic("s"),
        );
        let msg = h.orch.resolve(&unit(SourceTag::Primary)).unwrap_err().to_string();
        assert!(msg.contains("VCB"));
        assert!(msg.contains("2024-01-01..2024-03-31"));
        assert!(msg.contains("permanent error"));
    }

    #[test]
    fn fetch_ticker_walks_chunks_in_order() {
        let h = harness(
            ScriptedProvider::synthetic("p"),
            ScriptedProvider::synthetic("s"),
        );
        let range = DateRange::parse("2022-03-01", "2024-02-15").unwrap();
        let out = h.orch.fetch_ticker(&TickerSymbol::new("FPT").unwrap(), range);
        assert!(out.is_complete());
        let ranges: Vec<_> = h.primary.calls().iter().map(|c| c.range).collect();
        assert_eq!(
            ranges,
            vec![
                DateRange::parse("2022-03-01", "2022-12-31").unwrap(),
                DateRange::parse("2023-01-01", "2023-12-31").unwrap(),
                DateRange::parse("2024-01-01", "2024-02-15").unwrap(),
            ]
        );
        assert!(h.sleeper.waits().is_empty());
    }

    #[test]
    fn escalation_mid_ticker_replans_remainder() {
        let h = harness(
            ScriptedProvider::failing("p", ErrorKind::RateLimited),
            ScriptedProvider::new("s", |t, r, call| {
                if call == 0 {
                    Err(ProviderError::rate_limited("HTTP 429"))
                } else {
                    Ok(synthetic_bars(t, r))
                }
            }),
        );
        let range = DateRange::parse("2022-01-01", "2023-12-31").unwrap();
        let out = h.orch.fetch_ticker(&TickerSymbol::new("FPT").unwrap(), range);
        assert!(out.is_complete());

        let units: Vec<_> = out.resolved.iter().map(|(u, _)| u.range).collect();
        assert_eq!(
            units,
            vec![
                DateRange::parse("2022-01-01", "2022-12-31").unwrap(),
                DateRange::parse("2023-01-01", "2023-12-31").unwrap(),
            ]
        );
        assert_eq!(out.resolved[1].0.source, SourceTag::Secondary);
        // One backoff, then the degraded delay before the next chunk.
        assert_eq!(
            h.sleeper.waits(),
            vec![Duration::from_secs(2), Duration::from_secs(5)]
        );
    }

    #[test]
    fn degraded_units_are_paced_across_tickers() {
        let h = harness(
            ScriptedProvider::synthetic("p"),
            ScriptedProvider::synthetic("s"),
        );
        h.mode.escalate();
        let range = DateRange::parse("2024-11-01", "2024-12-01").unwrap();
        for ticker in ["VCB", "FPT", "VNM"] {
            let out = h.orch.fetch_ticker(&TickerSymbol::new(ticker).unwrap(), range);
            assert!(out.is_complete());
            assert_eq!(out.resolved.len(), 1);
        }
        assert_eq!(h.secondary.call_count(), 3);
        assert_eq!(h.primary.call_count(), 0);
        assert_eq!(
            h.sleeper.waits(),
            vec![Duration::from_secs(5), Duration::from_secs(5)]
        );
    }

    #[test]
    fn escalation_paces_the_next_tickers_first_unit() {
        let h = harness(
            ScriptedProvider::failing("p", ErrorKind::RateLimited),
            ScriptedProvider::new("s", |t, r, call| {
                if call == 0 {
                    Err(ProviderError::rate_limited("HTTP 429"))
                } else {
                    Ok(synthetic_bars(t, r))
                }
            }),
        );
        let range = DateRange::parse("2024-11-01", "2024-12-01").unwrap();
        h.orch.fetch_ticker(&TickerSymbol::new("VCB").unwrap(), range);
        h.orch.fetch_ticker(&TickerSymbol::new("FPT").unwrap(), range);
        assert_eq!(
            h.sleeper.waits(),
            vec![Duration::from_secs(2), Duration::from_secs(5)]
        );
    }

    #[test]
    fn fetch_ticker_stops_at_first_failed_chunk() {
        let h = harness(
            ScriptedProvider::new("p", |t, r, _| {
                if r.start().year() == 2023 {
                    Err(ProviderError::permanent("HTTP 404"))
                } else {
                    Ok(synthetic_bars(t, r))
                }
            }),
            ScriptedProvider::synthetic("s"),
        );
        let range = DateRange::parse("2022-01-01", "2024-06-30").unwrap();
        let out = h.orch.fetch_ticker(&TickerSymbol::new("VNM").unwrap(), range);
        assert_eq!(out.resolved.len(), 1);
        assert!(out.bar_count() > 0);
        let gap = out.gap().unwrap();
        assert_eq!(gap.range, DateRange::parse("2023-01-01", "2024-06-30").unwrap());
        assert_eq!(h.primary.call_count(), 2);
    }
}
