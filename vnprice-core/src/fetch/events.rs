//! Structured fetch events.
//!
//! The orchestrator always emits the same events; a sink decides what, if
//! anything, to show. Verbosity never changes fetch behavior.

use super::orchestrator::FetchError;
use super::planner::{FetchMode, FetchUnit};
use crate::data::{ErrorKind, SourceTag};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    /// A ticker's range was (re-)planned; `index` is the unit's position in
    /// the ticker's current plan.
    ChunkPlanned {
        unit: FetchUnit,
        index: usize,
        total: usize,
    },
    /// Primary refused for quota; the same unit moves to the secondary.
    Failover { unit: FetchUnit, message: String },
    RetryScheduled {
        unit: FetchUnit,
        source: SourceTag,
        attempt: u32,
        delay: Duration,
        kind: ErrorKind,
    },
    /// Emitted once per run, by the unit that triggered the transition.
    ModeEscalated { unit: FetchUnit, mode: FetchMode },
    Exhausted { error: FetchError },
    Resolved {
        unit: FetchUnit,
        source: SourceTag,
        bars: usize,
        attempts: u32,
    },
}

impl FetchEvent {
    /// Short name of the variant, for assertions and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchEvent::ChunkPlanned { .. } => "chunk_planned",
            FetchEvent::Failover { .. } => "failover",
            FetchEvent::RetryScheduled { .. } => "retry_scheduled",
            FetchEvent::ModeEscalated { .. } => "mode_escalated",
            FetchEvent::Exhausted { .. } => "exhausted",
            FetchEvent::Resolved { .. } => "resolved",
        }
    }
}

/// Receives fetch events. Called from worker threads.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &FetchEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &FetchEvent) {}
}

/// Collects events in emission order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<FetchEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FetchEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(FetchEvent::kind).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: &FetchEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Renders events through `tracing`.
///
/// Planning and resolution go to `debug`, failover and retries to `info`,
/// escalation and exhaustion to `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &FetchEvent) {
        match event {
            FetchEvent::ChunkPlanned { unit, index, total } => tracing::debug!(
                ticker = %unit.ticker,
                range = %unit.range,
                source = %unit.source,
                "planned chunk {}/{}",
                index + 1,
                total
            ),
            FetchEvent::Failover { unit, message } => tracing::info!(
                ticker = %unit.ticker,
                range = %unit.range,
                "primary rate limited, failing over to secondary: {message}"
            ),
            FetchEvent::RetryScheduled {
                unit,
                source,
                attempt,
                delay,
                kind,
            } => tracing::info!(
                ticker = %unit.ticker,
                range = %unit.range,
                %source,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "{kind}, retrying"
            ),
            FetchEvent::ModeEscalated { unit, mode } => tracing::warn!(
                ticker = %unit.ticker,
                "both sources rate limited, switching to {mode} mode"
            ),
            FetchEvent::Exhausted { error } => tracing::warn!("{error}"),
            FetchEvent::Resolved {
                unit,
                source,
                bars,
                attempts,
            } => tracing::debug!(
                ticker = %unit.ticker,
                range = %unit.range,
                %source,
                bars,
                attempts,
                "chunk resolved"
            ),
        }
    }
}
