//! Per-unit fetch state machine.
//!
//! `FetchState` holds no handles and performs no I/O: the orchestrator feeds
//! it each provider outcome and carries out the returned `Transition`.

use crate::data::{ErrorKind, SourceTag};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    TryingPrimary,
    TryingSecondary,
    /// Waiting out a backoff before re-entering `source`.
    Retrying { source: SourceTag },
    Success,
    Exhausted,
}

/// What the orchestrator must do after an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Hand the bars to the merger.
    Done,
    /// Call the secondary source now, without waiting.
    Failover,
    /// Sleep the backoff, then call `resume`. `escalate` asks for the shared
    /// mode to move to degraded first.
    Retry { escalate: bool },
    /// Give up on this unit.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchState {
    pub phase: FetchPhase,
    /// Retries consumed so far.
    pub retries: u32,
    /// Provider calls made so far.
    pub calls: u32,
    pub last_kind: Option<ErrorKind>,
    pub next_delay: Option<Duration>,
    max_retries: u32,
}

impl FetchState {
    /// Initial state for a unit planned for `source`. A degraded run starts
    /// on the secondary regardless of the planned source.
    pub fn start(source: SourceTag, degraded: bool, max_retries: u32) -> Self {
        let phase = if source == SourceTag::Secondary || degraded {
            FetchPhase::TryingSecondary
        } else {
            FetchPhase::TryingPrimary
        };
        Self {
            phase,
            retries: 0,
            calls: 0,
            last_kind: None,
            next_delay: None,
            max_retries,
        }
    }

    /// Source to call in the current phase.
    pub fn source(&self) -> SourceTag {
        match self.phase {
            FetchPhase::TryingPrimary => SourceTag::Primary,
            FetchPhase::Retrying { source } => source,
            _ => SourceTag::Secondary,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, FetchPhase::Success | FetchPhase::Exhausted)
    }

    pub fn retries_left(&self) -> u32 {
        self.max_retries.saturating_sub(self.retries)
    }

    /// Apply one provider outcome.
    pub fn on_outcome(&mut self, outcome: Result<(), ErrorKind>) -> Transition {
        self.calls += 1;
        let kind = match outcome {
            Ok(()) => {
                self.phase = FetchPhase::Success;
                self.next_delay = None;
                return Transition::Done;
            }
            Err(kind) => kind,
        };
        self.last_kind = Some(kind);

        match (self.phase, kind) {
            (_, ErrorKind::Permanent) => self.exhaust(),
            (FetchPhase::TryingPrimary, ErrorKind::RateLimited) => {
                self.phase = FetchPhase::TryingSecondary;
                Transition::Failover
            }
            (FetchPhase::TryingSecondary, ErrorKind::RateLimited) => self.retry(true),
            (FetchPhase::TryingPrimary | FetchPhase::TryingSecondary, ErrorKind::Transient) => {
                self.retry(false)
            }
            // Outcomes only arrive while trying; anything else is a misuse.
            _ => self.exhaust(),
        }
    }

    /// Leave `Retrying` after the wait. Consumes one retry.
    pub fn resume(&mut self, degraded: bool) {
        let FetchPhase::Retrying { source } = self.phase else {
            return;
        };
        self.retries += 1;
        self.next_delay = None;
        self.phase = if degraded || source == SourceTag::Secondary {
            FetchPhase::TryingSecondary
        } else {
            FetchPhase::TryingPrimary
        };
    }

    fn retry(&mut self, escalate: bool) -> Transition {
        if self.retries >= self.max_retries {
            return self.exhaust();
        }
        self.phase = FetchPhase::Retrying {
            source: self.source(),
        };
        Transition::Retry { escalate }
    }

    fn exhaust(&mut self) -> Transition {
        self.phase = FetchPhase::Exhausted;
        self.next_delay = None;
        Transition::Exhausted
    }
}
