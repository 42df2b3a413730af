//! The orchestrator-wide degraded-mode flag.

use super::planner::FetchMode;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared fetch mode. Starts `Normal` and can only move to
/// `DegradedSecondaryOnly`, once, for the lifetime of a run.
///
/// Share it between workers with `Arc<ModeFlag>`.
#[derive(Debug, Default)]
pub struct ModeFlag {
    degraded: AtomicBool,
}

impl ModeFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag already in degraded mode.
    pub fn degraded() -> Self {
        Self {
            degraded: AtomicBool::new(true),
        }
    }

    pub fn current(&self) -> FetchMode {
        if self.degraded.load(Ordering::Acquire) {
            FetchMode::DegradedSecondaryOnly
        } else {
            FetchMode::Normal
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.current() == FetchMode::DegradedSecondaryOnly
    }

    /// Switch to degraded mode. Returns true only for the call that made the
    /// transition.
    pub fn escalate(&self) -> bool {
        !self.degraded.swap(true, Ordering::AcqRel)
    }
}
