//! Per-source request throttling.
//!
//! Both upstream sources enforce a requests-per-minute quota. `Throttled`
//! wraps a provider and, across every thread sharing it, caps the number of
//! requests in flight and optionally the number started per sliding minute.

use super::provider::{BarProvider, ProviderError};
use crate::domain::{Bar, DateRange, TickerSymbol};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Limits applied to one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleLimits {
    /// Maximum concurrent requests. Clamped to at least 1.
    pub max_in_flight: usize,
    /// Maximum requests started per rolling minute. `None` disables the window.
    pub requests_per_minute: Option<u32>,
}

impl Default for ThrottleLimits {
    fn default() -> Self {
        Self {
            max_in_flight: 2,
            requests_per_minute: None,
        }
    }
}

/// A provider wrapped with concurrency and rate limits.
pub struct Throttled<P> {
    inner: P,
    limits: ThrottleLimits,
    in_flight: Mutex<usize>,
    slot_freed: Condvar,
    started: Mutex<VecDeque<Instant>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P: BarProvider> Throttled<P> {
    pub fn new(inner: P, limits: ThrottleLimits) -> Self {
        Self {
            inner,
            limits: ThrottleLimits {
                max_in_flight: limits.max_in_flight.max(1),
                ..limits
            },
            in_flight: Mutex::new(0),
            slot_freed: Condvar::new(),
            started: Mutex::new(VecDeque::new()),
        }
    }

    pub fn limits(&self) -> ThrottleLimits {
        self.limits
    }

    /// Requests currently executing against the inner provider.
    pub fn in_flight(&self) -> usize {
        *lock(&self.in_flight)
    }

    fn acquire_slot(&self) {
        let mut count = lock(&self.in_flight);
        while *count >= self.limits.max_in_flight {
            count = self
                .slot_freed
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *count += 1;
    }

    fn release_slot(&self) {
        let mut count = lock(&self.in_flight);
        *count = count.saturating_sub(1);
        self.slot_freed.notify_one();
    }

    /// Block until starting a request keeps us within the per-minute quota.
    fn wait_for_window(&self) {
        let Some(rpm) = self.limits.requests_per_minute else {
            return;
        };
        let rpm = rpm.max(1) as usize;
        loop {
            let now = Instant::now();
            let mut started = lock(&self.started);
            while started
                .front()
                .is_some_and(|t| now.duration_since(*t) >= WINDOW)
            {
                started.pop_front();
            }
            if started.len() < rpm {
                started.push_back(now);
                return;
            }
            let wait = started
                .front()
                .map(|oldest| WINDOW.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or_default();
            drop(started);
            tracing::debug!(
                provider = self.inner.name(),
                wait_ms = wait.as_millis() as u64,
                "request quota reached, waiting"
            );
            std::thread::sleep(wait + Duration::from_millis(50));
        }
    }
}

/// Releases the in-flight slot even if the inner provider panics.
struct SlotGuard<'a, P: BarProvider>(&'a Throttled<P>);

impl<P: BarProvider> Drop for SlotGuard<'_, P> {
    fn drop(&mut self) {
        self.0.release_slot();
    }
}

impl<P: BarProvider> BarProvider for Throttled<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(&self, ticker: &TickerSymbol, range: &DateRange) -> Result<Vec<Bar>, ProviderError> {
        self.wait_for_window();
        self.acquire_slot();
        let _guard = SlotGuard(self);
        self.inner.fetch(ticker, range)
    }
}
