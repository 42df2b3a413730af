//! Upstream data sources: provider trait, HTTP adapters, throttling and
//! universe files.

pub mod provider;
pub mod scripted;
pub mod tcbs;
pub mod throttle;
pub mod universe;
pub mod vci;

pub use provider::{classify_status, BarProvider, ErrorKind, ProviderError, ProviderSet, SourceTag};
pub use scripted::{synthetic_bars, ScriptedCall, ScriptedProvider};
pub use tcbs::TcbsProvider;
pub use throttle::{ThrottleLimits, Throttled};
pub use universe::{Universe, UniverseError};
pub use vci::VciProvider;
