//! vnprice core: daily price retrieval for Vietnamese equities.
//!
//! This crate holds the data-retrieval resilience layer and the analytics on
//! top of it:
//! - Domain types (tickers, date ranges, bars, normalized series)
//! - Provider adapters for TCBS and VCI behind one `BarProvider` trait
//! - Range planner that chunks long ranges by calendar year or half-year
//! - Fetch orchestrator with instant failover, bounded retry and a shared
//!   degraded mode
//! - Result merger and trailing returns, volatility, RSI and MACD
//! - A polars frame in the normalized long schema

pub mod analytics;
pub mod data;
pub mod domain;
pub mod fetch;
pub mod frame;
