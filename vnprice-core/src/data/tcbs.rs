//! TCBS data provider (primary source).
//!
//! Fetches daily bars from the TCBS stock-insight long-term bars endpoint.
//! The endpoint has no official documentation and throttles aggressively, so
//! every failure is classified and handed back to the orchestrator instead
//! of being retried here.

use super::provider::{classify_status, BarProvider, ProviderError};
use crate::domain::{Bar, DateRange, TickerSymbol};
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

const BARS_URL: &str = "https://apipubaws.tcbs.com.vn/stock-insight/v2/stock/bars-long-term";

/// TCBS bars response.
#[derive(Debug, Deserialize)]
struct BarsResponse {
    data: Option<Vec<TcbsBar>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TcbsBar {
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
    trading_date: String,
}

/// TCBS data provider.
pub struct TcbsProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl TcbsProvider {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_base_url(BARS_URL, timeout)
    }

    /// Point the adapter at a different endpoint (mirrors, local stubs).
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Parse the bars payload, keeping only dates inside `range`.
    fn parse_response(
        ticker: &TickerSymbol,
        range: &DateRange,
        resp: BarsResponse,
    ) -> Result<Vec<Bar>, ProviderError> {
        let rows = resp.data.unwrap_or_default();
        let mut bars = Vec::with_capacity(rows.len());

        for row in rows {
            let date = parse_trading_date(&row.trading_date).ok_or_else(|| {
                ProviderError::transient(format!(
                    "unparseable tradingDate '{}' for {ticker}",
                    row.trading_date
                ))
            })?;
            if !range.contains(date) {
                continue;
            }
            // Holidays come back as all-null rows
            if row.open.is_none() && row.high.is_none() && row.low.is_none() && row.close.is_none()
            {
                continue;
            }
            let close = row.close.unwrap_or(f64::NAN);
            bars.push(Bar {
                ticker: ticker.clone(),
                date,
                open: row.open.unwrap_or(f64::NAN),
                high: row.high.unwrap_or(f64::NAN),
                low: row.low.unwrap_or(f64::NAN),
                close,
                adj_close: close,
                volume: row.volume.map(|v| v.max(0.0) as u64).unwrap_or(0),
            });
        }

        Ok(bars)
    }
}

/// `tradingDate` arrives as an ISO timestamp (`2024-01-02T00:00:00.000Z`)
/// or a bare date.
fn parse_trading_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn unix_seconds(date: NaiveDate, end_of_day: bool) -> i64 {
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc().timestamp()).unwrap_or_default()
}

impl BarProvider for TcbsProvider {
    fn name(&self) -> &str {
        "tcbs"
    }

    fn fetch(&self, ticker: &TickerSymbol, range: &DateRange) -> Result<Vec<Bar>, ProviderError> {
        let from = unix_seconds(range.start(), false).to_string();
        let to = unix_seconds(range.end(), true).to_string();

        tracing::debug!(%ticker, %range, "tcbs request");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("ticker", ticker.as_str()),
                ("type", "stock"),
                ("resolution", "D"),
                ("from", from.as_str()),
                ("to", to.as_str()),
            ])
            .send()
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::new(
                classify_status(status.as_u16()),
                format!("tcbs HTTP {status} for {ticker}"),
            ));
        }

        let body: BarsResponse = resp.json().map_err(|e| {
            ProviderError::transient(format!("tcbs response for {ticker} not decodable: {e}"))
        })?;

        Self::parse_response(ticker, range, body)
    }
}
