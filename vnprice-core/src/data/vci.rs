//! VCI (Vietcap) data provider (secondary source).
//!
//! Posts a gap-chart request for one symbol and decodes the columnar
//! `o/h/l/c/v/t` response. VCI has no date-range query, only "N bars back
//! from timestamp", so the adapter over-requests and filters to the range.

use super::provider::{classify_status, BarProvider, ProviderError};
use crate::domain::{Bar, DateRange, TickerSymbol};
use chrono::{DateTime, Datelike, NaiveDate, Weekday};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const GAP_CHART_URL: &str = "https://trading.vietcap.com.vn/api/chart/OHLCChart/gap-chart";

/// Extra bars requested beyond the business-day count of the range.
const COUNT_BACK_BUFFER: u32 = 100;

/// One symbol's columns in the gap-chart response.
#[derive(Debug, Deserialize)]
struct ChartColumns {
    o: Vec<Option<f64>>,
    h: Vec<Option<f64>>,
    l: Vec<Option<f64>>,
    c: Vec<Option<f64>>,
    v: Vec<Option<f64>>,
    /// Unix seconds, sent either as strings or numbers.
    t: Vec<Value>,
}

/// VCI data provider.
pub struct VciProvider {
    client: reqwest::blocking::Client,
    url: String,
}

impl VciProvider {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_url(GAP_CHART_URL, timeout)
    }

    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn parse_response(
        ticker: &TickerSymbol,
        range: &DateRange,
        payload: Vec<ChartColumns>,
    ) -> Result<Vec<Bar>, ProviderError> {
        let Some(cols) = payload.into_iter().next() else {
            return Ok(Vec::new());
        };

        let n = cols.t.len();
        if [cols.o.len(), cols.h.len(), cols.l.len(), cols.c.len(), cols.v.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(ProviderError::transient(format!(
                "vci returned inconsistent column lengths for {ticker}"
            )));
        }

        let mut bars = Vec::with_capacity(n);
        for i in 0..n {
            let date = timestamp_to_date(&cols.t[i]).ok_or_else(|| {
                ProviderError::transient(format!("vci timestamp {:?} for {ticker} not decodable", cols.t[i]))
            })?;
            if !range.contains(date) {
                continue;
            }
            let (open, high, low, close) = (cols.o[i], cols.h[i], cols.l[i], cols.c[i]);
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }
            let close = close.unwrap_or(f64::NAN);
            bars.push(Bar {
                ticker: ticker.clone(),
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close,
                adj_close: close,
                volume: cols.v[i].map(|v| v.max(0.0) as u64).unwrap_or(0),
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

fn timestamp_to_date(raw: &Value) -> Option<NaiveDate> {
    let secs = match raw {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

/// Weekdays in `range`, the number of daily bars VCI can possibly return.
fn business_days(range: &DateRange) -> u32 {
    range
        .start()
        .iter_days()
        .take_while(|d| *d <= range.end())
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as u32
}

impl BarProvider for VciProvider {
    fn name(&self) -> &str {
        "vci"
    }

    fn fetch(&self, ticker: &TickerSymbol, range: &DateRange) -> Result<Vec<Bar>, ProviderError> {
        let to = range
            .end()
            .and_hms_opt(23, 59, 59)
            .map(|t| t.and_utc().timestamp())
            .unwrap_or_default();
        let payload = serde_json::json!({
            "timeFrame": "ONE_DAY",
            "symbols": [ticker.as_str()],
            "to": to,
            "countBack": business_days(range) + COUNT_BACK_BUFFER,
        });

        tracing::debug!(%ticker, %range, "vci request");

        let resp = self
            .client
            .post(&self.url)
            .header("Referer", "https://trading.vietcap.com.vn/")
            .header("Origin", "https://trading.vietcap.com.vn")
            .json(&payload)
            .send()
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::new(
                classify_status(status.as_u16()),
                format!("vci HTTP {status} for {ticker}"),
            ));
        }

        let body: Vec<ChartColumns> = resp.json().map_err(|e| {
            ProviderError::transient(format!("vci response for {ticker} not decodable: {e}"))
        })?;

        Self::parse_response(ticker, range, body)
    }
}
