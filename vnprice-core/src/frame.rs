//! Long-format polars frame of merged series plus returns.
//!
//! One row per (Symbol, Date), sorted by symbol then date, with the column
//! names downstream notebooks and exports expect.

use crate::analytics::{compute_returns, ReturnWindow};
use crate::domain::{SeriesResult, TickerSymbol};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;

pub const SYMBOL: &str = "Symbol";
pub const DATE: &str = "Date";
pub const ADJ_CLOSE: &str = "Adj Close";

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),
}

/// The normalized frame schema.
pub fn frame_schema() -> Schema {
    let mut fields = vec![
        Field::new(SYMBOL.into(), DataType::String),
        Field::new(DATE.into(), DataType::Date),
        Field::new("Open".into(), DataType::Float64),
        Field::new("High".into(), DataType::Float64),
        Field::new("Low".into(), DataType::Float64),
        Field::new("Close".into(), DataType::Float64),
        Field::new(ADJ_CLOSE.into(), DataType::Float64),
        Field::new("Volume".into(), DataType::UInt64),
    ];
    fields.extend(
        ReturnWindow::ALL
            .iter()
            .map(|w| Field::new(w.label().into(), DataType::Float64)),
    );
    Schema::from_iter(fields)
}

/// Build the long frame for every series.
pub fn to_frame(series: &BTreeMap<TickerSymbol, SeriesResult>) -> Result<DataFrame, FrameError> {
    let epoch = NaiveDate::default();
    let mut symbols: Vec<String> = Vec::new();
    let mut dates: Vec<i32> = Vec::new();
    let mut opens: Vec<f64> = Vec::new();
    let mut highs: Vec<f64> = Vec::new();
    let mut lows: Vec<f64> = Vec::new();
    let mut closes: Vec<f64> = Vec::new();
    let mut adj_closes: Vec<f64> = Vec::new();
    let mut volumes: Vec<u64> = Vec::new();
    let mut returns: [Vec<Option<f64>>; 4] = Default::default();

    for s in series.values() {
        let r = compute_returns(s);
        for (bar, row) in s.bars().iter().zip(&r.rows) {
            symbols.push(s.ticker().to_string());
            dates.push((bar.date - epoch).num_days() as i32);
            opens.push(bar.open);
            highs.push(bar.high);
            lows.push(bar.low);
            closes.push(bar.close);
            adj_closes.push(bar.adj_close);
            volumes.push(bar.volume);
            for (col, window) in returns.iter_mut().zip(ReturnWindow::ALL) {
                col.push(row.get(window));
            }
        }
    }

    let mut columns = vec![
        Column::new(SYMBOL.into(), symbols),
        Column::new(DATE.into(), dates).cast(&DataType::Date)?,
        Column::new("Open".into(), opens),
        Column::new("High".into(), highs),
        Column::new("Low".into(), lows),
        Column::new("Close".into(), closes),
        Column::new(ADJ_CLOSE.into(), adj_closes),
        Column::new("Volume".into(), volumes),
    ];
    for (values, window) in returns.into_iter().zip(ReturnWindow::ALL) {
        columns.push(Column::new(window.label().into(), values));
    }

    let df = DataFrame::new(columns)?;
    Ok(canonicalize(df.lazy()).collect()?)
}

/// Sort by (Symbol, Date) and keep the first row per key.
pub fn canonicalize(df: LazyFrame) -> LazyFrame {
    df.sort(
        [SYMBOL, DATE],
        SortMultipleOptions::default()
            .with_order_descending_multi([false, false])
            .with_maintain_order(true),
    )
    .unique_stable(
        Some(vec![SYMBOL.into(), DATE.into()]),
        UniqueKeepStrategy::First,
    )
}

/// Check a frame carries every normalized column with the expected type.
pub fn validate_frame(df: &DataFrame) -> Result<(), FrameError> {
    let expected = frame_schema();
    let actual = df.schema();

    for field in expected.iter_fields() {
        let actual_dtype = actual
            .get(field.name())
            .ok_or_else(|| FrameError::MissingColumn(field.name().to_string()))?;
        if actual_dtype != field.dtype() {
            return Err(FrameError::TypeMismatch {
                column: field.name().to_string(),
                expected: field.dtype().clone(),
                actual: actual_dtype.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic_bars;
    use crate::domain::DateRange;

    fn sample() -> BTreeMap<TickerSymbol, SeriesResult> {
        let range = DateRange::parse("2024-01-01", "2024-03-31").unwrap();
        ["VCB", "FPT"]
            .into_iter()
            .map(|t| {
                let ticker = TickerSymbol::new(t).unwrap();
                let bars = synthetic_bars(&ticker, &range);
                (ticker.clone(), SeriesResult::from_bars(ticker, bars))
            })
            .collect()
    }

    #[test]
    fn frame_has_normalized_schema() {
        let data = sample();
        let df = to_frame(&data).unwrap();
        validate_frame(&df).unwrap();
        let rows: usize = data.values().map(SeriesResult::len).sum();
        assert_eq!(df.height(), rows);
    }

    #[test]
    fn frame_is_sorted_by_symbol_then_date() {
        let df = to_frame(&sample()).unwrap();
        let symbols = df.column(SYMBOL).unwrap().str().unwrap();
        assert_eq!(symbols.get(0), Some("FPT"));
        assert_eq!(symbols.get(df.height() - 1), Some("VCB"));

        let dates = df.column(DATE).unwrap().date().unwrap();
        assert!(dates.get(0).unwrap() < dates.get(1).unwrap());
    }

    #[test]
    fn early_returns_are_null() {
        let df = to_frame(&sample()).unwrap();
        let one_day = df.column("1d%").unwrap().f64().unwrap();
        assert_eq!(one_day.get(0), None);
        assert!(one_day.get(1).is_some());
        let six_months = df.column("6m%").unwrap().f64().unwrap();
        assert_eq!(six_months.null_count(), df.height());
    }

    #[test]
    fn empty_input_gives_empty_valid_frame() {
        let df = to_frame(&BTreeMap::new()).unwrap();
        assert_eq!(df.height(), 0);
        validate_frame(&df).unwrap();
    }

    #[test]
    fn validate_rejects_missing_column() {
        let df = df!(SYMBOL => &["VCB"], "Open" => &[1.0]).unwrap();
        assert!(matches!(
            validate_frame(&df),
            Err(FrameError::MissingColumn(_))
        ));
    }
}
