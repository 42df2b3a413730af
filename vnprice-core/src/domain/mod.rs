//! Domain types: tickers, date ranges, bars and merged series.

pub mod bar;
pub mod range;
pub mod series;
pub mod ticker;

pub use bar::Bar;
pub use range::{DateRange, RangeError};
pub use series::SeriesResult;
pub use ticker::{parse_tickers, TickerError, TickerSymbol};
