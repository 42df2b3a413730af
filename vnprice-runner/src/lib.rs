//! vnprice runner: configuration, the concurrent fetch pipeline, and the
//! presentation layer on top of `vnprice-core`.
//!
//! - TOML fetch configuration with validation
//! - Bounded-pool multi-ticker pipeline producing a `FetchReport`
//! - Latest-price summary table
//! - CSV, JSON manifest and Markdown artifacts

pub mod config;
pub mod export;
pub mod pipeline;
pub mod summary;

pub use config::{
    ConfigError, FetchConfig, LimitsConfig, OutputConfig, RangeConfig, RetryConfig, MAX_DELAY_SECS,
};
pub use export::{
    build_manifest, export_manifest_json, export_ohlcv_csv, export_returns_csv, import_manifest,
    check_frame, load_manifest, save_artifacts, Manifest, ManifestFailure, ManifestTicker,
    SCHEMA_VERSION,
};
pub use pipeline::{compute_dataset_hash, FetchReport, Pipeline, PipelineError, TickerFailure};
pub use summary::{render_markdown, render_table, summarize, SummaryRow};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn pipeline_is_send_sync() {
        assert_send::<Pipeline>();
        assert_sync::<Pipeline>();
    }

    #[test]
    fn fetch_report_is_send_sync() {
        assert_send::<FetchReport>();
        assert_sync::<FetchReport>();
    }

    #[test]
    fn config_is_send_sync() {
        assert_send::<FetchConfig>();
        assert_sync::<FetchConfig>();
    }

    #[test]
    fn summary_row_is_send_sync() {
        assert_send::<SummaryRow>();
        assert_sync::<SummaryRow>();
    }
}
