//! Concurrent multi-ticker fetch pipeline.
//!
//! Tickers run in parallel on a bounded rayon pool; chunks of one ticker run
//! sequentially inside `Orchestrator::fetch_ticker`. The only state shared
//! between workers is the degraded-mode flag and the per-source throttles.

use crate::config::FetchConfig;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use vnprice_core::analytics::{compute_returns, ReturnsSeries};
use vnprice_core::data::{
    BarProvider, ErrorKind, ProviderSet, TcbsProvider, Throttled, VciProvider,
};
use vnprice_core::domain::{DateRange, SeriesResult, TickerSymbol};
use vnprice_core::fetch::{
    merge_outcomes, EventSink, FetchMode, MergeError, MergedSeries, ModeFlag, Orchestrator,
    Sleeper, TracingSink,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no tickers requested")]
    NoTickers,

    #[error("build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why a requested ticker has no series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerFailure {
    pub ticker: TickerSymbol,
    pub range: DateRange,
    /// Kind of the last provider error; `None` when nothing was fetched at
    /// all and nothing failed.
    pub last_kind: Option<ErrorKind>,
    pub attempts: u32,
    pub message: String,
}

impl TickerFailure {
    fn from_merge_error(ticker: TickerSymbol, range: DateRange, error: MergeError) -> Self {
        match error {
            MergeError::Fetch(e) => Self {
                ticker,
                range: DateRange::new(e.unit.range.start(), range.end()).unwrap_or(range),
                last_kind: Some(e.last_kind),
                attempts: e.attempts,
                message: e.to_string(),
            },
            e @ MergeError::EmptyResult { .. } => Self {
                ticker,
                range,
                last_kind: None,
                attempts: 0,
                message: e.to_string(),
            },
        }
    }
}

/// Everything a run produced, handed to the summary and export layers.
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub range: DateRange,
    pub requested: Vec<TickerSymbol>,
    pub series: BTreeMap<TickerSymbol, MergedSeries>,
    pub returns: BTreeMap<TickerSymbol, ReturnsSeries>,
    pub failures: Vec<TickerFailure>,
    /// Mode at the end of the run.
    pub mode: FetchMode,
    pub dataset_hash: String,
}

impl FetchReport {
    /// True when every ticker resolved its whole range.
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && self.series.values().all(MergedSeries::is_complete)
    }

    /// One line per failed ticker and per unfetched gap.
    pub fn problem_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .failures
            .iter()
            .map(|f| {
                let kind = f
                    .last_kind
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "empty result".to_string());
                format!("{} {}: {kind} ({})", f.ticker, f.range, f.message)
            })
            .collect();
        for (ticker, merged) in &self.series {
            for gap in &merged.gaps {
                lines.push(format!(
                    "{ticker} {}: partial data, {} missing after {} attempt(s)",
                    gap.range, gap.error.last_kind, gap.error.attempts
                ));
            }
        }
        lines
    }

    pub fn bar_count(&self) -> usize {
        self.series.values().map(|m| m.series.len()).sum()
    }

    pub fn series_map(&self) -> BTreeMap<TickerSymbol, SeriesResult> {
        self.series
            .iter()
            .map(|(t, m)| (t.clone(), m.series.clone()))
            .collect()
    }
}

pub struct Pipeline {
    orchestrator: Orchestrator,
    mode: Arc<ModeFlag>,
    max_workers: usize,
}

impl Pipeline {
    /// Build a pipeline over an explicit provider pair.
    pub fn new(providers: ProviderSet, config: &FetchConfig) -> Self {
        let mode = Arc::new(ModeFlag::new());
        let orchestrator = Orchestrator::new(providers, mode.clone())
            .with_policy(config.retry_policy())
            .with_degraded_delay(config.degraded_delay())
            .with_events(Arc::new(TracingSink));
        Self {
            orchestrator,
            mode,
            max_workers: config.limits.max_workers.max(1),
        }
    }

    /// Build a pipeline against the live TCBS (primary) and VCI (secondary)
    /// endpoints, each behind its own throttle.
    pub fn live(config: &FetchConfig) -> Result<Self, PipelineError> {
        let limits = config.throttle_limits();
        let primary: Arc<dyn BarProvider> =
            Arc::new(Throttled::new(TcbsProvider::new(config.timeout())?, limits));
        let secondary: Arc<dyn BarProvider> =
            Arc::new(Throttled::new(VciProvider::new(config.timeout())?, limits));
        Ok(Self::new(ProviderSet::new(primary, secondary), config))
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.orchestrator = self.orchestrator.with_events(events);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.orchestrator = self.orchestrator.with_sleeper(sleeper);
        self
    }

    pub fn mode(&self) -> FetchMode {
        self.mode.current()
    }

    /// Fetch, merge and compute returns for `tickers` over `range`.
    pub fn run(&self, tickers: &[TickerSymbol], range: DateRange) -> Result<FetchReport, PipelineError> {
        let mut seen = HashSet::new();
        let requested: Vec<TickerSymbol> = tickers
            .iter()
            .filter(|t| seen.insert((*t).clone()))
            .cloned()
            .collect();
        if requested.is_empty() {
            return Err(PipelineError::NoTickers);
        }

        tracing::info!(
            tickers = requested.len(),
            %range,
            workers = self.max_workers,
            "starting fetch"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()?;
        let outcomes: Vec<_> = pool.install(|| {
            requested
                .par_iter()
                .map(|ticker| self.orchestrator.fetch_ticker(ticker, range))
                .collect()
        });

        let mut series = BTreeMap::new();
        let mut failures = Vec::new();
        for (ticker, result) in merge_outcomes(&requested, outcomes) {
            match result {
                Ok(merged) => {
                    series.insert(ticker, merged);
                }
                Err(e) => failures.push(TickerFailure::from_merge_error(ticker, range, e)),
            }
        }

        let returns = series
            .iter()
            .map(|(t, m)| (t.clone(), compute_returns(&m.series)))
            .collect();
        let dataset_hash = compute_dataset_hash(&series);
        let mode = self.mode.current();

        tracing::info!(
            resolved = series.len(),
            failed = failures.len(),
            %mode,
            "fetch complete"
        );

        Ok(FetchReport {
            range,
            requested,
            series,
            returns,
            failures,
            mode,
            dataset_hash,
        })
    }
}

/// blake3 over every merged bar, tickers in sorted order.
pub fn compute_dataset_hash(series: &BTreeMap<TickerSymbol, MergedSeries>) -> String {
    let mut hasher = blake3::Hasher::new();

    for (ticker, merged) in series {
        hasher.update(ticker.as_str().as_bytes());
        for bar in merged.series.bars() {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
            hasher.update(&bar.adj_close.to_le_bytes());
        }
    }

    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vnprice_core::data::{ScriptedProvider, ScriptedCall};
    use vnprice_core::fetch::RecordingSleeper;

    fn t(s: &str) -> TickerSymbol {
        TickerSymbol::new(s).unwrap()
    }

    fn pipeline(primary: ScriptedProvider, secondary: ScriptedProvider) -> Pipeline {
        let config = FetchConfig::default();
        Pipeline::new(
            ProviderSet::new(Arc::new(primary), Arc::new(secondary)),
            &config,
        )
        .with_sleeper(Arc::new(RecordingSleeper::new()))
    }

    #[test]
    fn rejects_empty_ticker_list() {
        let p = pipeline(
            ScriptedProvider::synthetic("p"),
            ScriptedProvider::synthetic("s"),
        );
        let range = DateRange::parse("2024-01-01", "2024-03-31").unwrap();
        assert!(matches!(p.run(&[], range), Err(PipelineError::NoTickers)));
    }

    #[test]
    fn duplicate_tickers_fetch_once() {
        let primary = Arc::new(ScriptedProvider::synthetic("p"));
        let p = Pipeline::new(
            ProviderSet::new(primary.clone(), Arc::new(ScriptedProvider::synthetic("s"))),
            &FetchConfig::default(),
        );
        let range = DateRange::parse("2024-01-01", "2024-03-31").unwrap();
        let report = p.run(&[t("VCB"), t("VCB")], range).unwrap();
        assert_eq!(report.requested, vec![t("VCB")]);
        let calls: Vec<ScriptedCall> = primary.calls();
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn hash_is_stable_across_runs() {
        let range = DateRange::parse("2024-01-01", "2024-03-31").unwrap();
        let run = || {
            pipeline(
                ScriptedProvider::synthetic("p"),
                ScriptedProvider::synthetic("s"),
            )
            .run(&[t("FPT"), t("VCB")], range)
            .unwrap()
            .dataset_hash
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn out_of_range_delays_do_not_panic_on_build() {
        let mut config = FetchConfig::default();
        config.retry.degraded_delay_secs = 1e300;
        config.retry.max_delay_secs = 1e300;
        let p = Pipeline::new(
            ProviderSet::new(
                Arc::new(ScriptedProvider::synthetic("p")),
                Arc::new(ScriptedProvider::synthetic("s")),
            ),
            &config,
        );
        assert_eq!(p.mode(), FetchMode::Normal);
    }

    #[test]
    fn failed_ticker_becomes_a_problem_line() {
        let p = pipeline(
            ScriptedProvider::new("p", |ticker, range, _| {
                if ticker.as_str() == "ZZZ" {
                    Err(vnprice_core::data::ProviderError::permanent("HTTP 404"))
                } else {
                    Ok(vnprice_core::data::synthetic_bars(ticker, range))
                }
            }),
            ScriptedProvider::synthetic("s"),
        );
        let range = DateRange::parse("2024-01-01", "2024-03-31").unwrap();
        let report = p.run(&[t("VCB"), t("ZZZ")], range).unwrap();
        assert!(!report.all_succeeded());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].ticker, t("ZZZ"));
        assert_eq!(report.failures[0].last_kind, Some(ErrorKind::Permanent));
        let lines = report.problem_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ZZZ 2024-01-01..2024-03-31"));
    }
}
