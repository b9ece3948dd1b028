//! Monitoring run orchestration.
//!
//! One run moves through `Dispatched -> Collecting -> Summarizing ->
//! Complete`. Every configured source monitor is spawned onto a
//! [`JoinSet`]; the orchestrator waits for all of them whatever their
//! outcome, then asks the analyzer for a cross-source summary.
//!
//! Cancellation (caller token or the run timeout) aborts every child task,
//! waits for them to terminate and returns an error; no report is built.

use crate::analysis::{all_sources_failed, summary_digest};
use crate::analyzer::AiAnalyzer;
use crate::config::Config;
use crate::error::OrchestrationError;
use crate::fetcher::{ContentFetcher, FirecrawlFetcher};
use crate::models::{
    MonitoringReport, MonitoringRequest, SourceKind, SourceOutcome, SourceResult,
};
use crate::monitor::SourceMonitor;
use crate::retry::RetryPolicy;
use anyhow::Result;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Phase of a monitoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Dispatched,
    Collecting,
    Summarizing,
    Complete,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Dispatched => write!(f, "dispatched"),
            RunPhase::Collecting => write!(f, "collecting"),
            RunPhase::Summarizing => write!(f, "summarizing"),
            RunPhase::Complete => write!(f, "complete"),
        }
    }
}

/// How the run future was left.
enum Exit {
    Finished(Result<MonitoringReport, OrchestrationError>),
    Cancelled,
    TimedOut,
}

type SourceTasks = JoinSet<(SourceKind, SourceOutcome)>;

/// Runs every configured source monitor for a company and builds the report.
pub struct MonitoringOrchestrator {
    monitors: Vec<SourceMonitor>,
    analyzer: Arc<AiAnalyzer>,
    retry: RetryPolicy,
    run_timeout: Duration,
}

impl MonitoringOrchestrator {
    /// Orchestrator monitoring `kinds`; duplicates are ignored.
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        analyzer: Arc<AiAnalyzer>,
        retry: RetryPolicy,
        kinds: &[SourceKind],
        run_timeout: Duration,
    ) -> Self {
        let mut kinds = kinds.to_vec();
        kinds.sort();
        kinds.dedup();

        let monitors = kinds
            .into_iter()
            .map(|kind| SourceMonitor::new(kind, fetcher.clone(), analyzer.clone(), retry.clone()))
            .collect();

        Self {
            monitors,
            analyzer,
            retry,
            run_timeout,
        }
    }

    /// Orchestrator wired to the configured crawl service and model API.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = FirecrawlFetcher::new(&config.fetcher)?;
        let analyzer =
            AiAnalyzer::from_config(&config.model, config.monitoring.analyze_concurrency)?;

        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(analyzer),
            RetryPolicy::from(&config.retry),
            &config.monitoring.sources,
            Duration::from_secs(config.monitoring.run_timeout_seconds),
        ))
    }

    /// Source kinds every report will contain.
    pub fn kinds(&self) -> Vec<SourceKind> {
        self.monitors.iter().map(|m| m.kind()).collect()
    }

    pub fn model_name(&self) -> &str {
        self.analyzer.model_name()
    }

    /// Monitor one company.
    ///
    /// Per-source failures are recorded in the report. Only cancellation,
    /// the run timeout, or every source failing together with the summary
    /// are returned as errors.
    pub async fn run(
        &self,
        request: &MonitoringRequest,
        cancel: CancellationToken,
    ) -> Result<MonitoringReport, OrchestrationError> {
        let run_at = Utc::now();
        let started = Instant::now();
        let company = request.company_name();

        let mut tasks = SourceTasks::new();
        for monitor in &self.monitors {
            let monitor = monitor.clone();
            let request = request.clone();
            tasks.spawn(async move {
                let kind = monitor.kind();
                (kind, monitor.run(&request).await)
            });
        }
        info!(company, phase = %RunPhase::Dispatched, sources = self.monitors.len(), "Run dispatched");

        let exit = tokio::select! {
            biased;
            _ = cancel.cancelled() => Exit::Cancelled,
            _ = tokio::time::sleep(self.run_timeout) => Exit::TimedOut,
            finished = self.collect_and_summarize(request, &mut tasks, run_at, started) => {
                Exit::Finished(finished)
            }
        };

        let reason = match exit {
            Exit::Finished(result) => return result,
            Exit::Cancelled => "cancelled by caller".to_string(),
            Exit::TimedOut => format!("run exceeded {}s timeout", self.run_timeout.as_secs()),
        };

        warn!(company, reason = %reason, "Aborting run");
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        debug!(company, "All source tasks terminated");

        Err(OrchestrationError::Cancelled { reason })
    }

    async fn collect_and_summarize(
        &self,
        request: &MonitoringRequest,
        tasks: &mut SourceTasks,
        run_at: chrono::DateTime<Utc>,
        started: Instant,
    ) -> Result<MonitoringReport, OrchestrationError> {
        let company = request.company_name();
        info!(company, phase = %RunPhase::Collecting, "Collecting source results");

        let sources = self.collect(tasks).await;

        info!(company, phase = %RunPhase::Summarizing, "Summarizing");
        let digest = summary_digest(request, &sources, self.analyzer.summary_budget());
        let analyzer = &self.analyzer;
        let body = digest.as_str();

        let summarized = self
            .retry
            .run("summarize", move |_| analyzer.summarize(body))
            .await;

        let (summary, summary_error) = match summarized {
            Ok(summary) => (Some(summary), None),
            Err(e) if all_sources_failed(&sources) => {
                error!(company, error = %e, "Every source and the summary failed");
                return Err(OrchestrationError::AllSourcesFailed {
                    company: company.to_string(),
                    summary_error: e.to_string(),
                });
            }
            Err(e) => {
                warn!(company, error = %e, "Summary unavailable, keeping source results");
                (None, Some(e.to_string()))
            }
        };

        let report = MonitoringReport {
            company_name: company.to_string(),
            location: request.location().map(str::to_string),
            website: request.website().map(str::to_string),
            run_at,
            duration_seconds: started.elapsed().as_secs_f64(),
            sources,
            summary,
            summary_error,
        };

        let risk = report
            .risk_rating()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        info!(company, phase = %RunPhase::Complete, risk = %risk, "Run complete");
        Ok(report)
    }

    /// Wait for every source task; missing kinds become failed results.
    async fn collect(&self, tasks: &mut SourceTasks) -> BTreeMap<SourceKind, SourceOutcome> {
        let mut sources = BTreeMap::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((kind, outcome)) => {
                    debug!(kind = %kind, status = %outcome.status(), "Source finished");
                    sources.insert(kind, outcome);
                }
                Err(e) => error!(error = %e, "Source task did not complete"),
            }
        }

        for kind in self.kinds() {
            sources.entry(kind).or_insert_with(|| {
                let failed = SourceResult::failed(
                    kind,
                    kind.display_name(),
                    "",
                    "source task terminated unexpectedly",
                );
                if kind.is_multi_item() {
                    SourceOutcome::Multi(vec![failed])
                } else {
                    SourceOutcome::Single(failed)
                }
            });
        }

        sources
    }
}
