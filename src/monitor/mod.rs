//! Per-kind source monitoring.
//!
//! A [`SourceMonitor`] plans the targets for its source kind, fetches each
//! one and analyzes the content, both through the retry policy. Failures
//! are folded into the returned results; nothing here aborts a run.

pub mod sources;

pub use sources::SourceTarget;

use crate::analyzer::AiAnalyzer;
use crate::fetcher::ContentFetcher;
use crate::models::{MonitoringRequest, SourceKind, SourceOutcome, SourceResult};
use crate::retry::RetryPolicy;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Characters of fetched content kept in a result.
const EXCERPT_CHARS: usize = 500;

/// Monitors one source kind.
#[derive(Clone)]
pub struct SourceMonitor {
    kind: SourceKind,
    fetcher: Arc<dyn ContentFetcher>,
    analyzer: Arc<AiAnalyzer>,
    retry: RetryPolicy,
}

impl SourceMonitor {
    pub fn new(
        kind: SourceKind,
        fetcher: Arc<dyn ContentFetcher>,
        analyzer: Arc<AiAnalyzer>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            kind,
            fetcher,
            analyzer,
            retry,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Monitor every planned target for `request`.
    pub async fn run(&self, request: &MonitoringRequest) -> SourceOutcome {
        info!(
            company = request.company_name(),
            kind = %self.kind,
            "Monitoring {}",
            self.kind.display_name()
        );
        self.run_targets(sources::plan(self.kind, request)).await
    }

    /// Monitor the given targets concurrently.
    ///
    /// Results keep the order of `targets`, whatever order they finish in.
    pub async fn run_targets(&self, targets: Vec<SourceTarget>) -> SourceOutcome {
        let results = join_all(targets.iter().map(|t| self.monitor_target(t))).await;

        if self.kind.is_multi_item() {
            return SourceOutcome::Multi(results);
        }

        match results.into_iter().next() {
            Some(result) => SourceOutcome::Single(result),
            None => SourceOutcome::Single(SourceResult::failed(
                self.kind,
                self.kind.display_name(),
                "",
                "no target to monitor",
            )),
        }
    }

    async fn monitor_target(&self, target: &SourceTarget) -> SourceResult {
        let fetcher = &self.fetcher;
        let url = target.target.as_str();
        let rules = target.rules.as_ref();

        let fetched = self
            .retry
            .run("fetch", move |attempt| {
                debug!(url, attempt, "Fetching");
                fetcher.fetch(url, rules)
            })
            .await;

        let content = match fetched {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    kind = %self.kind,
                    label = %target.label,
                    attempts = e.attempts(),
                    error = %e,
                    "Source unavailable"
                );
                return SourceResult::failed(self.kind, &target.label, url, e.to_string());
            }
        };

        if content.trim().is_empty() {
            warn!(kind = %self.kind, label = %target.label, "Fetched content was empty");
            return SourceResult::partial(
                self.kind,
                &target.label,
                url,
                String::new(),
                "fetched content was empty",
            );
        }

        let analyzer = &self.analyzer;
        let analysis_type = sources::analysis_type(self.kind);
        let body = content.as_str();

        let analyzed = self
            .retry
            .run("analyze", move |_| analyzer.analyze(body, analysis_type))
            .await;

        match analyzed {
            Ok(analysis) => {
                debug!(kind = %self.kind, label = %target.label, "Source analyzed");
                SourceResult::ok(self.kind, &target.label, url, excerpt(&content), analysis)
            }
            Err(e) => {
                warn!(
                    kind = %self.kind,
                    label = %target.label,
                    attempts = e.attempts(),
                    error = %e,
                    "Analysis degraded"
                );
                SourceResult::partial(
                    self.kind,
                    &target.label,
                    url,
                    excerpt(&content),
                    e.to_string(),
                )
            }
        }
    }
}

/// First 500 characters of `content`, with "..." appended when cut.
pub fn excerpt(content: &str) -> String {
    match content.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_string(),
    }
}
