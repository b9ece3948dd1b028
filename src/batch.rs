//! Batch monitoring of several companies.
//!
//! Companies are read from a JSON array and monitored a few at a time.
//! Each company's report is persisted on its own; one company's failure is
//! recorded in the batch summary and never stops the others.

use crate::error::RequestError;
use crate::models::{MonitoringRequest, RiskRating};
use crate::orchestrator::MonitoringOrchestrator;
use crate::report::ReportWriter;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// One company in a batch file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyEntry {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
}

impl CompanyEntry {
    pub fn to_request(&self) -> Result<MonitoringRequest, RequestError> {
        MonitoringRequest::new(
            self.name.clone(),
            self.location.clone(),
            self.website.clone(),
        )
    }
}

/// Read the companies of a batch file.
pub fn load_companies(path: &Path) -> Result<Vec<CompanyEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file: {}", path.display()))?;

    let companies: Vec<CompanyEntry> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse batch file: {}", path.display()))?;

    if companies.is_empty() {
        bail!("Batch file {} lists no companies", path.display());
    }

    Ok(companies)
}

/// Outcome of monitoring one company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyStatus {
    Success,
    Error,
}

/// Batch summary line for one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyOutcome {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    pub status: CompanyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_rating: Option<RiskRating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompanyOutcome {
    fn failed(entry: &CompanyEntry, error: String) -> Self {
        Self {
            name: entry.name.clone(),
            industry: entry.industry.clone(),
            status: CompanyStatus::Error,
            risk_rating: None,
            report_path: None,
            error: Some(error),
        }
    }
}

/// Summary of a whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_companies: usize,
    pub successful: usize,
    pub failed: usize,
    pub monitoring_date: DateTime<Utc>,
    pub companies: Vec<CompanyOutcome>,
}

impl BatchSummary {
    pub fn from_outcomes(companies: Vec<CompanyOutcome>, monitoring_date: DateTime<Utc>) -> Self {
        let successful = companies
            .iter()
            .filter(|c| c.status == CompanyStatus::Success)
            .count();

        Self {
            total_companies: companies.len(),
            successful,
            failed: companies.len() - successful,
            monitoring_date,
            companies,
        }
    }

    /// Highest risk rating among the successful companies.
    pub fn worst_rating(&self) -> Option<RiskRating> {
        self.companies.iter().filter_map(|c| c.risk_rating).max()
    }
}

/// Monitor `companies`, at most `concurrency` at a time.
///
/// Outcomes are returned in input order.
pub async fn run_batch(
    orchestrator: &MonitoringOrchestrator,
    writer: &ReportWriter,
    companies: &[CompanyEntry],
    concurrency: usize,
    cancel: &CancellationToken,
    progress: &ProgressBar,
) -> BatchSummary {
    let started = Utc::now();
    info!(
        companies = companies.len(),
        concurrency, "Starting batch monitoring"
    );

    let outcomes: Vec<CompanyOutcome> = stream::iter(companies)
        .map(|entry| async move {
            progress.set_message(entry.name.clone());
            let outcome = monitor_company(orchestrator, writer, entry, cancel.child_token()).await;
            progress.inc(1);
            outcome
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    BatchSummary::from_outcomes(outcomes, started)
}

async fn monitor_company(
    orchestrator: &MonitoringOrchestrator,
    writer: &ReportWriter,
    entry: &CompanyEntry,
    cancel: CancellationToken,
) -> CompanyOutcome {
    let request = match entry.to_request() {
        Ok(request) => request,
        Err(e) => return CompanyOutcome::failed(entry, e.to_string()),
    };

    let report = match orchestrator.run(&request, cancel).await {
        Ok(report) => report,
        Err(e) => {
            error!(company = %entry.name, error = %e, "Monitoring failed");
            return CompanyOutcome::failed(entry, e.to_string());
        }
    };

    match writer.write(&report) {
        Ok(written) => CompanyOutcome {
            name: report.company_name.clone(),
            industry: entry.industry.clone(),
            status: CompanyStatus::Success,
            risk_rating: report.risk_rating(),
            report_path: Some(written.json_path.display().to_string()),
            error: None,
        },
        Err(e) => {
            error!(company = %entry.name, error = %e, "Failed to save report");
            CompanyOutcome::failed(entry, format!("{:#}", e))
        }
    }
}
