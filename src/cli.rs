//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Options that also live in the configuration file
//! are `Option`s so that only explicitly supplied values override it.

use crate::models::{RiskRating, SourceKind};
use clap::Parser;
use std::path::PathBuf;

/// lendwatch - monitor companies for lending risk signals
///
/// Crawls reviews, news, social media and the company website through a
/// crawl service, analyzes each source with a language model and writes a
/// lending risk report in JSON and text.
///
/// Examples:
///   lendwatch --company "Acme Corp" --location US
///   lendwatch --company "Acme Corp" --website https://www.acme.com --sources news,website
///   lendwatch --batch companies.json --batch-concurrency 2
///   lendwatch --company "Acme Corp" --fail-on high
///   lendwatch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Company to monitor
    #[arg(
        long,
        value_name = "NAME",
        required_unless_present_any = ["batch", "init_config"],
        conflicts_with = "batch"
    )]
    pub company: Option<String>,

    /// Company location, used to narrow review searches
    #[arg(long, value_name = "LOCATION")]
    pub location: Option<String>,

    /// Company website; guessed from the name when omitted
    #[arg(long, value_name = "URL")]
    pub website: Option<String>,

    /// JSON file listing companies to monitor
    ///
    /// A JSON array of {"name", "location"?, "website"?, "industry"?} objects.
    #[arg(long, value_name = "FILE")]
    pub batch: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .lendwatch.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory reports are written to
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Model used for analysis
    #[arg(short, long, env = "LENDWATCH_MODEL")]
    pub model: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, value_name = "URL", env = "LENDWATCH_API_URL")]
    pub api_url: Option<String>,

    /// API key for the model
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, hide = true)]
    pub api_key: Option<String>,

    /// Crawl service base URL
    #[arg(long, value_name = "URL", env = "FIRECRAWL_URL")]
    pub fetch_url: Option<String>,

    /// API key for the crawl service
    #[arg(long, env = "FIRECRAWL_API_KEY", hide_env_values = true, hide = true)]
    pub fetch_api_key: Option<String>,

    /// Source kinds to monitor (comma-separated)
    ///
    /// Example: --sources news,website
    #[arg(long, value_name = "KINDS", value_delimiter = ',')]
    pub sources: Option<Vec<SourceArg>>,

    /// Total attempts per fetch or analysis call
    #[arg(long, value_name = "COUNT")]
    pub max_attempts: Option<u32>,

    /// Delay before the first retry, in milliseconds
    #[arg(long, value_name = "MS")]
    pub initial_delay_ms: Option<u64>,

    /// Wall-clock budget for one company's run, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum analysis calls in flight at once
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Companies monitored at once in batch mode
    #[arg(long, value_name = "NUM")]
    pub batch_concurrency: Option<usize>,

    /// Fail if the risk rating is at or above this level
    ///
    /// Useful for CI pipelines. Exit code 2 when the threshold is met.
    /// Values: low, medium, high
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .lendwatch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Source kind as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceArg {
    Reviews,
    News,
    Social,
    Website,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Reviews => SourceKind::Reviews,
            SourceArg::News => SourceKind::News,
            SourceArg::Social => SourceKind::Social,
            SourceArg::Website => SourceKind::Website,
        }
    }
}

/// Risk level for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Low,
    Medium,
    High,
}

impl FailOnLevel {
    pub fn as_rating(&self) -> RiskRating {
        match self {
            FailOnLevel::Low => RiskRating::Low,
            FailOnLevel::Medium => RiskRating::Medium,
            FailOnLevel::High => RiskRating::High,
        }
    }

    /// Whether `rating` meets this threshold.
    pub fn is_met_by(&self, rating: RiskRating) -> bool {
        rating >= self.as_rating()
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref company) = self.company {
            if company.trim().is_empty() {
                return Err("Company name must not be empty".to_string());
            }
        }

        if let Some(ref batch) = self.batch {
            if !batch.is_file() {
                return Err(format!("Batch file does not exist: {}", batch.display()));
            }
            if self.location.is_some() || self.website.is_some() {
                return Err("--location and --website apply to --company, not --batch".to_string());
            }
        }

        for url in [&self.fetch_url, &self.api_url].into_iter().flatten() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("URL must start with 'http://' or 'https://': {}", url));
            }
        }

        if self.max_attempts == Some(0) {
            return Err("Max attempts must be at least 1".to_string());
        }

        if self.concurrency == Some(0) || self.batch_concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref sources) = self.sources {
            if sources.is_empty() {
                return Err("At least one source kind must be given".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            company: Some("Acme Corp".to_string()),
            location: Some("US".to_string()),
            website: None,
            batch: None,
            config: None,
            output_dir: None,
            model: None,
            api_url: None,
            api_key: None,
            fetch_url: None,
            fetch_api_key: None,
            sources: None,
            max_attempts: None,
            initial_delay_ms: None,
            timeout: None,
            concurrency: None,
            batch_concurrency: None,
            fail_on: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "lendwatch",
            "--company",
            "Acme Corp",
            "--sources",
            "news,website",
            "--fail-on",
            "medium",
            "--max-attempts",
            "5",
        ])
        .unwrap();

        assert_eq!(args.company.as_deref(), Some("Acme Corp"));
        assert_eq!(args.sources, Some(vec![SourceArg::News, SourceArg::Website]));
        assert_eq!(args.fail_on, Some(FailOnLevel::Medium));
        assert_eq!(args.max_attempts, Some(5));
    }

    #[test]
    fn test_company_and_batch_conflict() {
        let result = Args::try_parse_from([
            "lendwatch",
            "--company",
            "Acme",
            "--batch",
            "companies.json",
        ]);
        assert!(result.is_err());

        assert!(Args::try_parse_from(["lendwatch"]).is_err());
        assert!(Args::try_parse_from(["lendwatch", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_empty_company() {
        let mut args = make_args();
        args.company = Some("  ".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bad_values() {
        let mut args = make_args();
        args.fetch_url = Some("localhost:3000".to_string());
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.max_attempts = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.concurrency = Some(0);
        assert!(args.validate().is_err());

        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_fail_on_threshold() {
        assert!(FailOnLevel::Medium.is_met_by(RiskRating::High));
        assert!(FailOnLevel::Medium.is_met_by(RiskRating::Medium));
        assert!(!FailOnLevel::High.is_met_by(RiskRating::Medium));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
