//! Language-model analysis of fetched content.
//!
//! [`AiAnalyzer`] selects a prompt template by [`AnalysisType`], truncates
//! the content to a fixed character budget and submits it to a
//! [`ChatModel`]. The number of in-flight model calls is bounded by a
//! semaphore shared by every caller of one analyzer.

pub mod openai;
pub mod prompts;

pub use openai::OpenAiChat;
pub use prompts::AnalysisType;

use crate::analysis::summary::parse_summary;
use crate::config::ModelConfig;
use crate::error::AnalysisError;
use crate::models::SummaryAnalysis;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// A text-in, text-out language model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError>;
}

/// Prompt-templated analyzer with a bounded number of concurrent calls.
pub struct AiAnalyzer {
    model: Arc<dyn ChatModel>,
    content_chars: usize,
    summary_chars: usize,
    permits: Arc<Semaphore>,
}

impl AiAnalyzer {
    /// `max_in_flight` is clamped to at least one.
    pub fn new(
        model: Arc<dyn ChatModel>,
        content_chars: usize,
        summary_chars: usize,
        max_in_flight: usize,
    ) -> Self {
        Self {
            model,
            content_chars,
            summary_chars,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Analyzer talking to the configured OpenAI-compatible endpoint.
    pub fn from_config(config: &ModelConfig, max_in_flight: usize) -> Result<Self> {
        let model = OpenAiChat::new(config)?;
        Ok(Self::new(
            Arc::new(model),
            config.max_content_chars,
            config.summary_content_chars,
            max_in_flight,
        ))
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Characters of digest the summary prompt carries.
    pub fn summary_budget(&self) -> usize {
        self.summary_chars
    }

    /// The exact prompt submitted for `content`; depends only on its inputs.
    pub fn prompt_for(&self, content: &str, analysis_type: AnalysisType) -> String {
        let budget = match analysis_type {
            AnalysisType::Summary => self.summary_chars,
            _ => self.content_chars,
        };
        prompts::render(analysis_type, prompts::truncate_chars(content, budget))
    }

    /// Analyze `content` with the template selected by `analysis_type`.
    pub async fn analyze(
        &self,
        content: &str,
        analysis_type: AnalysisType,
    ) -> Result<String, AnalysisError> {
        let prompt = self.prompt_for(content, analysis_type);

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AnalysisError::Request {
                status: None,
                message: "analyzer is shut down".to_string(),
            })?;

        debug!(
            analysis_type = %analysis_type,
            prompt_chars = prompt.chars().count(),
            "Submitting analysis"
        );

        let text = self.model.complete(&prompt).await?;
        if text.trim().is_empty() {
            return Err(AnalysisError::InvalidResponse {
                message: format!("empty {} analysis", analysis_type),
            });
        }
        Ok(text)
    }

    /// Like [`AiAnalyzer::analyze`], selecting the template by tag.
    #[allow(dead_code)] // Entry point for callers holding a tag string
    pub async fn analyze_tagged(&self, content: &str, tag: &str) -> Result<String, AnalysisError> {
        let analysis_type: AnalysisType = tag.parse()?;
        self.analyze(content, analysis_type).await
    }

    /// Cross-source summary of a digest of every source result.
    pub async fn summarize(&self, digest: &str) -> Result<SummaryAnalysis, AnalysisError> {
        let text = self.analyze(digest, AnalysisType::Summary).await?;
        parse_summary(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskRating;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_test::assert_err;

    /// Records prompts and answers with a fixed reply after a short delay.
    struct RecordingModel {
        reply: String,
        prompts: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RecordingModel {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_content_gives_identical_prompt() {
        let model = Arc::new(RecordingModel::new("fine"));
        let analyzer = AiAnalyzer::new(model.clone(), 50, 100, 2);
        let content = "Acme Corp posted record revenue. ".repeat(20);

        analyzer.analyze(&content, AnalysisType::News).await.unwrap();
        analyzer.analyze(&content, AnalysisType::News).await.unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
    }

    #[test]
    fn test_prompt_truncates_to_budget() {
        let analyzer = AiAnalyzer::new(Arc::new(RecordingModel::new("x")), 10, 20, 1);
        let content = "abcdefghijklmnopqrstuvwxyz0123456789";

        let prompt = analyzer.prompt_for(content, AnalysisType::Reviews);
        assert!(prompt.contains("abcdefghij\n"));
        assert!(!prompt.contains("abcdefghijk"));

        let summary = analyzer.prompt_for(content, AnalysisType::Summary);
        assert!(summary.contains("abcdefghijklmnopqrst\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_calls_are_bounded() {
        let model = Arc::new(RecordingModel::new("ok"));
        let analyzer = AiAnalyzer::new(model.clone(), 100, 100, 2);

        let calls = (0..6).map(|_| analyzer.analyze("content", AnalysisType::Sentiment));
        let results = join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(model.prompts.lock().unwrap().len(), 6);
        assert_eq!(model.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_reply_is_invalid() {
        let analyzer = AiAnalyzer::new(Arc::new(RecordingModel::new("  \n")), 100, 100, 1);
        let err = analyzer
            .analyze("content", AnalysisType::Financial)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_unknown_tag_is_rejected() {
        let model = Arc::new(RecordingModel::new("ok"));
        let analyzer = AiAnalyzer::new(model.clone(), 100, 100, 1);

        assert_err!(analyzer.analyze_tagged("content", "horoscope").await);
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_summarize_plain_text() {
        let analyzer = AiAnalyzer::new(Arc::new(RecordingModel::new("Low risk")), 100, 100, 1);
        let summary = analyzer.summarize("digest").await.unwrap();
        assert_eq!(summary.risk_rating, RiskRating::Low);
        assert_eq!(summary.narrative, "Low risk");
    }
}
