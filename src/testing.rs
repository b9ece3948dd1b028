//! In-memory stand-ins for the fetch and model capabilities.

use crate::analyzer::{AiAnalyzer, ChatModel};
use crate::error::{AnalysisError, FetchError};
use crate::fetcher::{ContentFetcher, ExtractionRules};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Content(String),
    Fail(FetchError),
    Pending,
}

/// Counts live fetches; decremented when the fetch future is dropped.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fetcher answering by substring match on the target.
pub struct StubFetcher {
    default: Reply,
    overrides: Vec<(String, Reply)>,
    delays: Vec<(String, Duration)>,
    calls: Mutex<Vec<String>>,
    live: Arc<AtomicUsize>,
}

impl StubFetcher {
    /// Every target returns `content`.
    pub fn with_content(content: &str) -> Self {
        Self {
            default: Reply::Content(content.to_string()),
            overrides: Vec::new(),
            delays: Vec::new(),
            calls: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn content_when(mut self, needle: &str, content: &str) -> Self {
        self.overrides
            .push((needle.to_string(), Reply::Content(content.to_string())));
        self
    }

    pub fn fail_when(mut self, needle: &str, error: FetchError) -> Self {
        self.overrides.push((needle.to_string(), Reply::Fail(error)));
        self
    }

    /// Matching fetches never complete.
    pub fn pending_when(mut self, needle: &str) -> Self {
        self.overrides.push((needle.to_string(), Reply::Pending));
        self
    }

    pub fn delay_when(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.push((needle.to_string(), delay));
        self
    }

    /// Targets fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Fetches currently in progress.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn reply_for(&self, target: &str) -> Reply {
        self.overrides
            .iter()
            .find(|(needle, _)| target.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl ContentFetcher for StubFetcher {
    async fn fetch(
        &self,
        target: &str,
        _rules: Option<&ExtractionRules>,
    ) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(target.to_string());
        let _guard = LiveGuard::new(&self.live);

        if let Some((_, delay)) = self.delays.iter().find(|(n, _)| target.contains(n.as_str())) {
            tokio::time::sleep(*delay).await;
        }

        match self.reply_for(target) {
            Reply::Content(content) => Ok(content),
            Reply::Fail(error) => Err(error),
            Reply::Pending => std::future::pending().await,
        }
    }
}

/// Model returning a fixed reply, optionally failing on matching prompts.
pub struct StubModel {
    reply: String,
    failures: Vec<(String, AnalysisError)>,
    prompts: Mutex<Vec<String>>,
}

impl StubModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            failures: Vec::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_when(mut self, needle: &str, error: AnalysisError) -> Self {
        self.failures.push((needle.to_string(), error));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for StubModel {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.failures.iter().find(|(n, _)| prompt.contains(n.as_str())) {
            Some((_, error)) => Err(error.clone()),
            None => Ok(self.reply.clone()),
        }
    }
}

/// Analyzer over `model` with generous budgets.
pub fn analyzer(model: Arc<StubModel>) -> Arc<AiAnalyzer> {
    Arc::new(AiAnalyzer::new(model, 4000, 12000, 4))
}
