use std::time::Duration;

/// Per-endpoint timeout budgets
///
/// An explicit per-call override always wins; otherwise the request path
/// selects a named budget by longest matching prefix, falling back to
/// `default_timeout`.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub default_timeout: Duration,
    pub chat_completion_timeout: Duration,
    pub media_timeout: Duration,
    pub rag_timeout: Duration,
    pub stream_idle_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            chat_completion_timeout: Duration::from_secs(120),
            media_timeout: Duration::from_secs(90),
            rag_timeout: Duration::from_secs(60),
            stream_idle_timeout: Duration::from_secs(300),
        }
    }
}

impl TimeoutConfig {
    /// Resolve the budget for a request path
    pub fn budget_for(&self, path: &str) -> Duration {
        let rules: [(&str, Duration); 5] = [
            ("/api/v1/chat/completions", self.chat_completion_timeout),
            ("/api/v1/audio", self.media_timeout),
            ("/api/v1/tts", self.media_timeout),
            ("/api/v1/images", self.media_timeout),
            ("/api/v1/rag", self.rag_timeout),
        ];

        rules
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, budget)| *budget)
            .unwrap_or(self.default_timeout)
    }
}
