//! Quota-safe retry wrapper.
//!
//! Rate-limit errors are absorbed by waiting a fixed cooldown and retrying
//! the identical request. Every other error goes straight back to the caller.

use super::{ChatModel, ChatRequest, Completion};
use crate::agent::Lane;
use crate::config::PipelineSettings;
use crate::error::{Result, StudyError};
use crate::relay::RelaySender;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// When and how long to wait on quota exhaustion.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Fixed wait before each retry.
    pub cooldown: Duration,
    /// Quota failures tolerated per call. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Upper-case substrings that identify a quota error.
    pub markers: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&PipelineSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            cooldown: settings.quota_cooldown(),
            max_attempts: settings.max_quota_attempts,
            markers: settings
                .quota_markers
                .iter()
                .map(|m| m.to_uppercase())
                .collect(),
        }
    }

    /// Override the cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Cap the number of quota failures.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    /// Whether an error signals rate-limit or quota exhaustion.
    pub fn is_quota_error(&self, err: &StudyError) -> bool {
        if matches!(err, StudyError::QuotaExhausted(_)) {
            return true;
        }
        let text = err.to_string().to_uppercase();
        self.markers.iter().any(|marker| text.contains(marker.as_str()))
    }
}

/// A lane's model wrapped with quota-exhaustion retries.
pub struct QuotaSafeInvoker {
    inner: Arc<dyn ChatModel>,
    lane: Lane,
    policy: RetryPolicy,
    alerts: RelaySender,
}

impl QuotaSafeInvoker {
    /// Wrap a model. Cooldown alerts go to `alerts`.
    pub fn new(inner: Arc<dyn ChatModel>, lane: Lane, policy: RetryPolicy, alerts: RelaySender) -> Self {
        Self {
            inner,
            lane,
            policy,
            alerts,
        }
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl ChatModel for QuotaSafeInvoker {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
        let mut quota_failures = 0u32;

        loop {
            let err = match self.inner.complete(request).await {
                Ok(completion) => return Ok(completion),
                Err(e) => e,
            };

            if !self.policy.is_quota_error(&err) {
                debug!("Lane {} call failed without quota marker: {}", self.lane, err);
                return Err(err);
            }

            quota_failures += 1;
            if let Some(max) = self.policy.max_attempts {
                if quota_failures >= max {
                    return Err(StudyError::QuotaRetriesExhausted {
                        attempts: quota_failures,
                        last_error: err.to_string(),
                    });
                }
            }

            warn!(
                "Lane {} ({}) hit its quota (failure {}): {}",
                self.lane,
                self.inner.model_name(),
                quota_failures,
                err
            );
            self.alerts
                .emit(format!(
                    "\n[QUOTA_ALERT] Rate limit reached on lane {}. Waiting {}s before retrying...\n",
                    self.lane,
                    self.policy.cooldown.as_secs()
                ))
                .await;

            tokio::time::sleep(self.policy.cooldown).await;
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed script of results, one per call.
    struct ScriptedModel {
        script: Mutex<VecDeque<Result<Completion>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(script: Vec<Result<Completion>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _request: &ChatRequest) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Completion::text("default")))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![super::super::ChatMessage::User("hi".to_string())],
            tools: Vec::new(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default().with_cooldown(Duration::ZERO)
    }

    async fn drain(mut rx: relay::RelayReceiver) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_retries_quota_errors_until_success() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(StudyError::OpenAI("429 Too Many Requests".to_string())),
            Err(StudyError::OpenAI("RESOURCE_EXHAUSTED: quota".to_string())),
            Ok(Completion::text("eventually")),
        ]));
        let (tx, rx) = relay::channel(16);
        let invoker = QuotaSafeInvoker::new(model.clone(), Lane::A, fast_policy(), tx);

        let completion = invoker.complete(&request()).await.unwrap();
        drop(invoker);

        assert_eq!(completion.content.as_deref(), Some("eventually"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);

        let alerts = drain(rx).await;
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.contains("[QUOTA_ALERT]")));
    }

    #[tokio::test]
    async fn test_other_errors_propagate_without_cooldown() {
        let model = Arc::new(ScriptedModel::new(vec![Err(StudyError::OpenAI(
            "invalid API key".to_string(),
        ))]));
        let (tx, rx) = relay::channel(16);
        let invoker = QuotaSafeInvoker::new(model.clone(), Lane::B, fast_policy(), tx);

        let err = invoker.complete(&request()).await.unwrap_err();
        drop(invoker);

        assert!(matches!(err, StudyError::OpenAI(_)));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_max_attempts_caps_retries() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(StudyError::QuotaExhausted("lane a".to_string())),
            Err(StudyError::QuotaExhausted("lane a".to_string())),
            Err(StudyError::QuotaExhausted("lane a".to_string())),
        ]));
        let (tx, _rx) = relay::channel(16);
        let invoker = QuotaSafeInvoker::new(model.clone(), Lane::A, fast_policy().with_max_attempts(2), tx);

        let err = invoker.complete(&request()).await.unwrap_err();
        assert!(matches!(err, StudyError::QuotaRetriesExhausted { attempts: 2, .. }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_quota_markers_are_case_insensitive() {
        let policy = RetryPolicy::default();
        assert!(policy.is_quota_error(&StudyError::OpenAI("Rate limit exceeded".to_string())));
        assert!(policy.is_quota_error(&StudyError::OpenAI("resource_exhausted".to_string())));
        assert!(!policy.is_quota_error(&StudyError::Agent("bad request".to_string())));
    }
}
