//! Email Generator — submits the cold email prompt with linear-backoff retry.
//!
//! Attempt `n` failing waits `n × backoff_unit` before attempt `n + 1`. The first
//! success wins. Exhausting every attempt is not an error: the outcome simply
//! carries no email, and the caller branches on that.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::generation::prompts::cold_email_prompt;
use crate::llm_client::ChatModel;
use crate::models::notice::Notice;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const UNAVAILABLE_MESSAGE: &str = "Our AI engine is currently unavailable. Please try again later.";

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Result of a generation run: the email if any attempt succeeded, plus the
/// notices raised along the way (one warning per failed attempt, one error if
/// every attempt failed).
#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    pub email: Option<String>,
    pub notices: Vec<Notice>,
}

pub async fn generate_email(
    model: &dyn ChatModel,
    portfolio_text: &str,
    policy: RetryPolicy,
) -> GenerationOutcome {
    let prompt = cold_email_prompt(portfolio_text);
    let mut outcome = GenerationOutcome::default();

    for attempt in 1..=policy.max_retries {
        match model.complete(&prompt).await {
            Ok(email) => {
                info!("Cold email generated on attempt {}", attempt);
                outcome.email = Some(email);
                return outcome;
            }
            Err(e) => {
                warn!("Generation attempt {} failed: {}", attempt, e);
                outcome
                    .notices
                    .push(Notice::warning(format!("Attempt {attempt} failed: {e}")));
                if attempt < policy.max_retries {
                    tokio::time::sleep(policy.backoff_unit * attempt).await;
                }
            }
        }
    }

    error!("Generation failed after {} attempts", policy.max_retries);
    outcome.notices.push(Notice::error(UNAVAILABLE_MESSAGE));
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use crate::models::notice::NoticeLevel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails `failures` times, then answers with `reply`.
    struct FlakyModel {
        failures: u32,
        calls: AtomicU32,
        reply: &'static str,
        prompts: Mutex<Vec<String>>,
    }

    impl FlakyModel {
        fn new(failures: u32, reply: &'static str) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                reply,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for FlakyModel {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(LlmError::Api {
                    status: 503,
                    message: "over capacity".to_string(),
                })
            } else {
                Ok(self.reply.to_string())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_returns_immediately() {
        let model = FlakyModel::new(0, "Hello there");
        let start = tokio::time::Instant::now();
        let outcome = generate_email(&model, "Job Description: SRE\n", RetryPolicy::default()).await;
        assert_eq!(outcome.email.as_deref(), Some("Hello there"));
        assert!(outcome.notices.is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(model.prompts.lock().unwrap()[0].contains("Job Description: SRE"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_backoff_then_success() {
        let model = FlakyModel::new(2, "Dear hiring team");
        let start = tokio::time::Instant::now();
        let outcome = generate_email(&model, "portfolio", RetryPolicy::default()).await;

        assert_eq!(outcome.email.as_deref(), Some("Dear hiring team"));
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);

        let warnings: Vec<_> = outcome.notices.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("Attempt 1 failed:"));
        assert!(warnings[1].starts_with("Attempt 2 failed:"));
        assert!(outcome.notices.iter().all(|n| n.level == NoticeLevel::Warning));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_yield_none_and_one_terminal_notice() {
        let model = FlakyModel::new(u32::MAX, "never");
        let outcome = generate_email(&model, "portfolio", RetryPolicy::default()).await;

        assert!(outcome.email.is_none());
        assert_eq!(model.calls.load(Ordering::SeqCst), DEFAULT_MAX_RETRIES);

        let errors: Vec<_> = outcome
            .notices
            .iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, UNAVAILABLE_MESSAGE);
        assert_eq!(outcome.notices.len(), DEFAULT_MAX_RETRIES as usize + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_policy() {
        let model = FlakyModel::new(u32::MAX, "never");
        let policy = RetryPolicy {
            max_retries: 5,
            backoff_unit: Duration::from_millis(10),
        };
        let start = tokio::time::Instant::now();
        let outcome = generate_email(&model, "portfolio", policy).await;
        assert!(outcome.email.is_none());
        assert_eq!(model.calls.load(Ordering::SeqCst), 5);
        // 10 + 20 + 30 + 40 ms between the five attempts
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
