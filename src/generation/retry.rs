//! Sequential generation loop with rate-limit backoff.
//!
//! Every (category, prompt) pair is attempted in catalog order, one at a
//! time. Rate-limited attempts are retried after an exponentially growing
//! wait; any other failure abandons the pair at once. Nothing runs
//! concurrently: the next pair starts only once the previous one reached a
//! terminal state.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::generation::results::{GeneratedImage, ResultSet};
use crate::generation::GenerationService;
use crate::prompt::catalog::{all_pairs, Category, PromptPair};
use crate::utils::media::SourceImage;

/// Substrings in an error message that mean "slow down".
pub const RATE_LIMIT_MARKERS: [&str; 3] = ["429", "RESOURCE_EXHAUSTED", "rate limit"];

/// Default rate-limit detection: marker substring match on the error text.
pub fn is_rate_limited(err: &AppError) -> bool {
    let message = err.to_string();
    RATE_LIMIT_MARKERS.iter().any(|m| message.contains(m))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per pair while rate limited, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: u32,
    /// Courtesy wait after each success.
    pub pacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
            backoff_factor: 2,
            pacing: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// The wait that follows `delay`, saturating at `Duration::MAX`.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        delay.checked_mul(self.backoff_factor).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairState {
    Attempting,
    Succeeded,
    ExhaustedRetries,
    FailedNonRetryable,
}

impl PairState {
    pub fn is_terminal(self) -> bool {
        self != PairState::Attempting
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairOutcome {
    pub category: Category,
    pub index: usize,
    pub state: PairState,
    pub attempts: u32,
    /// Waits taken before each retry, in order.
    pub backoffs: Vec<Duration>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} processed", self.processed, self.total)
    }
}

/// Hooks the loop awaits between attempts. All methods default to doing
/// nothing.
#[async_trait]
pub trait RunObserver: Send {
    async fn image_added(&mut self, _category: Category, _image: &GeneratedImage) {}
    async fn backoff(&mut self, _pair: &PromptPair, _delay: Duration, _retries_left: u32) {}
    async fn progress(&mut self, _progress: Progress) {}
}

impl RunObserver for () {}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: ResultSet,
    pub outcomes: Vec<PairOutcome>,
    pub succeeded: usize,
    pub total: usize,
}

impl RunReport {
    /// `"X/N succeeded, check logs."` when at least one pair was abandoned.
    pub fn partial_failure_message(&self) -> Option<String> {
        (self.succeeded < self.total)
            .then(|| format!("{}/{} succeeded, check logs.", self.succeeded, self.total))
    }
}

pub struct RetryLoop {
    service: Arc<dyn GenerationService>,
    policy: RetryPolicy,
    rate_limited: fn(&AppError) -> bool,
}

impl RetryLoop {
    pub fn new(service: Arc<dyn GenerationService>, policy: RetryPolicy) -> Self {
        RetryLoop { service, policy, rate_limited: is_rate_limited }
    }

    /// Swap the rate-limit detection without touching the loop.
    pub fn with_rate_limit_predicate(mut self, predicate: fn(&AppError) -> bool) -> Self {
        self.rate_limited = predicate;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run all catalog pairs against `source`.
    pub async fn run(
        &self,
        source: &SourceImage,
        observer: &mut dyn RunObserver,
    ) -> AppResult<RunReport> {
        self.run_pairs(source, &all_pairs(), observer).await
    }

    pub async fn run_pairs(
        &self,
        source: &SourceImage,
        pairs: &[PromptPair],
        observer: &mut dyn RunObserver,
    ) -> AppResult<RunReport> {
        let total = pairs.len();
        let mut results = ResultSet::new();
        let mut outcomes = Vec::with_capacity(total);
        let mut succeeded = 0;

        tracing::info!(total, "Starting generation run");
        observer.progress(Progress { processed: 0, total }).await;

        for (n, pair) in pairs.iter().enumerate() {
            let (outcome, image) = self.run_pair(source, pair, observer).await;
            if let Some(image) = image {
                observer.image_added(pair.category, &image).await;
                results.push(pair.category, image)?;
                succeeded += 1;
            }
            let done = outcome.state == PairState::Succeeded;
            outcomes.push(outcome);
            observer.progress(Progress { processed: n + 1, total }).await;

            if done && !self.policy.pacing.is_zero() {
                tokio::time::sleep(self.policy.pacing).await;
            }
        }

        tracing::info!(succeeded, total, "Generation run finished");
        Ok(RunReport { results, outcomes, succeeded, total })
    }

    async fn run_pair(
        &self,
        source: &SourceImage,
        pair: &PromptPair,
        observer: &mut dyn RunObserver,
    ) -> (PairOutcome, Option<GeneratedImage>) {
        let mut outcome = PairOutcome {
            category: pair.category,
            index: pair.index,
            state: PairState::Attempting,
            attempts: 0,
            backoffs: Vec::new(),
            last_error: None,
        };
        let mut retries_left = self.policy.max_attempts.max(1);
        let mut delay = self.policy.base_delay;

        while !outcome.state.is_terminal() {
            outcome.attempts += 1;
            match self.service.generate(source, pair.prompt, pair.category).await {
                Ok(variant) => {
                    outcome.state = PairState::Succeeded;
                    return (outcome, Some(GeneratedImage::new(pair.prompt, variant)));
                }
                Err(err) if (self.rate_limited)(&err) => {
                    retries_left -= 1;
                    outcome.last_error = Some(err.to_string());
                    if retries_left > 0 {
                        tracing::warn!(
                            category = %pair.category,
                            prompt = pair.prompt,
                            "Rate limit hit, retrying in {}s ({} retries left)",
                            delay.as_secs_f64(),
                            retries_left
                        );
                        observer.backoff(pair, delay, retries_left).await;
                        outcome.backoffs.push(delay);
                        tokio::time::sleep(delay).await;
                        delay = self.policy.next_delay(delay);
                    } else {
                        tracing::error!(
                            category = %pair.category,
                            prompt = pair.prompt,
                            "Failed to generate image after {} attempts due to rate limiting: {}",
                            outcome.attempts,
                            err
                        );
                        outcome.state = PairState::ExhaustedRetries;
                    }
                }
                Err(err) => {
                    tracing::error!(
                        category = %pair.category,
                        prompt = pair.prompt,
                        "Failed to generate image: {}",
                        err
                    );
                    outcome.last_error = Some(err.to_string());
                    outcome.state = PairState::FailedNonRetryable;
                }
            }
        }
        (outcome, None)
    }
}
