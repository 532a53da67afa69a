//! Rewrite-service client with exponential backoff retry logic.
//!
//! Articles are rewritten by an OpenAI-compatible text-generation service
//! reached through `awful_aj`. The module is built from small pieces:
//!
//! - [`AskAsync`]: send a prompt, receive a completion
//! - [`AskFnWrapper`]: adapts `awful_aj::api::ask` to [`AskAsync`]
//! - [`RetryAsk`]: decorator that adds retries to any [`AskAsync`]
//!
//! # Retry Strategy
//!
//! Only transient service failures are retried: timeouts, connection resets,
//! rate limits and 5xx responses. A rejected key, a malformed request or an
//! unknown model fails the same way on every attempt, so [`is_transient`]
//! returns the error at once and the article is left unrewritten.
//!
//! Transient failures get up to 5 retries with exponential backoff from 1
//! second, capped at 30 seconds, plus 0-250ms of jitter.

use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Async access to a text-generation backend.
pub trait AskAsync {
    /// The type of response returned by the backend.
    type Response;

    /// Send a prompt and wait for the completion.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Markers of rewrite-service failures that no retry can fix.
const PERMANENT_MARKERS: &[&str] = &[
    "400 bad request",
    "401 unauthorized",
    "403 forbidden",
    "404 not found",
    "422 unprocessable",
    "invalid_api_key",
    "invalid_request_error",
    "context_length_exceeded",
    "model_not_found",
];

/// Whether a failed rewrite request is worth sending again.
///
/// Errors from `awful_aj` only carry their status and code in the message,
/// so classification is by message text.
pub fn is_transient(error: &dyn Error) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    !PERMANENT_MARKERS.iter().any(|marker| message.contains(marker))
}

/// Adds exponential backoff retries to any [`AskAsync`] implementation.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    inner: T,
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    max_delay: StdDuration,
    retry_if: fn(&dyn Error) -> bool,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Wrap `inner`, retrying at most `max_retries` times after the first attempt.
    ///
    /// ```ignore
    /// let client = AskFnWrapper { config, template };
    /// let retry_client = RetryAsk::new(client, 5, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
            retry_if: is_transient,
        }
    }

    /// Replace the [`is_transient`] classification.
    pub fn with_retry_if(mut self, retry_if: fn(&dyn Error) -> bool) -> Self {
        self.retry_if = retry_if;
        self
    }

    /// Backoff before retry number `attempt` (1-based), without jitter.
    fn backoff(&self, attempt: usize) -> StdDuration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay
            .saturating_mul(2u32.pow(exponent))
            .min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            let e = match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };
            attempt += 1;

            if !(self.retry_if)(&*e) {
                error!(
                    attempt,
                    elapsed_ms_attempt = attempt_t0.elapsed().as_millis(),
                    error = %e,
                    "Rewrite request rejected; not retrying"
                );
                return Err(e);
            }
            if attempt > self.max_retries {
                error!(
                    attempt,
                    max = self.max_retries,
                    elapsed_ms_total = total_t0.elapsed().as_millis(),
                    error = %e,
                    "Rewrite request exhausted retries"
                );
                return Err(e);
            }

            let jitter = StdDuration::from_millis(rng().random_range(0..=250));
            let delay = self.backoff(attempt) + jitter;
            warn!(
                attempt,
                max = self.max_retries,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis(),
                ?delay,
                error = %e,
                "Rewrite request failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

/// [`AskAsync`] over `awful_aj::api::ask`.
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    /// Endpoint, API key and model settings.
    pub config: &'a AwfulJadeConfig,
    /// System prompt and conversation framing for the rewrite.
    pub template: &'a ChatTemplate,
}

impl AskAsync for AskFnWrapper<'_> {
    type Response = String;

    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;

        if let Err(e) = &res {
            warn!(elapsed_ms = t0.elapsed().as_millis(), error = %e, "API call failed");
        }
        res
    }
}

/// The production client: `awful_aj` behind 5 retries with 1s, 2s, 4s, 8s,
/// 16s backoff.
pub fn rewrite_client<'a>(
    config: &'a AwfulJadeConfig,
    template: &'a ChatTemplate,
) -> RetryAsk<AskFnWrapper<'a>> {
    RetryAsk::new(AskFnWrapper { config, template }, 5, StdDuration::from_secs(1))
}
