//! Shared HTTP retry primitive used by both remote orchestrators.
//!
//! Transport failures, 5xx, and rate-limiting retry with exponential
//! backoff up to a per-provider attempt ceiling; any other non-success is
//! permanent and aborts immediately. Backoff sleeps block synchronously —
//! the pipeline is bounded-latency batch work, not a reactive service.

use std::time::Duration;

use reqwest::blocking::{RequestBuilder, Response};
use reqwest::StatusCode;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Retry configuration. Each provider client constructs its own with a
/// distinct attempt ceiling.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay for the first retry; doubles per attempt (`base * 2^attempt`).
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

/// Backoff before retry number `attempt` (0-based): `base * 2^attempt`.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt))
}

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("provider reported failure in payload: {0}")]
    Payload(String),

    #[error("retries exhausted after {attempts} attempts (last error: {last})")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Outcome of a single attempt inside `run_with_retry`.
pub enum Attempt<T> {
    Success(T),
    /// Retry after backoff. Carries a description of the failure so the
    /// exhaustion error can name the last observed condition.
    Transient(String),
    /// Abort immediately, no retry.
    Permanent(HttpError),
}

/// Drive an operation through the retry discipline. The operation receives
/// the 0-based attempt number; transient outcomes sleep the exponential
/// backoff between attempts.
pub fn run_with_retry<T>(
    policy: &RetryPolicy,
    mut op: impl FnMut(u32) -> Attempt<T>,
) -> Result<T, HttpError> {
    let attempts = policy.max_attempts.max(1);
    let mut last = String::new();

    for attempt in 0..attempts {
        match op(attempt) {
            Attempt::Success(value) => return Ok(value),
            Attempt::Permanent(err) => return Err(err),
            Attempt::Transient(desc) => {
                last = desc;
                if attempt + 1 < attempts {
                    let delay = backoff_delay(policy, attempt);
                    log::warn!(
                        "retry {}/{} after transient error: {} (sleep {:?})",
                        attempt + 1,
                        attempts,
                        last,
                        delay
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }

    Err(HttpError::RetriesExhausted { attempts, last })
}

// ---------------------------------------------------------------------------
// HTTP binding
// ---------------------------------------------------------------------------

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Send a request through the retry discipline and return the first
/// success-range response. Payload-level status fields are the caller's
/// concern: a transport success whose body signals failure is a permanent
/// error at the client layer, not a retry here.
pub fn send_with_retry(
    request: RequestBuilder,
    policy: &RetryPolicy,
) -> Result<Response, HttpError> {
    // Bodies built via .json() are cloneable; a non-cloneable request gets
    // exactly one attempt.
    if request.try_clone().is_none() {
        return match request.send() {
            Ok(resp) => check_status(resp),
            Err(err) => Err(HttpError::Transport(err.to_string())),
        };
    }

    run_with_retry(policy, |_attempt| {
        let cloned = match request.try_clone() {
            Some(c) => c,
            None => return Attempt::Permanent(HttpError::Transport("unclonable request".into())),
        };
        match cloned.send() {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    Attempt::Success(resp)
                } else if is_transient_status(status) {
                    Attempt::Transient(format!("HTTP {}", status.as_u16()))
                } else {
                    Attempt::Permanent(HttpError::Status {
                        code: status.as_u16(),
                        message: resp.text().unwrap_or_default(),
                    })
                }
            }
            Err(err) => {
                if err.is_timeout() || err.is_connect() {
                    Attempt::Transient(err.to_string())
                } else {
                    Attempt::Permanent(HttpError::Transport(err.to_string()))
                }
            }
        }
    })
}

fn check_status(resp: Response) -> Result<Response, HttpError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(HttpError::Status {
            code: status.as_u16(),
            message: resp.text().unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
