//! Verification stage: resolve every pending email to a verification status.
//!
//! Local classification runs first and costs nothing; only the remainder is
//! submitted as one remote bulk job (submit → poll → collect pages). Every
//! submitted email resolves — results the provider never returned come back
//! as `unknown` rather than staying queued forever. Each `mark_verified` is
//! its own atomic statement, so a mid-batch crash leaves completed marks
//! committed and only the rest queued for the next run.

pub mod client;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::classify::classify_local;
use crate::config::{ConfigError, VerifyConfig};
use crate::db::types::{DbError, QueryOrder, STATUS_UNKNOWN};
use crate::db::ContactDb;
use crate::http::{HttpError, RetryPolicy};

use client::{JobStatus, VerifierClient};

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("verification job failed: {0}")]
    JobFailed(String),

    #[error("verification job did not complete within {0}s")]
    Timeout(u64),
}

/// Counts for one verification run.
#[derive(Debug, Default, Clone, Copy)]
pub struct VerifySummary {
    pub resolved_locally: usize,
    pub resolved_remotely: usize,
    pub resolved_unknown: usize,
}

/// Run one verification batch.
pub fn run_verification(db: &ContactDb, config: &VerifyConfig) -> Result<VerifySummary, VerifyError> {
    let order = QueryOrder::new(config.order_by.clone(), config.order_direction);
    let pending = db.fetch_pending(config.batch_size, &order, config.filter.as_deref())?;
    if pending.is_empty() {
        log::info!("verify: nothing pending");
        return Ok(VerifySummary::default());
    }
    log::info!("verify: {} pending", pending.len());

    let mut summary = VerifySummary::default();

    // Local classification first — free, and it shrinks the remote batch.
    let mut remote: Vec<String> = Vec::new();
    for email in pending {
        match classify_local(&email) {
            Some(status) => {
                db.mark_verified(&email, status)?;
                summary.resolved_locally += 1;
            }
            None => remote.push(email),
        }
    }
    if remote.is_empty() {
        log::info!("verify: batch fully resolved locally");
        return Ok(summary);
    }

    // Credentials are checked only once we know a remote call is needed.
    let api_key = config.require_api_key()?;
    let client = VerifierClient::new(
        &config.api_url,
        api_key,
        RetryPolicy::with_attempts(config.max_attempts),
    )?;

    let job_id = client.submit(&remote)?;
    log::info!("verify: submitted job {} ({} emails)", job_id, remote.len());

    wait_for_completion(
        &client,
        &job_id,
        Duration::from_secs(config.poll_interval_secs),
        Duration::from_secs(config.timeout_secs),
    )?;

    let results = collect_results(&client, &job_id)?;
    log::info!("verify: collected {} results for job {}", results.len(), job_id);

    for (email, status) in resolve_statuses(&remote, &results) {
        db.mark_verified(&email, &status)?;
        if status == STATUS_UNKNOWN && !results.contains_key(&email) {
            summary.resolved_unknown += 1;
        } else {
            summary.resolved_remotely += 1;
        }
    }

    Ok(summary)
}

/// Poll the job until it completes, fails, or the wall-clock deadline
/// passes. The job may still be running remotely after a timeout; only the
/// local batch fails.
fn wait_for_completion(
    client: &VerifierClient,
    job_id: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<(), VerifyError> {
    let deadline = Instant::now() + timeout;
    loop {
        match client.status(job_id)? {
            JobStatus::Complete => return Ok(()),
            JobStatus::Failed(reason) => return Err(VerifyError::JobFailed(reason)),
            JobStatus::Running => {
                if Instant::now() >= deadline {
                    return Err(VerifyError::Timeout(timeout.as_secs()));
                }
                std::thread::sleep(poll_interval);
            }
        }
    }
}

/// Page through the job's results and build the email → status map.
/// Items missing either field are logged and skipped, never fatal.
fn collect_results(
    client: &VerifierClient,
    job_id: &str,
) -> Result<HashMap<String, String>, VerifyError> {
    let mut results = HashMap::new();
    let mut page = 1u32;
    loop {
        let batch = client.results_page(job_id, page)?;
        for item in batch.items {
            match (item.email, item.result) {
                (Some(email), Some(result)) => {
                    results.insert(email.trim().to_lowercase(), result);
                }
                (email, result) => {
                    log::warn!(
                        "verify: skipping malformed result item (email={:?}, result={:?})",
                        email,
                        result
                    );
                }
            }
        }
        if page >= batch.total_pages {
            break;
        }
        page += 1;
    }
    Ok(results)
}

/// Resolve every submitted email: a map hit keeps the provider's status, a
/// miss becomes the `unknown` sentinel rather than staying unresolved.
fn resolve_statuses(
    submitted: &[String],
    results: &HashMap<String, String>,
) -> Vec<(String, String)> {
    submitted
        .iter()
        .map(|email| {
            let status = results
                .get(email)
                .cloned()
                .unwrap_or_else(|| STATUS_UNKNOWN.to_string());
            (email.clone(), status)
        })
        .collect()
}
