//! HTTP client for the bulk email-verification provider.
//!
//! Job lifecycle over three endpoints: submit a batch, poll job status,
//! page through results. All calls go through the shared retry primitive;
//! the provider additionally wraps a `status` field in its payloads, and a
//! payload-level failure is a permanent error (no retry).

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::http::{send_with_retry, HttpError, RetryPolicy};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default, alias = "id")]
    job_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

/// One verification result item. Both fields are optional on the wire —
/// the orchestrator logs and skips incomplete items.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultItem {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "status")]
    pub result: Option<String>,
}

/// One page of job results.
#[derive(Debug, Deserialize)]
pub struct ResultsPage {
    #[serde(default)]
    pub items: Vec<ResultItem>,
    #[serde(default = "default_total_pages")]
    pub total_pages: u32,
}

fn default_total_pages() -> u32 {
    1
}

/// Remote job state as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Complete,
    Failed(String),
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct VerifierClient {
    http: Client,
    base_url: String,
    api_key: String,
    policy: RetryPolicy,
}

impl VerifierClient {
    pub fn new(base_url: &str, api_key: &str, policy: RetryPolicy) -> Result<Self, HttpError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            policy,
        })
    }

    /// Create a bulk verification job for the batch. The response must carry
    /// a job identifier; its absence is a protocol error for this run.
    pub fn submit(&self, emails: &[String]) -> Result<String, HttpError> {
        let request = self
            .http
            .post(format!("{}/v1/bulk", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "emails": emails }));

        let response = send_with_retry(request, &self.policy)?;
        let body: SubmitResponse = response
            .json()
            .map_err(|e| HttpError::Payload(format!("submit response: {}", e)))?;

        if matches!(body.status.as_deref(), Some("error") | Some("failed")) {
            return Err(HttpError::Payload(
                body.message.unwrap_or_else(|| "submit rejected".to_string()),
            ));
        }
        body.job_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| HttpError::Payload("submit response carried no job id".to_string()))
    }

    /// Query the job's state.
    pub fn status(&self, job_id: &str) -> Result<JobStatus, HttpError> {
        let request = self
            .http
            .get(format!("{}/v1/bulk/{}", self.base_url, job_id))
            .bearer_auth(&self.api_key);

        let response = send_with_retry(request, &self.policy)?;
        let body: StatusResponse = response
            .json()
            .map_err(|e| HttpError::Payload(format!("status response: {}", e)))?;
        Ok(parse_job_status(&body.status, body.reason))
    }

    /// Fetch one page of results (1-based). Pagination is driven by the
    /// `total_pages` field the provider includes in every page.
    pub fn results_page(&self, job_id: &str, page: u32) -> Result<ResultsPage, HttpError> {
        let request = self
            .http
            .get(format!("{}/v1/bulk/{}/results", self.base_url, job_id))
            .query(&[("page", page)])
            .bearer_auth(&self.api_key);

        let response = send_with_retry(request, &self.policy)?;
        response
            .json()
            .map_err(|e| HttpError::Payload(format!("results page {}: {}", page, e)))
    }
}

fn parse_job_status(status: &str, reason: Option<String>) -> JobStatus {
    match status.to_ascii_lowercase().as_str() {
        "complete" | "completed" | "finished" | "done" => JobStatus::Complete,
        "failed" | "error" | "cancelled" => {
            JobStatus::Failed(reason.unwrap_or_else(|| status.to_string()))
        }
        _ => JobStatus::Running,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_status_variants() {
        assert_eq!(parse_job_status("completed", None), JobStatus::Complete);
        assert_eq!(parse_job_status("COMPLETE", None), JobStatus::Complete);
        assert_eq!(
            parse_job_status("failed", Some("quota exceeded".to_string())),
            JobStatus::Failed("quota exceeded".to_string())
        );
        assert_eq!(
            parse_job_status("error", None),
            JobStatus::Failed("error".to_string())
        );
        assert_eq!(parse_job_status("running", None), JobStatus::Running);
        assert_eq!(parse_job_status("queued", None), JobStatus::Running);
    }

    #[test]
    fn test_submit_response_accepts_id_alias() {
        let body: SubmitResponse =
            serde_json::from_str(r#"{ "id": "job-7" }"#).unwrap();
        assert_eq!(body.job_id.as_deref(), Some("job-7"));

        let body: SubmitResponse =
            serde_json::from_str(r#"{ "job_id": "job-8", "status": "ok" }"#).unwrap();
        assert_eq!(body.job_id.as_deref(), Some("job-8"));
    }

    #[test]
    fn test_results_page_tolerates_partial_items() {
        let body: ResultsPage = serde_json::from_str(
            r#"{
                "items": [
                    { "email": "a@example.com", "result": "valid" },
                    { "email": "b@example.com" },
                    { "result": "invalid" }
                ],
                "total_pages": 3
            }"#,
        )
        .unwrap();
        assert_eq!(body.items.len(), 3);
        assert_eq!(body.total_pages, 3);
        assert!(body.items[1].result.is_none());
        assert!(body.items[2].email.is_none());
    }

    #[test]
    fn test_results_page_defaults_total_pages() {
        let body: ResultsPage = serde_json::from_str(r#"{ "items": [] }"#).unwrap();
        assert_eq!(body.total_pages, 1);
    }

    #[test]
    fn test_result_item_status_alias() {
        let item: ResultItem =
            serde_json::from_str(r#"{ "email": "a@b.com", "status": "catchall" }"#).unwrap();
        assert_eq!(item.result.as_deref(), Some("catchall"));
    }
}
