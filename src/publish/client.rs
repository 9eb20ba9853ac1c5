//! HTTP client for the downstream CRM's contact endpoints.
//!
//! Three operations: search by email, create, and partial update. The
//! update sends only the attributes present in the payload; the provider is
//! expected not to clear omitted fields (see DESIGN.md — this is the one
//! contract we depend on but cannot enforce from here).

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::http::{send_with_retry, HttpError, RetryPolicy};

/// A contact as the CRM returns it. The search endpoint may return partial
/// matches; the orchestrator filters on the `email` field before treating a
/// candidate as "found".
#[derive(Debug, Clone, Deserialize)]
pub struct CrmContact {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    contacts: Vec<CrmContact>,
}

pub struct CrmClient {
    http: Client,
    base_url: String,
    api_key: String,
    policy: RetryPolicy,
}

impl CrmClient {
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

    /// Search for contacts by email. May return partial matches.
    pub fn search(&self, email: &str) -> Result<Vec<CrmContact>, HttpError> {
        let request = self
            .http
            .get(format!("{}/v1/contacts", self.base_url))
            .query(&[("email", email)])
            .bearer_auth(&self.api_key);

        let response = send_with_retry(request, &self.policy)?;
        let body: SearchResponse = response
            .json()
            .map_err(|e| HttpError::Payload(format!("search response: {}", e)))?;
        Ok(body.contacts)
    }

    /// Create a new downstream contact.
    pub fn create(
        &self,
        email: &str,
        attributes: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<CrmContact, HttpError> {
        let request = self
            .http
            .post(format!("{}/v1/contacts", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "email": email,
                "attributes": attributes,
            }));

        let response = send_with_retry(request, &self.policy)?;
        response
            .json()
            .map_err(|e| HttpError::Payload(format!("create response: {}", e)))
    }

    /// Partial update: sets only the attributes present in the payload.
    pub fn update(
        &self,
        contact_id: &str,
        attributes: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), HttpError> {
        let request = self
            .http
            .patch(format!("{}/v1/contacts/{}", self.base_url, contact_id))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "attributes": attributes }));

        send_with_retry(request, &self.policy)?;
        Ok(())
    }
}
