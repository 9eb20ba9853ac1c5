//! Publication stage: push exportable records to the downstream CRM.
//!
//! Per record: search by email, require an exact (case-insensitive) match
//! on the candidate's own email field, then partial-update or create. Only
//! non-reserved, non-null, non-empty dynamic fields are transmitted. A
//! record that fails is logged and left unmarked so the next run retries
//! it; it never aborts the batch.

pub mod client;

use crate::config::{ConfigError, PublishConfig};
use crate::db::types::{ContactRecord, DbError, FieldValue, QueryOrder};
use crate::db::ContactDb;
use crate::http::{HttpError, RetryPolicy};

use client::{CrmClient, CrmContact};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Counts for one publication run.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublishSummary {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Run one publication batch.
pub fn run_publication(db: &ContactDb, config: &PublishConfig) -> Result<PublishSummary, PublishError> {
    let order = QueryOrder::new(config.order_by.clone(), config.order_direction);
    let records =
        db.fetch_eligible_for_export(config.batch_size, &order, config.filter.as_deref())?;
    if records.is_empty() {
        log::info!("publish: nothing eligible");
        return Ok(PublishSummary::default());
    }
    log::info!("publish: {} eligible", records.len());

    let api_key = config.require_api_key()?;
    let client = CrmClient::new(
        &config.api_url,
        api_key,
        RetryPolicy::with_attempts(config.max_attempts),
    )?;

    let mut summary = PublishSummary::default();
    for record in &records {
        match publish_one(&client, record) {
            Ok(created) => {
                // Export bookkeeping only after the downstream write landed;
                // at-least-once with idempotent upserts.
                db.mark_exported(&record.email)?;
                if created {
                    summary.created += 1;
                } else {
                    summary.updated += 1;
                }
            }
            Err(e) => {
                log::warn!("publish: {} failed, will retry next run: {}", record.email, e);
                summary.failed += 1;
            }
        }
    }

    log::info!(
        "publish: {} created, {} updated, {} failed",
        summary.created,
        summary.updated,
        summary.failed
    );
    Ok(summary)
}

/// Publish a single record. Returns true when a new downstream contact was
/// created, false when an existing one was updated.
fn publish_one(client: &CrmClient, record: &ContactRecord) -> Result<bool, HttpError> {
    let attributes = outgoing_attributes(record);
    let candidates = client.search(&record.email)?;

    match find_exact_match(&candidates, &record.email) {
        Some(existing) => {
            client.update(&existing.id, &attributes)?;
            Ok(false)
        }
        None => {
            client.create(&record.email, &attributes)?;
            Ok(true)
        }
    }
}

/// Pick the candidate whose own email field equals the target exactly,
/// case-insensitively. Partial matches from the search endpoint are never
/// treated as "found".
fn find_exact_match<'a>(candidates: &'a [CrmContact], email: &str) -> Option<&'a CrmContact> {
    candidates.iter().find(|c| {
        c.email
            .as_deref()
            .map(|e| e.eq_ignore_ascii_case(email))
            .unwrap_or(false)
    })
}

/// Dynamic fields worth transmitting: non-null, and non-empty for text.
/// Reserved bookkeeping columns are already excluded from `record.fields`.
fn outgoing_attributes(record: &ContactRecord) -> serde_json::Map<String, serde_json::Value> {
    record
        .fields
        .iter()
        .filter(|(_, value)| match value {
            FieldValue::Null => false,
            FieldValue::Text(s) => !s.is_empty(),
            _ => true,
        })
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}
