//! contactflow — incremental contact reconciliation.
//!
//! One authoritative record per email, built from multiple upstream
//! sources, enriched with a bulk verification result, and selectively
//! published to a downstream CRM. Three independently triggerable,
//! idempotent stages share the SQLite store as the single source of truth:
//!
//! - `import`: merge source rows, advancing `last_import` only on real
//!   change
//! - `verify`: classify locally when possible, otherwise run one remote
//!   bulk job (submit → poll → paginate)
//! - `export`: upsert verified records downstream, at-least-once

pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod ingest;
pub mod lock;
pub mod publish;
pub mod verify;
