//! Top-level error umbrella for the pipeline binary.
//!
//! Each module carries its own `thiserror` enum; this one exists so `main`
//! can propagate any stage failure with `?` and report it uniformly. The
//! taxonomy: configuration errors abort a stage before any remote call,
//! transient remote errors are retried inside the HTTP primitive, permanent
//! remote errors and retry exhaustion are fatal for the invocation, and
//! per-source / per-record failures are isolated inside their stage runners
//! and never reach this type.

use crate::config::ConfigError;
use crate::db::types::DbError;
use crate::http::HttpError;
use crate::lock::LockError;
use crate::publish::PublishError;
use crate::verify::VerifyError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Db(#[from] DbError),

    #[error("remote call failed: {0}")]
    Http(#[from] HttpError),

    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("publication failed: {0}")]
    Publish(#[from] PublishError),

    #[error("{0}")]
    Lock(#[from] LockError),
}
