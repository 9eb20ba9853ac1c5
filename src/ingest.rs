//! Source ingestion: pull rows from upstream sources and feed them to the
//! store's merge-upsert.
//!
//! A source is anything that can declare its fields and produce rows keyed
//! by an `email` attribute. Declaration problems are configuration errors
//! and abort the stage; a source that fails while producing rows is logged
//! and skipped so the remaining sources still run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rusqlite::{Connection, OpenFlags};

use crate::config::SourceConfig;
use crate::db::types::{DbError, FieldDeclarations, FieldValue};
use crate::db::ContactDb;

/// One upstream row: field name → value, with a mandatory `email` entry.
pub type SourceRow = BTreeMap<String, FieldValue>;

/// Errors while a source produces rows. Isolated per source — they never
/// abort the ingest stage.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("source query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("source rows have no 'email' column")]
    MissingEmailColumn,
}

/// An upstream row producer.
pub trait Source {
    fn name(&self) -> &str;

    /// Non-email fields this source owns, with their semantic types.
    fn declared_fields(&self) -> &FieldDeclarations;

    /// Produce the current batch of rows.
    fn rows(&self) -> Result<Vec<SourceRow>, IngestError>;
}

// ---------------------------------------------------------------------------
// SQLite source
// ---------------------------------------------------------------------------

/// A source backed by an arbitrary SQL query against an external SQLite
/// file. The query must project an `email` column; every other projected
/// column that appears in the declaration is ingested.
pub struct SqliteSource {
    name: String,
    path: PathBuf,
    query: String,
    fields: FieldDeclarations,
}

impl SqliteSource {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            name: config.name.clone(),
            path: config.path.clone(),
            query: config.query.clone(),
            fields: config.fields.clone(),
        }
    }
}

impl Source for SqliteSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn declared_fields(&self) -> &FieldDeclarations {
        &self.fields
    }

    fn rows(&self) -> Result<Vec<SourceRow>, IngestError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let mut stmt = conn.prepare(&self.query)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        if !columns.iter().any(|c| c == "email") {
            return Err(IngestError::MissingEmailColumn);
        }

        let rows = stmt
            .query_map([], |row| {
                let mut out = SourceRow::new();
                for (idx, col) in columns.iter().enumerate() {
                    out.insert(col.clone(), FieldValue::from(row.get_ref(idx)?));
                }
                Ok(out)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Stage runner
// ---------------------------------------------------------------------------

/// Totals for one ingest run.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestSummary {
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Run one ingest batch over every configured source.
///
/// `ensure_fields` failures (reserved/malformed names, bad types) are
/// configuration errors and abort the whole stage before anything is merged
/// for that source. Row-production and merge failures are isolated: logged,
/// the source is skipped, and the remaining sources still run.
pub fn run_ingestion(db: &ContactDb, sources: &[Box<dyn Source>]) -> Result<IngestSummary, DbError> {
    let mut summary = IngestSummary::default();

    for source in sources {
        db.ensure_fields(source.declared_fields())?;

        let rows = match source.rows() {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("source '{}' skipped: {}", source.name(), e);
                summary.sources_failed += 1;
                continue;
            }
        };

        match db.merge(&rows, source.declared_fields()) {
            Ok(outcome) => {
                log::info!(
                    "source '{}': {} rows ({} new, {} updated, {} unchanged)",
                    source.name(),
                    rows.len(),
                    outcome.inserted,
                    outcome.updated,
                    outcome.unchanged
                );
                summary.sources_ok += 1;
                summary.inserted += outcome.inserted;
                summary.updated += outcome.updated;
                summary.unchanged += outcome.unchanged;
            }
            Err(e) => {
                // The batch rolled back; the source's data is malformed
                // (e.g. a row without an email), not a store problem.
                log::warn!("source '{}' merge failed, skipped: {}", source.name(), e);
                summary.sources_failed += 1;
            }
        }
    }

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
