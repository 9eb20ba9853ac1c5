//! SQLite-backed contact store: the single source of truth shared by the
//! import, verify, and export stages.
//!
//! One row per normalized email in the `contacts` table. The five
//! bookkeeping columns are fixed; every other column is declared by a source
//! at ingest time and added via additive `ALTER TABLE` migration
//! (`ensure_fields`). WAL mode keeps the `stats` command safe to run while a
//! stage holds the write connection.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection};

pub mod types;
pub use types::*;

use crate::ingest::SourceRow;

/// Current time as fixed-width RFC 3339 UTC. Fixed subsecond precision keeps
/// string comparison chronological, which `last_import > last_export` relies on.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub struct ContactDb {
    conn: Connection,
}

impl ContactDb {
    /// Open (or create) the store at `path` and apply the baseline schema.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store. Used by tests.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        // WAL so read-only aggregate queries never block a writing stage.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS contacts (
                email TEXT PRIMARY KEY,
                last_import TEXT,
                last_verify TEXT,
                verify_status TEXT,
                last_export TEXT
            );",
        )?;
        Ok(Self { conn })
    }

    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Schema evolution
    // -----------------------------------------------------------------------

    /// Add any declared field not already present as a nullable typed column.
    /// Idempotent; rejects reserved and malformed names before touching the
    /// schema (configuration errors).
    pub fn ensure_fields(&self, declared: &FieldDeclarations) -> Result<(), DbError> {
        for name in declared.keys() {
            validate_field_name(name)?;
        }

        let existing = self.column_names()?;
        for (name, ty) in declared {
            if existing.contains(name.as_str()) {
                continue;
            }
            self.conn.execute_batch(&format!(
                "ALTER TABLE contacts ADD COLUMN \"{}\" {}",
                name,
                ty.sql_type()
            ))?;
            log::info!("schema: added column {} {}", name, ty.sql_type());
        }
        Ok(())
    }

    fn column_names(&self) -> Result<HashSet<String>, DbError> {
        let mut stmt = self.conn.prepare("PRAGMA table_info(contacts)")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(names)
    }

    // -----------------------------------------------------------------------
    // Merge-upsert
    // -----------------------------------------------------------------------

    /// Merge a batch of source rows, one atomic transaction for the whole
    /// batch. Only the declared fields are touched; columns owned by other
    /// sources are preserved. `last_import` advances iff at least one
    /// declared value actually differs from what is stored (NULL-aware).
    pub fn merge(
        &self,
        rows: &[SourceRow],
        declared: &FieldDeclarations,
    ) -> Result<MergeOutcome, DbError> {
        for name in declared.keys() {
            validate_field_name(name)?;
        }
        let fields: Vec<&String> = declared.keys().collect();

        // email = ?1, last_import = ?2, declared values = ?3..
        let insert_sql = {
            let cols: Vec<String> = fields.iter().map(|f| format!("\"{}\"", f)).collect();
            let binds: Vec<String> = (0..fields.len()).map(|i| format!("?{}", i + 3)).collect();
            format!(
                "INSERT INTO contacts (email, last_import{}{}) VALUES (?1, ?2{}{})",
                if cols.is_empty() { "" } else { ", " },
                cols.join(", "),
                if binds.is_empty() { "" } else { ", " },
                binds.join(", ")
            )
        };
        // `IS NOT` compares NULL-aware: NULL vs NULL is equal, NULL vs value
        // differs. This is what decides whether last_import advances.
        let differs_sql = if fields.is_empty() {
            None
        } else {
            let clauses: Vec<String> = fields
                .iter()
                .enumerate()
                .map(|(i, f)| format!("\"{}\" IS NOT ?{}", f, i + 3))
                .collect();
            Some(format!(
                "SELECT EXISTS(SELECT 1 FROM contacts WHERE email = ?1 AND ({}))",
                clauses.join(" OR ")
            ))
        };
        let update_sql = if fields.is_empty() {
            None
        } else {
            let sets: Vec<String> = fields
                .iter()
                .enumerate()
                .map(|(i, f)| format!("\"{}\" = ?{}", f, i + 3))
                .collect();
            Some(format!(
                "UPDATE contacts SET {}, last_import = ?2 WHERE email = ?1",
                sets.join(", ")
            ))
        };

        self.with_transaction(|db| {
            let mut outcome = MergeOutcome::default();
            let now = now_rfc3339();

            for row in rows {
                let email = normalize_email(row.get("email")).ok_or(DbError::MissingEmail)?;

                // Bind order: email, now, then declared values (coerced).
                let mut binds: Vec<FieldValue> =
                    vec![FieldValue::Text(email.clone()), FieldValue::Text(now.clone())];
                for (name, ty) in declared {
                    let value = row.get(name).cloned().unwrap_or(FieldValue::Null);
                    binds.push(value.coerce(name, *ty)?);
                }

                let exists: bool = db.conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM contacts WHERE email = ?1)",
                    params![email],
                    |r| r.get(0),
                )?;

                if !exists {
                    db.conn
                        .execute(&insert_sql, params_from_iter(binds.iter()))?;
                    outcome.inserted += 1;
                    continue;
                }

                let differs = match &differs_sql {
                    None => false,
                    Some(sql) => {
                        db.conn
                            .query_row(sql, params_from_iter(binds.iter()), |r| r.get(0))?
                    }
                };

                // differs-check and update run inside the same transaction,
                // so skipping the write when nothing changed is byte-exact.
                match (&update_sql, differs) {
                    (Some(sql), true) => {
                        db.conn.execute(sql, params_from_iter(binds.iter()))?;
                        outcome.updated += 1;
                    }
                    _ => outcome.unchanged += 1,
                }
            }

            Ok(outcome)
        })
    }

    // -----------------------------------------------------------------------
    // Queue derivation
    // -----------------------------------------------------------------------

    /// Emails awaiting verification: `verify_status` unset, optionally
    /// narrowed by the configured filter fragment, ordered and capped.
    pub fn fetch_pending(
        &self,
        limit: u32,
        order: &QueryOrder,
        extra_filter: Option<&str>,
    ) -> Result<Vec<String>, DbError> {
        let sql = build_queue_sql("SELECT email FROM contacts", PENDING_WHERE, order, extra_filter)?;
        let mut stmt = self.conn.prepare(&sql)?;
        let emails = stmt
            .query_map(params![limit], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(emails)
    }

    /// Full rows eligible for publication: verified valid, and either never
    /// exported or re-imported with changes since the last export.
    pub fn fetch_eligible_for_export(
        &self,
        limit: u32,
        order: &QueryOrder,
        extra_filter: Option<&str>,
    ) -> Result<Vec<ContactRecord>, DbError> {
        let sql = build_queue_sql("SELECT * FROM contacts", ELIGIBLE_WHERE, order, extra_filter)?;
        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let records = stmt
            .query_map(params![limit], |row| {
                let mut record = ContactRecord {
                    email: String::new(),
                    last_import: None,
                    last_verify: None,
                    verify_status: None,
                    last_export: None,
                    fields: BTreeMap::new(),
                };
                for (idx, col) in columns.iter().enumerate() {
                    match col.as_str() {
                        "email" => record.email = row.get(idx)?,
                        "last_import" => record.last_import = row.get(idx)?,
                        "last_verify" => record.last_verify = row.get(idx)?,
                        "verify_status" => record.verify_status = row.get(idx)?,
                        "last_export" => record.last_export = row.get(idx)?,
                        _ => {
                            let value = FieldValue::from(row.get_ref(idx)?);
                            record.fields.insert(col.clone(), value);
                        }
                    }
                }
                Ok(record)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // -----------------------------------------------------------------------
    // Status mutators
    // -----------------------------------------------------------------------

    /// Record a verification result. Independently atomic; a zero-row update
    /// (unknown email) is a logged no-op, not an error.
    pub fn mark_verified(&self, email: &str, status: &str) -> Result<(), DbError> {
        let changed = self.conn.execute(
            "UPDATE contacts SET verify_status = ?2, last_verify = ?3 WHERE email = ?1",
            params![email, status, now_rfc3339()],
        )?;
        if changed == 0 {
            log::debug!("mark_verified: no record for {}", email);
        }
        Ok(())
    }

    /// Record a successful publication. Same zero-row semantics as
    /// `mark_verified`.
    pub fn mark_exported(&self, email: &str) -> Result<(), DbError> {
        let changed = self.conn.execute(
            "UPDATE contacts SET last_export = ?2 WHERE email = ?1",
            params![email, now_rfc3339()],
        )?;
        if changed == 0 {
            log::debug!("mark_exported: no record for {}", email);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Aggregates
    // -----------------------------------------------------------------------

    /// Store counters. Pure read; safe to run concurrently with a writing
    /// stage thanks to WAL.
    pub fn statistics(&self) -> Result<StoreStatistics, DbError> {
        let single = |sql: &str| -> Result<i64, DbError> {
            Ok(self.conn.query_row(sql, [], |r| r.get(0))?)
        };

        let mut stats = StoreStatistics {
            total: single("SELECT COUNT(*) FROM contacts")?,
            pending_verification: single(&format!(
                "SELECT COUNT(*) FROM contacts WHERE {}",
                PENDING_WHERE
            ))?,
            exported: single("SELECT COUNT(*) FROM contacts WHERE last_export IS NOT NULL")?,
            eligible_for_export: single(&format!(
                "SELECT COUNT(*) FROM contacts WHERE {}",
                ELIGIBLE_WHERE
            ))?,
            by_status: BTreeMap::new(),
        };

        let mut stmt = self.conn.prepare(
            "SELECT verify_status, COUNT(*) FROM contacts
             WHERE verify_status IS NOT NULL GROUP BY verify_status",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            stats.by_status.insert(status, count);
        }

        Ok(stats)
    }
}

/// Verification-queue predicate.
const PENDING_WHERE: &str = "verify_status IS NULL";

/// Publication-eligibility predicate. Timestamps are fixed-width RFC 3339,
/// so the string comparison is chronological.
const ELIGIBLE_WHERE: &str = "verify_status = 'valid' \
     AND (last_export IS NULL OR last_import > last_export)";

/// Lowercase and trim an email value; `None` when absent or empty.
fn normalize_email(value: Option<&FieldValue>) -> Option<String> {
    match value {
        Some(FieldValue::Text(s)) => {
            let normalized = s.trim().to_lowercase();
            if normalized.is_empty() {
                None
            } else {
                Some(normalized)
            }
        }
        _ => None,
    }
}

fn validate_field_name(name: &str) -> Result<(), DbError> {
    if RESERVED_FIELDS.contains(&name) {
        return Err(DbError::ReservedField(name.to_string()));
    }
    if !is_valid_identifier(name) {
        return Err(DbError::InvalidFieldName(name.to_string()));
    }
    Ok(())
}

/// Assemble a queue-derivation query. The order field is validated against
/// the identifier pattern and the direction is a closed enum — the only
/// defense needed, since both come from deployment configuration.
/// `extra_filter` is a raw boolean SQL fragment trusted for the same reason:
/// it originates from the operator's config file, never from request input.
fn build_queue_sql(
    select: &str,
    base_where: &str,
    order: &QueryOrder,
    extra_filter: Option<&str>,
) -> Result<String, DbError> {
    if !is_valid_identifier(&order.field) {
        return Err(DbError::InvalidOrderField(order.field.clone()));
    }
    let mut sql = format!("{} WHERE {}", select, base_where);
    if let Some(filter) = extra_filter {
        if !filter.trim().is_empty() {
            sql.push_str(&format!(" AND ({})", filter));
        }
    }
    sql.push_str(&format!(
        " ORDER BY \"{}\" {} LIMIT ?1",
        order.field,
        order.direction.as_sql()
    ));
    Ok(sql)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::SourceRow;

    fn decl(fields: &[(&str, FieldType)]) -> FieldDeclarations {
        fields
            .iter()
            .map(|(n, t)| (n.to_string(), *t))
            .collect()
    }

    fn row(pairs: &[(&str, FieldValue)]) -> SourceRow {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.clone()))
            .collect()
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn mem_db_with_fields(fields: &[(&str, FieldType)]) -> (ContactDb, FieldDeclarations) {
        let db = ContactDb::open_in_memory().expect("in-memory db");
        let declared = decl(fields);
        db.ensure_fields(&declared).expect("ensure_fields");
        (db, declared)
    }

    fn last_import(db: &ContactDb, email: &str) -> Option<String> {
        db.conn_ref()
            .query_row(
                "SELECT last_import FROM contacts WHERE email = ?1",
                params![email],
                |r| r.get(0),
            )
            .expect("last_import query")
    }

    fn order() -> QueryOrder {
        QueryOrder::new("last_import", OrderDirection::Ascending)
    }

    #[test]
    fn test_ensure_fields_idempotent() {
        let db = ContactDb::open_in_memory().unwrap();
        let declared = decl(&[("company", FieldType::Text)]);
        db.ensure_fields(&declared).unwrap();
        db.ensure_fields(&declared).unwrap();

        let count: i64 = db
            .conn_ref()
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('contacts') WHERE name = 'company'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "exactly one added column after double call");
    }

    #[test]
    fn test_ensure_fields_rejects_reserved() {
        let db = ContactDb::open_in_memory().unwrap();
        let declared = decl(&[("verify_status", FieldType::Text)]);
        assert!(matches!(
            db.ensure_fields(&declared),
            Err(DbError::ReservedField(_))
        ));
    }

    #[test]
    fn test_ensure_fields_rejects_malformed() {
        let db = ContactDb::open_in_memory().unwrap();
        let declared = decl(&[("bad name;", FieldType::Text)]);
        assert!(matches!(
            db.ensure_fields(&declared),
            Err(DbError::InvalidFieldName(_))
        ));
    }

    #[test]
    fn test_merge_inserts_new_record() {
        let (db, declared) = mem_db_with_fields(&[("company", FieldType::Text)]);
        let outcome = db
            .merge(
                &[row(&[("email", text("a@example.com")), ("company", text("Acme"))])],
                &declared,
            )
            .unwrap();
        assert_eq!(outcome.inserted, 1);
        assert!(last_import(&db, "a@example.com").is_some());
    }

    #[test]
    fn test_merge_identical_reingest_keeps_last_import() {
        let (db, declared) = mem_db_with_fields(&[("company", FieldType::Text)]);
        let rows = [row(&[("email", text("a@example.com")), ("company", text("Acme"))])];
        db.merge(&rows, &declared).unwrap();
        let first = last_import(&db, "a@example.com");

        let outcome = db.merge(&rows, &declared).unwrap();
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(last_import(&db, "a@example.com"), first);
    }

    #[test]
    fn test_merge_changed_field_advances_last_import() {
        let (db, declared) = mem_db_with_fields(&[("company", FieldType::Text)]);
        db.merge(
            &[row(&[("email", text("a@example.com")), ("company", text("Acme"))])],
            &declared,
        )
        .unwrap();
        let first = last_import(&db, "a@example.com");

        // Timestamps have microsecond resolution; make sure the clock moves.
        std::thread::sleep(std::time::Duration::from_millis(2));
        let outcome = db
            .merge(
                &[row(&[("email", text("a@example.com")), ("company", text("Initech"))])],
                &declared,
            )
            .unwrap();
        assert_eq!(outcome.updated, 1);
        let second = last_import(&db, "a@example.com");
        assert!(second > first, "last_import must strictly advance");
    }

    #[test]
    fn test_merge_null_value_transition_counts_as_change() {
        let (db, declared) = mem_db_with_fields(&[("company", FieldType::Text)]);
        db.merge(
            &[row(&[("email", text("a@example.com")), ("company", FieldValue::Null)])],
            &declared,
        )
        .unwrap();

        // NULL → value is a change
        let outcome = db
            .merge(
                &[row(&[("email", text("a@example.com")), ("company", text("Acme"))])],
                &declared,
            )
            .unwrap();
        assert_eq!(outcome.updated, 1);

        // value → NULL is a change too
        let outcome = db
            .merge(
                &[row(&[("email", text("a@example.com")), ("company", FieldValue::Null)])],
                &declared,
            )
            .unwrap();
        assert_eq!(outcome.updated, 1);

        // NULL → NULL is not
        let outcome = db
            .merge(
                &[row(&[("email", text("a@example.com")), ("company", FieldValue::Null)])],
                &declared,
            )
            .unwrap();
        assert_eq!(outcome.unchanged, 1);
    }

    #[test]
    fn test_merge_case_variant_email_deduplicates() {
        let (db, declared) = mem_db_with_fields(&[("company", FieldType::Text)]);
        db.merge(
            &[row(&[("email", text("User@Example.com")), ("company", text("Acme"))])],
            &declared,
        )
        .unwrap();
        db.merge(
            &[row(&[("email", text("user@example.com")), ("company", text("Acme"))])],
            &declared,
        )
        .unwrap();

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM contacts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1, "case variants must merge into one record");
    }

    #[test]
    fn test_merge_preserves_other_sources_fields() {
        let db = ContactDb::open_in_memory().unwrap();
        let crm_fields = decl(&[("company", FieldType::Text)]);
        let billing_fields = decl(&[("balance", FieldType::Real)]);
        db.ensure_fields(&crm_fields).unwrap();
        db.ensure_fields(&billing_fields).unwrap();

        db.merge(
            &[row(&[("email", text("a@example.com")), ("company", text("Acme"))])],
            &crm_fields,
        )
        .unwrap();
        db.merge(
            &[row(&[("email", text("a@example.com")), ("balance", FieldValue::Real(12.5))])],
            &billing_fields,
        )
        .unwrap();

        let company: Option<String> = db
            .conn_ref()
            .query_row(
                "SELECT company FROM contacts WHERE email = 'a@example.com'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(company.as_deref(), Some("Acme"), "additive merge must not clear");
    }

    #[test]
    fn test_merge_missing_email_fails_batch_atomically() {
        let (db, declared) = mem_db_with_fields(&[("company", FieldType::Text)]);
        let rows = [
            row(&[("email", text("ok@example.com")), ("company", text("Acme"))]),
            row(&[("company", text("NoEmail Inc"))]),
        ];
        assert!(matches!(db.merge(&rows, &declared), Err(DbError::MissingEmail)));

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM contacts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0, "failed batch must roll back fully");
    }

    #[test]
    fn test_fetch_pending_excludes_verified() {
        let (db, declared) = mem_db_with_fields(&[("company", FieldType::Text)]);
        db.merge(
            &[
                row(&[("email", text("a@example.com"))]),
                row(&[("email", text("b@example.com"))]),
            ],
            &declared,
        )
        .unwrap();
        db.mark_verified("a@example.com", STATUS_VALID).unwrap();

        let pending = db.fetch_pending(10, &order(), None).unwrap();
        assert_eq!(pending, vec!["b@example.com".to_string()]);
    }

    #[test]
    fn test_fetch_pending_respects_limit_and_filter() {
        let (db, declared) = mem_db_with_fields(&[("score", FieldType::Integer)]);
        db.merge(
            &[
                row(&[("email", text("a@example.com")), ("score", FieldValue::Integer(1))]),
                row(&[("email", text("b@example.com")), ("score", FieldValue::Integer(5))]),
                row(&[("email", text("c@example.com")), ("score", FieldValue::Integer(9))]),
            ],
            &declared,
        )
        .unwrap();

        let pending = db
            .fetch_pending(
                1,
                &QueryOrder::new("score", OrderDirection::Descending),
                Some("score >= 5"),
            )
            .unwrap();
        assert_eq!(pending, vec!["c@example.com".to_string()]);
    }

    #[test]
    fn test_fetch_pending_rejects_bad_order_field() {
        let (db, _) = mem_db_with_fields(&[]);
        let order = QueryOrder::new("email; DROP TABLE contacts", OrderDirection::Ascending);
        assert!(matches!(
            db.fetch_pending(10, &order, None),
            Err(DbError::InvalidOrderField(_))
        ));
    }

    #[test]
    fn test_eligible_for_export_requires_valid_status() {
        let (db, declared) = mem_db_with_fields(&[("company", FieldType::Text)]);
        db.merge(
            &[
                row(&[("email", text("a@example.com"))]),
                row(&[("email", text("b@example.com"))]),
                row(&[("email", text("c@example.com"))]),
            ],
            &declared,
        )
        .unwrap();
        db.mark_verified("a@example.com", STATUS_VALID).unwrap();
        db.mark_verified("b@example.com", STATUS_INVALID).unwrap();
        // c stays pending

        let eligible = db.fetch_eligible_for_export(10, &order(), None).unwrap();
        let emails: Vec<&str> = eligible.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(emails, vec!["a@example.com"]);
    }

    #[test]
    fn test_export_then_unchanged_reingest_stays_excluded() {
        let (db, declared) = mem_db_with_fields(&[("company", FieldType::Text)]);
        let rows = [row(&[("email", text("a@example.com")), ("company", text("Acme"))])];
        db.merge(&rows, &declared).unwrap();
        db.mark_verified("a@example.com", STATUS_VALID).unwrap();
        db.mark_exported("a@example.com").unwrap();

        // unchanged re-ingest: last_import untouched, still excluded
        db.merge(&rows, &declared).unwrap();
        assert!(db
            .fetch_eligible_for_export(10, &order(), None)
            .unwrap()
            .is_empty());

        // changed re-ingest: last_import advances past last_export
        std::thread::sleep(std::time::Duration::from_millis(2));
        db.merge(
            &[row(&[("email", text("a@example.com")), ("company", text("Initech"))])],
            &declared,
        )
        .unwrap();
        let eligible = db.fetch_eligible_for_export(10, &order(), None).unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(
            eligible[0].fields.get("company"),
            Some(&FieldValue::Text("Initech".to_string()))
        );
    }

    #[test]
    fn test_mark_unknown_email_is_noop() {
        let (db, _) = mem_db_with_fields(&[]);
        db.mark_verified("ghost@example.com", STATUS_VALID).unwrap();
        db.mark_exported("ghost@example.com").unwrap();
    }

    #[test]
    fn test_statistics_counts() {
        let (db, declared) = mem_db_with_fields(&[("company", FieldType::Text)]);
        db.merge(
            &[
                row(&[("email", text("a@example.com"))]),
                row(&[("email", text("b@example.com"))]),
                row(&[("email", text("c@example.com"))]),
                row(&[("email", text("d@example.com"))]),
            ],
            &declared,
        )
        .unwrap();
        db.mark_verified("a@example.com", STATUS_VALID).unwrap();
        db.mark_verified("b@example.com", STATUS_DISPOSABLE).unwrap();
        db.mark_verified("c@example.com", STATUS_VALID).unwrap();
        db.mark_exported("c@example.com").unwrap();

        let stats = db.statistics().unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.pending_verification, 1);
        assert_eq!(stats.by_status.get(STATUS_VALID), Some(&2));
        assert_eq!(stats.by_status.get(STATUS_DISPOSABLE), Some(&1));
        assert_eq!(stats.exported, 1);
        // a is eligible (never exported); c was exported after import
        assert_eq!(stats.eligible_for_export, 1);
    }

    #[test]
    fn test_typed_binding_orders_numerically() {
        let (db, declared) = mem_db_with_fields(&[("score", FieldType::Integer)]);
        // Text input, but the declared type is integer — "9" must not sort
        // above "10" the way text would.
        db.merge(
            &[
                row(&[("email", text("nine@example.com")), ("score", text("9"))]),
                row(&[("email", text("ten@example.com")), ("score", text("10"))]),
            ],
            &declared,
        )
        .unwrap();

        let pending = db
            .fetch_pending(2, &QueryOrder::new("score", OrderDirection::Descending), None)
            .unwrap();
        assert_eq!(pending[0], "ten@example.com");
    }
}
