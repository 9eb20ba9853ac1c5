//! Shared types for the contact store: field declarations, typed values,
//! query ordering, and the store error taxonomy.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Reserved schema
// ---------------------------------------------------------------------------

/// Bookkeeping columns owned by the store. Sources may never declare these,
/// and they are never transmitted downstream.
pub const RESERVED_FIELDS: &[&str] = &[
    "email",
    "last_import",
    "last_verify",
    "verify_status",
    "last_export",
];

/// Verification statuses the pipeline itself assigns. The full status set is
/// open-ended — the provider may return codes not listed here and they are
/// stored as-is.
pub const STATUS_VALID: &str = "valid";
pub const STATUS_INVALID: &str = "invalid";
pub const STATUS_DISPOSABLE: &str = "disposable";
pub const STATUS_UNKNOWN: &str = "unknown";

/// Check whether a name is usable as a column identifier:
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    static IDENT_RE: OnceLock<Regex> = OnceLock::new();
    let re = IDENT_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));
    re.is_match(name)
}

// ---------------------------------------------------------------------------
// Field declarations
// ---------------------------------------------------------------------------

/// Semantic type a source declares for a dynamic field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Integer,
    Real,
}

impl FieldType {
    /// SQLite column type used for the `ALTER TABLE ADD COLUMN`.
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Integer => "INTEGER",
            FieldType::Real => "REAL",
        }
    }
}

/// A source's field declaration: name → semantic type. BTreeMap so the
/// generated SQL has a deterministic column order.
pub type FieldDeclarations = BTreeMap<String, FieldType>;

// ---------------------------------------------------------------------------
// Typed values
// ---------------------------------------------------------------------------

/// A dynamic field value as stored in (or bound to) the contact table.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
}

impl FieldValue {
    /// Coerce to the declared type so downstream ordering and arithmetic are
    /// well-defined. NULL stays NULL regardless of the declared type.
    pub fn coerce(self, field: &str, ty: FieldType) -> Result<FieldValue, DbError> {
        match (ty, self) {
            (_, FieldValue::Null) => Ok(FieldValue::Null),
            (FieldType::Text, FieldValue::Text(s)) => Ok(FieldValue::Text(s)),
            (FieldType::Text, FieldValue::Integer(i)) => Ok(FieldValue::Text(i.to_string())),
            (FieldType::Text, FieldValue::Real(f)) => Ok(FieldValue::Text(f.to_string())),
            (FieldType::Integer, FieldValue::Integer(i)) => Ok(FieldValue::Integer(i)),
            (FieldType::Integer, FieldValue::Real(f)) if f.fract() == 0.0 => {
                Ok(FieldValue::Integer(f as i64))
            }
            (FieldType::Integer, FieldValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| DbError::Coercion {
                    field: field.to_string(),
                    value: s,
                    ty,
                }),
            (FieldType::Real, FieldValue::Real(f)) => Ok(FieldValue::Real(f)),
            (FieldType::Real, FieldValue::Integer(i)) => Ok(FieldValue::Real(i as f64)),
            (FieldType::Real, FieldValue::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(FieldValue::Real)
                .map_err(|_| DbError::Coercion {
                    field: field.to_string(),
                    value: s,
                    ty,
                }),
            (FieldType::Integer, FieldValue::Real(f)) => Err(DbError::Coercion {
                field: field.to_string(),
                value: f.to_string(),
                ty,
            }),
        }
    }

    /// Convert a JSON value from a source row or an API payload.
    pub fn from_json(value: &serde_json::Value) -> FieldValue {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Integer(i64::from(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else {
                    FieldValue::Real(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => FieldValue::Text(s.clone()),
            other => FieldValue::Text(other.to_string()),
        }
    }

    /// Render as a JSON value for outbound API payloads.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Integer(i) => serde_json::Value::from(*i),
            FieldValue::Real(f) => serde_json::Value::from(*f),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl rusqlite::ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value, ValueRef};
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            FieldValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            FieldValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
        })
    }
}

impl From<rusqlite::types::ValueRef<'_>> for FieldValue {
    fn from(value: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;
        match value {
            ValueRef::Null => FieldValue::Null,
            ValueRef::Integer(i) => FieldValue::Integer(i),
            ValueRef::Real(f) => FieldValue::Real(f),
            ValueRef::Text(t) => FieldValue::Text(String::from_utf8_lossy(t).into_owned()),
            // Blobs are not part of the declared type set; treat as absent.
            ValueRef::Blob(_) => FieldValue::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Query ordering
// ---------------------------------------------------------------------------

/// Direction for queue-derivation ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

impl OrderDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Ascending => "ASC",
            OrderDirection::Descending => "DESC",
        }
    }
}

/// Ordering contract for `fetch_pending` / `fetch_eligible_for_export`.
/// The field comes from deployment configuration and is validated against
/// the identifier pattern before being interpolated into SQL.
#[derive(Debug, Clone)]
pub struct QueryOrder {
    pub field: String,
    pub direction: OrderDirection,
}

impl QueryOrder {
    pub fn new(field: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

// ---------------------------------------------------------------------------
// Rows and aggregates
// ---------------------------------------------------------------------------

/// A full contact row: bookkeeping columns plus all dynamic fields.
#[derive(Debug, Clone)]
pub struct ContactRecord {
    pub email: String,
    pub last_import: Option<String>,
    pub last_verify: Option<String>,
    pub verify_status: Option<String>,
    pub last_export: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
}

/// Counts applied by a batch merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Aggregate store counters for the `stats` command.
#[derive(Debug, Clone, Default)]
pub struct StoreStatistics {
    pub total: i64,
    pub pending_verification: i64,
    pub by_status: BTreeMap<String, i64>,
    pub exported: i64,
    pub eligible_for_export: i64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the contact store. The first four variants are configuration
/// errors: they abort the stage before any remote call.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("field name '{0}' is reserved")]
    ReservedField(String),

    #[error("invalid field name '{0}' (must match [A-Za-z_][A-Za-z0-9_]*)")]
    InvalidFieldName(String),

    #[error("invalid order field '{0}'")]
    InvalidOrderField(String),

    #[error("cannot coerce value '{value}' of field '{field}' to {ty:?}")]
    Coercion {
        field: String,
        value: String,
        ty: FieldType,
    },

    #[error("row is missing a usable 'email' value")]
    MissingEmail,

    #[error("failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
