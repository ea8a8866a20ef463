//! Error taxonomy for ledger writes and reads.
//!
//! Every rejected write maps to exactly one [`LedgerError`] variant. SQLite
//! constraint failures are classified through their extended result codes so
//! that a CHECK failure, a dangling foreign key and a duplicate unique key
//! surface as validation, referential and duplicate errors respectively.

use rusqlite::ffi;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Length, cardinality, range or enum membership violation.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The referenced parent row does not exist.
    #[error("{parent} not found: {id}")]
    Referential { parent: &'static str, id: String },

    /// A row already exists for a key that must be unique.
    #[error("{entity} already exists for {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("sqlite error: {0}")]
    Database(rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Stable identifier suitable for an API error payload.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Referential { .. } => "REFERENTIAL_ERROR",
            Self::Duplicate { .. } => "DUPLICATE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Database(_) | Self::Serialization(_) => "INTERNAL_ERROR",
        }
    }

    /// `true` for the three constraint classes a caller can fix by changing input.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Referential { .. } | Self::Duplicate { .. }
        )
    }
}

/// Which SQLite constraint rejected a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintKind {
    Unique,
    ForeignKey,
    Check,
    NotNull,
    Other,
}

pub(crate) fn constraint_kind(err: &rusqlite::Error) -> Option<ConstraintKind> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Some(match e.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    ConstraintKind::Unique
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
                ffi::SQLITE_CONSTRAINT_CHECK => ConstraintKind::Check,
                ffi::SQLITE_CONSTRAINT_NOTNULL => ConstraintKind::NotNull,
                _ => ConstraintKind::Other,
            })
        }
        _ => None,
    }
}

fn sqlite_message(err: &rusqlite::Error) -> String {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.clone(),
        other => other.to_string(),
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        match constraint_kind(&err) {
            Some(ConstraintKind::Check | ConstraintKind::NotNull) => {
                Self::validation("row", sqlite_message(&err))
            }
            _ => Self::Database(err),
        }
    }
}

/// Names the row being written so constraint failures can be reported in
/// terms of the entity and its parent.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WriteTarget<'a> {
    /// Entity whose uniqueness is enforced (e.g. `"response"`).
    pub entity: &'static str,
    /// Value of the unique key being inserted.
    pub key: &'a str,
    /// Parent entity referenced by the foreign key.
    pub parent: &'static str,
    pub parent_id: &'a str,
}

impl WriteTarget<'_> {
    pub(crate) fn classify(&self, err: rusqlite::Error) -> LedgerError {
        let classified = match constraint_kind(&err) {
            Some(ConstraintKind::Unique) => LedgerError::Duplicate {
                entity: self.entity,
                key: self.key.to_string(),
            },
            Some(ConstraintKind::ForeignKey) => LedgerError::Referential {
                parent: self.parent,
                id: self.parent_id.to_string(),
            },
            _ => LedgerError::from(err),
        };
        tracing::warn!(
            entity = self.entity,
            code = classified.code(),
            error = %classified,
            "write rejected"
        );
        classified
    }
}
