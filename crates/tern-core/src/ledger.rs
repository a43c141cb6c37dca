//! Ledger entries: which migrations are applied on which database.

use crate::key::MigrationKey;
use crate::names::DatabaseAlias;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Recorded state of a migration on one database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LedgerStatus {
    /// Every operation ran and was committed
    Applied,

    /// A non-transactional run failed at `operation` (0-based); operations
    /// before it took effect. Needs operator correction.
    Partial { operation: usize },
}

impl LedgerStatus {
    /// Column value stored in the ledger table.
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Applied => "applied",
            LedgerStatus::Partial { .. } => "partial",
        }
    }

    /// Rebuild a status from the ledger table's `status` and
    /// `failed_operation` columns. Returns `None` for unrecognised rows.
    pub fn from_columns(status: &str, failed_operation: Option<i64>) -> Option<Self> {
        match status {
            "applied" => Some(LedgerStatus::Applied),
            "partial" => {
                let operation = usize::try_from(failed_operation?).ok()?;
                Some(LedgerStatus::Partial { operation })
            }
            _ => None,
        }
    }

    /// Position of the failed operation, for partial entries.
    pub fn failed_operation(&self) -> Option<usize> {
        match self {
            LedgerStatus::Applied => None,
            LedgerStatus::Partial { operation } => Some(*operation),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, LedgerStatus::Applied)
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerStatus::Applied => f.write_str("applied"),
            LedgerStatus::Partial { operation } => {
                write!(f, "partially applied (failed at operation {operation})")
            }
        }
    }
}

/// One row of the ledger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub database_alias: DatabaseAlias,
    pub migration: MigrationKey,
    pub applied_at: DateTime<Utc>,
    #[serde(flatten)]
    pub status: LedgerStatus,
}

impl LedgerEntry {
    pub fn is_applied(&self) -> bool {
        self.status.is_applied()
    }
}
