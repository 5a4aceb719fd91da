// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Expiry status values and the forward-only stage ladder.
//!
//! Both policy families drive a project through the same seven stages.
//! They differ only in the status value persisted for the middle rungs:
//!
//! | Stage | Allocation family | Usage family |
//! |-------|-------------------|--------------|
//! | Active | `active` | `active` |
//! | Warning | `warning` | `quota_warning` |
//! | Restricted | `restricted` | `pending_suspension` |
//! | Stopped | `stopped` | `suspended` |
//! | Archiving | `archiving` | `archiving` |
//! | Archived | `archived` | `archived` |
//! | Deleted | `deleted` | `deleted` |
//!
//! Two statuses sit outside the ladder: `admin` (operator hold, exempt from
//! all processing) and `archive_error` (archival gave up, waits for manual
//! intervention). Neither maps to a stage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Position on the expiry ladder, shared by both policy families.
///
/// Stages are totally ordered. A transition is forward when the target
/// stage is greater than or equal to the current one; equality only occurs
/// for the `Archiving` retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExpiryStage {
    /// No expiry processing has touched the project yet.
    Active,
    /// The owner has been warned; nothing enforced yet.
    Warning,
    /// Quotas are zeroed so no new resources can be created.
    Restricted,
    /// Existing resources are shut down (or suspended).
    Stopped,
    /// Archival snapshots have been requested and are being polled.
    Archiving,
    /// Archival finished; resources await final deletion.
    Archived,
    /// Resources and archives are gone and the project is disabled.
    Deleted,
}

/// Persisted expiry status of a project.
///
/// The wire form is the lower snake_case string shown in the module table;
/// [`ExpiryStatus::as_str`] and [`FromStr`] round-trip it. An absent status
/// on a project record means [`ExpiryStatus::Active`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    /// Initial state, no action taken.
    Active,
    /// Allocation family: approaching the end of the allocation window.
    Warning,
    /// Usage family: cumulative usage is near the cap.
    QuotaWarning,
    /// Allocation family: quotas zeroed.
    Restricted,
    /// Usage family: quotas zeroed, suspension scheduled.
    PendingSuspension,
    /// Allocation family: resources shut down and locked.
    Stopped,
    /// Usage family: resources suspended and locked.
    Suspended,
    /// Archival in progress; re-entered on every retry.
    Archiving,
    /// Every resource has a completed archive artifact.
    Archived,
    /// Archival exhausted its attempts; manual intervention required.
    ArchiveError,
    /// Resources and archives deleted, project disabled. Terminal.
    Deleted,
    /// Operator hold; the machine never touches the project.
    Admin,
}

impl ExpiryStatus {
    /// Persisted string form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryStatus::Active => "active",
            ExpiryStatus::Warning => "warning",
            ExpiryStatus::QuotaWarning => "quota_warning",
            ExpiryStatus::Restricted => "restricted",
            ExpiryStatus::PendingSuspension => "pending_suspension",
            ExpiryStatus::Stopped => "stopped",
            ExpiryStatus::Suspended => "suspended",
            ExpiryStatus::Archiving => "archiving",
            ExpiryStatus::Archived => "archived",
            ExpiryStatus::ArchiveError => "archive_error",
            ExpiryStatus::Deleted => "deleted",
            ExpiryStatus::Admin => "admin",
        }
    }

    /// Ladder position, or `None` for the off-ladder statuses
    /// (`admin`, `archive_error`).
    pub fn stage(&self) -> Option<ExpiryStage> {
        match self {
            ExpiryStatus::Active => Some(ExpiryStage::Active),
            ExpiryStatus::Warning | ExpiryStatus::QuotaWarning => Some(ExpiryStage::Warning),
            ExpiryStatus::Restricted | ExpiryStatus::PendingSuspension => {
                Some(ExpiryStage::Restricted)
            }
            ExpiryStatus::Stopped | ExpiryStatus::Suspended => Some(ExpiryStage::Stopped),
            ExpiryStatus::Archiving => Some(ExpiryStage::Archiving),
            ExpiryStatus::Archived => Some(ExpiryStage::Archived),
            ExpiryStatus::Deleted => Some(ExpiryStage::Deleted),
            ExpiryStatus::ArchiveError | ExpiryStatus::Admin => None,
        }
    }

    /// True for the operator hold status.
    pub fn is_exempt(&self) -> bool {
        matches!(self, ExpiryStatus::Admin)
    }

    /// True once a project can never advance again without manual repair.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExpiryStatus::Deleted | ExpiryStatus::ArchiveError)
    }
}

impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognized status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized expiry status '{0}'")]
pub struct ParseStatusError(pub String);

impl FromStr for ExpiryStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ExpiryStatus::Active),
            "warning" => Ok(ExpiryStatus::Warning),
            "quota_warning" => Ok(ExpiryStatus::QuotaWarning),
            "restricted" => Ok(ExpiryStatus::Restricted),
            "pending_suspension" => Ok(ExpiryStatus::PendingSuspension),
            "stopped" => Ok(ExpiryStatus::Stopped),
            "suspended" => Ok(ExpiryStatus::Suspended),
            "archiving" => Ok(ExpiryStatus::Archiving),
            "archived" => Ok(ExpiryStatus::Archived),
            "archive_error" => Ok(ExpiryStatus::ArchiveError),
            "deleted" => Ok(ExpiryStatus::Deleted),
            "admin" => Ok(ExpiryStatus::Admin),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}
