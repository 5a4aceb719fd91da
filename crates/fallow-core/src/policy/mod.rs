// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pure policy evaluation.
//!
//! Each family is a function from `(record, today, inputs)` to at most one
//! [`Decision`]. Evaluators never perform I/O; the engine loads the inputs,
//! executes the decided action against the resource managers, and persists
//! the decided state only after the action succeeds.
//!
//! A decision moves a project at most one rung per run. Long-expired
//! projects still walk the ladder one invocation at a time, so every stage's
//! side effects and notifications happen in order.

use chrono::{Days, NaiveDate};
use tracing::warn;

use crate::project::ExpiryRecord;
use crate::status::ExpiryStatus;

pub mod allocation;
pub mod usage;

/// Days a project stays in the archiving stage before the engine stops
/// waiting for snapshot completion and force-advances it to archived.
pub const ARCHIVE_DEADLINE_DAYS: u64 = 90;

/// Side effect the engine must perform before persisting a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Notify the owner. No resource-level effect.
    SendWarning,
    /// Zero every quota so nothing new can be created.
    RestrictQuotas,
    /// Stop or suspend running resources and lock them.
    StopResources,
    /// Request archival snapshots for all resources.
    StartArchive,
    /// Check snapshot progress; persist only if archival completed.
    PollArchive,
    /// Archiving deadline passed. Persist archived with whatever exists.
    ForceArchived,
    /// Delete resources and archives, then disable the project. Terminal.
    Delete,
}

/// One evaluated transition: the action to run and the state to persist
/// once it succeeds.
///
/// For [`PolicyAction::PollArchive`] the `status`/`next_step` pair is
/// persisted only when polling reports every artifact complete; otherwise
/// the record is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Side effect to perform first.
    pub action: PolicyAction,
    /// Status to persist after the action succeeds.
    pub status: ExpiryStatus,
    /// Gate date for the following transition, if any.
    pub next_step: Option<NaiveDate>,
}

impl Decision {
    fn new(action: PolicyAction, status: ExpiryStatus, next_step: Option<NaiveDate>) -> Self {
        Decision {
            action,
            status,
            next_step,
        }
    }
}

/// Gate check shared by every dated transition. A missing gate date on a
/// gated status holds the project in place; it never means "eligible now".
fn when_due(
    record: &ExpiryRecord,
    today: NaiveDate,
    action: PolicyAction,
    status: ExpiryStatus,
    next_step: Option<NaiveDate>,
) -> Option<Decision> {
    match record.next_step {
        Some(gate) if today >= gate => Some(Decision::new(action, status, next_step)),
        Some(_) => None,
        None => {
            warn!(
                status = %record.status,
                "gated status has no next_step date, holding until repaired"
            );
            None
        }
    }
}

/// Archival rungs shared verbatim by both families.
///
/// While archiving, the deadline in `next_step` decides between polling and
/// force-advancing; the archived record carries that same date forward, so a
/// forced advance is immediately eligible for deletion while an early
/// completion waits the deadline out.
fn archival_progress(record: &ExpiryRecord, today: NaiveDate) -> Option<Decision> {
    match record.status {
        ExpiryStatus::Archiving => match record.next_step {
            Some(deadline) if today >= deadline => Some(Decision::new(
                PolicyAction::ForceArchived,
                ExpiryStatus::Archived,
                record.next_step,
            )),
            _ => Some(Decision::new(
                PolicyAction::PollArchive,
                ExpiryStatus::Archived,
                record.next_step,
            )),
        },
        ExpiryStatus::Archived => when_due(
            record,
            today,
            PolicyAction::Delete,
            ExpiryStatus::Deleted,
            None,
        ),
        _ => None,
    }
}

/// `today + n days`.
fn days_from(today: NaiveDate, days: u64) -> NaiveDate {
    today
        .checked_add_days(Days::new(days))
        .expect("gate dates stay within chrono's representable range")
}
