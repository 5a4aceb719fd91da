// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Allocation-window policy: projects expire when their approved allocation
//! of time runs out.

use chrono::{Days, NaiveDate};
use tracing::warn;

use crate::policy::{
    ARCHIVE_DEADLINE_DAYS, Decision, PolicyAction, archival_progress, days_from, when_due,
};
use crate::project::ExpiryRecord;
use crate::status::ExpiryStatus;

/// The warning threshold is never later than this many days before the
/// window ends.
pub const WARNING_LEAD_DAYS: u64 = 30;

/// Fraction of the window after which the warning threshold is reached.
pub const WARNING_WINDOW_FRACTION: f64 = 0.8;

/// Grace period between the warning gate and quota restriction.
pub const RESTRICT_GRACE_DAYS: u64 = 30;

/// Grace period between quota restriction and resource shutdown.
pub const STOP_GRACE_DAYS: u64 = 30;

/// Approved time window of a project's allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationWindow {
    /// First day of the allocation.
    pub start: NaiveDate,
    /// Last day of the allocation.
    pub end: NaiveDate,
}

impl AllocationWindow {
    /// Day the owner is first warned: `max(start + 0.8 * span, end - 30d)`.
    ///
    /// Degenerate windows (`end <= start`) clamp the span to zero instead of
    /// panicking; the threshold then collapses to the later of the two
    /// window edges minus the lead, so such projects warn immediately.
    pub fn warning_date(&self) -> NaiveDate {
        let span_days = (self.end - self.start).num_days().max(0) as f64;
        let fraction = (span_days * WARNING_WINDOW_FRACTION).floor() as u64;
        let by_fraction = days_from(self.start, fraction);
        let by_lead = self
            .end
            .checked_sub_days(Days::new(WARNING_LEAD_DAYS))
            .unwrap_or(self.start);
        by_fraction.max(by_lead)
    }
}

/// Evaluates one allocation-family step for a project.
///
/// Moves at most one rung per call. Ungated only at the first rung: an
/// active project becomes `warning` once today reaches the warning
/// threshold, with the window's end date as the next gate. Every later rung
/// waits for its gate date, then schedules the following one relative to
/// today, so grace periods are counted from when the engine actually acted.
pub fn evaluate(
    record: &ExpiryRecord,
    today: NaiveDate,
    window: &AllocationWindow,
) -> Option<Decision> {
    match record.status {
        ExpiryStatus::Active => {
            if today >= window.warning_date() {
                Some(Decision {
                    action: PolicyAction::SendWarning,
                    status: ExpiryStatus::Warning,
                    next_step: Some(window.end),
                })
            } else {
                None
            }
        }
        ExpiryStatus::Warning => when_due(
            record,
            today,
            PolicyAction::RestrictQuotas,
            ExpiryStatus::Restricted,
            Some(days_from(today, RESTRICT_GRACE_DAYS)),
        ),
        ExpiryStatus::Restricted => when_due(
            record,
            today,
            PolicyAction::StopResources,
            ExpiryStatus::Stopped,
            Some(days_from(today, STOP_GRACE_DAYS)),
        ),
        ExpiryStatus::Stopped => when_due(
            record,
            today,
            PolicyAction::StartArchive,
            ExpiryStatus::Archiving,
            Some(days_from(today, ARCHIVE_DEADLINE_DAYS)),
        ),
        ExpiryStatus::Archiving | ExpiryStatus::Archived => archival_progress(record, today),
        ExpiryStatus::QuotaWarning | ExpiryStatus::PendingSuspension | ExpiryStatus::Suspended => {
            warn!(
                status = %record.status,
                "status belongs to the usage family, allocation policy leaves it alone"
            );
            None
        }
        ExpiryStatus::ArchiveError | ExpiryStatus::Deleted | ExpiryStatus::Admin => None,
    }
}
