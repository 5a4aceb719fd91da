// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Usage-cap policy: trial projects expire once their cumulative compute
//! usage crosses a fixed cap.
//!
//! Cumulative usage only ever grows, so the bands form a one-way ratchet
//! unless the cap itself is raised. Every enforcement rung after the first
//! adds a calendar month of grace.

use chrono::{Months, NaiveDate};
use tracing::warn;

use crate::policy::{
    ARCHIVE_DEADLINE_DAYS, Decision, PolicyAction, archival_progress, days_from, when_due,
};
use crate::project::ExpiryRecord;
use crate::status::ExpiryStatus;

/// Usage ratio at which the owner is warned.
pub const NEAR_LIMIT_RATIO: f64 = 0.8;

/// Usage ratio past which suspension may be scheduled.
pub const OVER_LIMIT_RATIO: f64 = 1.2;

/// Grace between enforcement rungs, in calendar months.
pub const GRACE_MONTHS: u32 = 1;

/// Where cumulative usage sits relative to the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UsageBand {
    /// Below 80% of the cap.
    UnderLimit,
    /// At or above 80%, below the cap.
    NearLimit,
    /// At or above the cap, below 120%.
    AtLimit,
    /// At or above 120% of the cap.
    OverLimit,
}

/// Classifies cumulative usage against the cap.
///
/// Callers validate the inputs; a non-positive cap or non-finite usage
/// ranks under-limit here and is rejected upstream as unusable policy data.
pub fn band(used_hours: f64, cap_hours: f64) -> UsageBand {
    if cap_hours <= 0.0 || !used_hours.is_finite() {
        return UsageBand::UnderLimit;
    }
    let ratio = used_hours / cap_hours;
    if ratio >= OVER_LIMIT_RATIO {
        UsageBand::OverLimit
    } else if ratio >= 1.0 {
        UsageBand::AtLimit
    } else if ratio >= NEAR_LIMIT_RATIO {
        UsageBand::NearLimit
    } else {
        UsageBand::UnderLimit
    }
}

/// Evaluates one usage-family step for a project.
///
/// Reaching the cap is enforced immediately from either of the first two
/// rungs, but suspension additionally requires the month of grace to have
/// elapsed, so a project discovered deep over the cap is still restricted
/// first and suspended no earlier than a month later.
pub fn evaluate(
    record: &ExpiryRecord,
    today: NaiveDate,
    used_hours: f64,
    cap_hours: f64,
) -> Option<Decision> {
    let band = band(used_hours, cap_hours);
    match record.status {
        ExpiryStatus::Active => match band {
            UsageBand::AtLimit | UsageBand::OverLimit => Some(Decision {
                action: PolicyAction::RestrictQuotas,
                status: ExpiryStatus::PendingSuspension,
                next_step: Some(month_later(today)),
            }),
            UsageBand::NearLimit => Some(Decision {
                action: PolicyAction::SendWarning,
                status: ExpiryStatus::QuotaWarning,
                next_step: None,
            }),
            UsageBand::UnderLimit => None,
        },
        ExpiryStatus::QuotaWarning => match band {
            UsageBand::AtLimit | UsageBand::OverLimit => Some(Decision {
                action: PolicyAction::RestrictQuotas,
                status: ExpiryStatus::PendingSuspension,
                next_step: Some(month_later(today)),
            }),
            _ => None,
        },
        ExpiryStatus::PendingSuspension => match band {
            UsageBand::OverLimit => when_due(
                record,
                today,
                PolicyAction::StopResources,
                ExpiryStatus::Suspended,
                Some(month_later(today)),
            ),
            _ => None,
        },
        ExpiryStatus::Suspended => when_due(
            record,
            today,
            PolicyAction::StartArchive,
            ExpiryStatus::Archiving,
            Some(days_from(today, ARCHIVE_DEADLINE_DAYS)),
        ),
        ExpiryStatus::Archiving | ExpiryStatus::Archived => archival_progress(record, today),
        ExpiryStatus::Warning | ExpiryStatus::Restricted | ExpiryStatus::Stopped => {
            warn!(
                status = %record.status,
                "status belongs to the allocation family, usage policy leaves it alone"
            );
            None
        }
        ExpiryStatus::ArchiveError | ExpiryStatus::Deleted | ExpiryStatus::Admin => None,
    }
}

/// Calendar-aware month addition. Jan 31 plus a month lands on the last day
/// of February rather than overflowing.
fn month_later(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_months(Months::new(GRACE_MONTHS))
        .expect("gate dates stay within chrono's representable range")
}
