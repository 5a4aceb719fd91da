// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Project records as the identity service hands them out, plus the
//! resolution of raw status fields into a typed [`ExpiryRecord`].

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::status::{ExpiryStatus, ParseStatusError};

/// Metadata key holding a support ticket number. A non-zero value puts the
/// project on hold until the ticket is resolved.
pub const TICKET_KEY: &str = "expiry_ticket_id";

/// Owner contact attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Address notifications are sent to.
    pub email: String,
    /// Disabled contacts are treated as absent.
    pub enabled: bool,
}

/// A tenancy project as stored by the identity service.
///
/// Expiry state lives in free-form string fields on the record. Two
/// generations of field names exist; `expiry_status`/`expiry_next_step` are
/// current, `legacy_status`/`legacy_expiry_date` are consulted as a fallback
/// and rewritten forward when they are the only source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Identity service id, unique and stable.
    pub id: String,
    /// Human-readable name. Trial projects carry a reserved prefix.
    pub name: String,
    /// Disabled projects are invisible to normal users.
    pub enabled: bool,
    /// Current-generation status field.
    #[serde(default)]
    pub expiry_status: Option<String>,
    /// Current-generation gate date, ISO `YYYY-MM-DD`.
    #[serde(default)]
    pub expiry_next_step: Option<String>,
    /// Previous-generation status field.
    #[serde(default)]
    pub legacy_status: Option<String>,
    /// Previous-generation gate date.
    #[serde(default)]
    pub legacy_expiry_date: Option<String>,
    /// Owner contact, if the identity service knows one.
    #[serde(default)]
    pub owner: Option<Contact>,
    /// Free-form key/value metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Project {
    /// New enabled project with no expiry state.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Project {
            id: id.into(),
            name: name.into(),
            enabled: true,
            expiry_status: None,
            expiry_next_step: None,
            legacy_status: None,
            legacy_expiry_date: None,
            owner: None,
            metadata: BTreeMap::new(),
        }
    }

    /// True when a support ticket holds the project out of processing.
    pub fn has_ticket_hold(&self) -> bool {
        match self.metadata.get(TICKET_KEY) {
            Some(value) => !value.trim().is_empty() && value.trim() != "0",
            None => false,
        }
    }

    /// True when the project has an enabled owner contact with an address.
    pub fn has_active_owner(&self) -> bool {
        self.owner
            .as_ref()
            .is_some_and(|c| c.enabled && !c.email.trim().is_empty())
    }

    /// True when any legacy-generation field carries a value the current
    /// fields lack, meaning the resolved record should be written forward.
    pub fn has_stale_legacy_fields(&self) -> bool {
        (non_empty(&self.expiry_status).is_none() && non_empty(&self.legacy_status).is_some())
            || (non_empty(&self.expiry_next_step).is_none()
                && non_empty(&self.legacy_expiry_date).is_some())
    }
}

/// Typed expiry state of a project after field resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryRecord {
    /// Current ladder position.
    pub status: ExpiryStatus,
    /// Earliest date the next transition may fire, when the current status
    /// gates on one. `None` for ungated statuses or unparseable dates; an
    /// absent date never makes a gated transition eligible.
    pub next_step: Option<NaiveDate>,
}

impl ExpiryRecord {
    /// Record for a project the machine has never touched.
    pub fn initial() -> Self {
        ExpiryRecord {
            status: ExpiryStatus::Active,
            next_step: None,
        }
    }

    /// Resolves the raw string fields of a project into a typed record.
    ///
    /// Current fields win over legacy ones per field. A missing status means
    /// [`ExpiryStatus::Active`]; an unrecognized status string is an error so
    /// callers can skip the project instead of guessing. An unparseable date
    /// is logged and dropped, which downstream reads as "not yet eligible".
    pub fn resolve(project: &Project) -> Result<ExpiryRecord, ParseStatusError> {
        let status = match non_empty(&project.expiry_status)
            .or_else(|| non_empty(&project.legacy_status))
        {
            Some(raw) => raw.parse::<ExpiryStatus>()?,
            None => ExpiryStatus::Active,
        };

        let next_step = non_empty(&project.expiry_next_step)
            .or_else(|| non_empty(&project.legacy_expiry_date))
            .and_then(|raw| match raw.parse::<NaiveDate>() {
                Ok(date) => Some(date),
                Err(error) => {
                    warn!(
                        project_id = %project.id,
                        raw,
                        %error,
                        "unparseable next_step date, treating as not yet eligible"
                    );
                    None
                }
            });

        Ok(ExpiryRecord { status, next_step })
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_resolve_to_active() {
        let project = Project::new("p-1", "research-lab");
        let record = ExpiryRecord::resolve(&project).unwrap();
        assert_eq!(record, ExpiryRecord::initial());
        assert!(!project.has_stale_legacy_fields());
    }

    #[test]
    fn test_current_fields_win_over_legacy() {
        let mut project = Project::new("p-1", "research-lab");
        project.expiry_status = Some("warning".into());
        project.expiry_next_step = Some("2025-12-01".into());
        project.legacy_status = Some("stopped".into());
        project.legacy_expiry_date = Some("2020-01-01".into());

        let record = ExpiryRecord::resolve(&project).unwrap();
        assert_eq!(record.status, ExpiryStatus::Warning);
        assert_eq!(
            record.next_step,
            Some(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap())
        );
        assert!(!project.has_stale_legacy_fields());
    }

    #[test]
    fn test_legacy_fields_fill_in_when_current_are_empty() {
        let mut project = Project::new("p-1", "research-lab");
        project.expiry_status = Some("  ".into());
        project.legacy_status = Some("restricted".into());
        project.legacy_expiry_date = Some("2025-06-30".into());

        let record = ExpiryRecord::resolve(&project).unwrap();
        assert_eq!(record.status, ExpiryStatus::Restricted);
        assert_eq!(
            record.next_step,
            Some(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
        );
        assert!(project.has_stale_legacy_fields());
    }

    #[test]
    fn test_unknown_status_is_an_error_not_a_default() {
        let mut project = Project::new("p-1", "research-lab");
        project.expiry_status = Some("zombie".into());
        assert!(ExpiryRecord::resolve(&project).is_err());
    }

    #[test]
    fn test_garbage_date_resolves_to_none() {
        let mut project = Project::new("p-1", "research-lab");
        project.expiry_status = Some("warning".into());
        project.expiry_next_step = Some("next tuesday".into());

        let record = ExpiryRecord::resolve(&project).unwrap();
        assert_eq!(record.status, ExpiryStatus::Warning);
        assert_eq!(record.next_step, None);
    }

    #[test]
    fn test_ticket_hold_requires_a_real_ticket_number() {
        let mut project = Project::new("p-1", "research-lab");
        assert!(!project.has_ticket_hold());
        project.metadata.insert(TICKET_KEY.into(), "0".into());
        assert!(!project.has_ticket_hold());
        project.metadata.insert(TICKET_KEY.into(), "".into());
        assert!(!project.has_ticket_hold());
        project.metadata.insert(TICKET_KEY.into(), "48213".into());
        assert!(project.has_ticket_hold());
    }

    #[test]
    fn test_owner_must_be_enabled_with_an_address() {
        let mut project = Project::new("p-1", "research-lab");
        assert!(!project.has_active_owner());
        project.owner = Some(Contact {
            email: "owner@example.edu".into(),
            enabled: false,
        });
        assert!(!project.has_active_owner());
        project.owner = Some(Contact {
            email: " ".into(),
            enabled: true,
        });
        assert!(!project.has_active_owner());
        project.owner = Some(Contact {
            email: "owner@example.edu".into(),
            enabled: true,
        });
        assert!(project.has_active_owner());
    }
}
