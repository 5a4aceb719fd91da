// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Owner notifications around stage changes.
//!
//! Only user-visible stages are announced; the archival bookkeeping stages
//! (`archiving`, `archived`, `archive_error`, `deleted`) happen behind
//! already-stopped resources and would only confuse owners. Send failures
//! are logged and swallowed: a missed email must never wedge the state
//! machine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use fallow_clients::{ClientError, Notifier};
use fallow_core::{ExpiryStatus, Project};

/// Stages whose entry is announced to the project owner.
const NOTIFIED_STAGES: [ExpiryStatus; 6] = [
    ExpiryStatus::Warning,
    ExpiryStatus::QuotaWarning,
    ExpiryStatus::Restricted,
    ExpiryStatus::PendingSuspension,
    ExpiryStatus::Stopped,
    ExpiryStatus::Suspended,
];

/// Notification dispatch with the dry-run guard applied.
pub struct Notifications {
    notifier: Arc<dyn Notifier>,
    live: bool,
}

impl Notifications {
    /// Dispatcher over the given transport. With `live` false every send is
    /// logged and dropped.
    pub fn new(notifier: Arc<dyn Notifier>, live: bool) -> Self {
        Self { notifier, live }
    }

    /// Announce that a project just entered `status`.
    ///
    /// `extra` carries policy-specific values (window dates, usage numbers)
    /// merged into the rendering context.
    pub async fn stage_changed(
        &self,
        project: &Project,
        status: ExpiryStatus,
        next_step: Option<NaiveDate>,
        extra: Value,
    ) {
        if !NOTIFIED_STAGES.contains(&status) {
            debug!(
                project_id = %project.id,
                stage = %status,
                "internal stage, no owner notification"
            );
            return;
        }

        let context = render_context(project, status, next_step, extra);

        if !self.live {
            info!(
                project_id = %project.id,
                stage = %status,
                "dry run: would notify owner"
            );
            return;
        }

        match self.notifier.notify(project, status.as_str(), &context).await {
            Ok(()) => info!(project_id = %project.id, stage = %status, "owner notified"),
            Err(error) => warn!(
                project_id = %project.id,
                stage = %status,
                %error,
                "notification failed, continuing"
            ),
        }
    }
}

fn render_context(
    project: &Project,
    status: ExpiryStatus,
    next_step: Option<NaiveDate>,
    extra: Value,
) -> Value {
    let mut context = json!({
        "project_id": project.id,
        "project_name": project.name,
        "status": status.as_str(),
        "next_step": next_step.map(|d| d.to_string()),
    });
    if let (Value::Object(base), Value::Object(more)) = (&mut context, extra) {
        base.extend(more);
    }
    context
}

/// Transport that writes notifications to the log instead of sending them.
/// The rehearsal backend's default.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        project: &Project,
        stage: &str,
        context: &Value,
    ) -> std::result::Result<(), ClientError> {
        info!(
            project_id = %project.id,
            stage,
            %context,
            "notification"
        );
        Ok(())
    }
}
