// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-project expiry processing.
//!
//! [`Expirer::process`] runs one project through one rung of the ladder:
//!
//! 1. Eligibility guards (enabled, no ticket hold, an owner to notify,
//!    policy applicability).
//! 2. Load and normalize the expiry record from the identity service.
//! 3. Ask the policy for a decision. No decision means the project is
//!    settled for today.
//! 4. Execute the decided action against every resource family.
//! 5. Persist the new state, then notify the owner if the status changed.
//!
//! The order of 4 and 5 is the crash-safety contract: state is written only
//! after the action succeeded, so a crash in between is repaired by the next
//! run redoing the action against already-affected resources. Every action
//! tolerates that.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use fallow_clients::{AllocationService, AllocationStatus, ClientError, UsageService};
use fallow_core::policy::allocation::{self, AllocationWindow};
use fallow_core::policy::usage;
use fallow_core::{Clock, Decision, ExpiryRecord, ExpiryStatus, PolicyAction, Project};

use crate::archiver::{ArchiveOutcome, Archiver};
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::notify::Notifications;
use crate::store::ProjectStore;

/// A decision plus the policy-specific values that go into the owner's
/// notification.
pub struct PolicyStep {
    /// The transition to perform.
    pub decision: Decision,
    /// Extra rendering context, merged over the project basics.
    pub context: serde_json::Value,
}

/// One policy family: decides whether a project is in scope and what its
/// next transition is.
#[async_trait]
pub trait ExpiryPolicy: Send + Sync {
    /// Family tag used in logs and the CLI.
    fn family(&self) -> &'static str;

    /// Cheap scope check before any backend call is made.
    fn check_applicable(&self, _project: &Project) -> Result<()> {
        Ok(())
    }

    /// Load this family's inputs and evaluate the record against them.
    async fn decide(
        &self,
        project: &Project,
        record: &ExpiryRecord,
        today: NaiveDate,
    ) -> Result<Option<PolicyStep>>;
}

/// Expiry driven by the project's allocation window.
pub struct AllocationPolicy {
    allocations: Arc<dyn AllocationService>,
}

impl AllocationPolicy {
    /// Policy reading windows from the given allocation service.
    pub fn new(allocations: Arc<dyn AllocationService>) -> Self {
        Self { allocations }
    }
}

#[async_trait]
impl ExpiryPolicy for AllocationPolicy {
    fn family(&self) -> &'static str {
        "allocation"
    }

    async fn decide(
        &self,
        project: &Project,
        record: &ExpiryRecord,
        today: NaiveDate,
    ) -> Result<Option<PolicyStep>> {
        let allocation = match self.allocations.current_allocation(&project.id).await {
            Ok(allocation) => allocation,
            Err(ClientError::AllocationNotFound { .. }) => {
                return Err(EngineError::NotApplicable {
                    reason: "no allocation on record".into(),
                });
            }
            Err(other) => return Err(other.into()),
        };
        if allocation.status != AllocationStatus::Approved {
            return Err(EngineError::NotApplicable {
                reason: format!("allocation is {:?}, not approved", allocation.status),
            });
        }

        let window = AllocationWindow {
            start: allocation.start,
            end: allocation.end,
        };
        Ok(
            allocation::evaluate(record, today, &window).map(|decision| PolicyStep {
                decision,
                context: json!({
                    "allocation_start": window.start.to_string(),
                    "allocation_end": window.end.to_string(),
                }),
            }),
        )
    }
}

/// Expiry driven by cumulative compute usage against a fixed cap. Applies
/// to personal trial projects only, recognized by their name prefix.
pub struct UsagePolicy {
    usage: Arc<dyn UsageService>,
    cap_hours: f64,
    trial_prefix: String,
}

impl UsagePolicy {
    /// Policy reading usage reports with the engine's cap and prefix.
    pub fn new(usage: Arc<dyn UsageService>, config: &Config) -> Self {
        Self {
            usage,
            cap_hours: config.usage_cap_hours,
            trial_prefix: config.trial_prefix.clone(),
        }
    }
}

#[async_trait]
impl ExpiryPolicy for UsagePolicy {
    fn family(&self) -> &'static str {
        "usage"
    }

    fn check_applicable(&self, project: &Project) -> Result<()> {
        if project.name.starts_with(&self.trial_prefix) {
            Ok(())
        } else {
            Err(EngineError::NotApplicable {
                reason: "not a personal trial project".into(),
            })
        }
    }

    async fn decide(
        &self,
        project: &Project,
        record: &ExpiryRecord,
        today: NaiveDate,
    ) -> Result<Option<PolicyStep>> {
        let hours = match self.usage.cumulative_compute_hours(&project.id).await {
            Ok(hours) => hours,
            Err(ClientError::NotFound { .. }) => {
                return Err(EngineError::PolicyData {
                    detail: "no usage report for this project".into(),
                });
            }
            Err(other) => return Err(other.into()),
        };
        if !hours.is_finite() || hours < 0.0 {
            return Err(EngineError::PolicyData {
                detail: format!("usage report is unusable: {hours} hours"),
            });
        }

        Ok(
            usage::evaluate(record, today, hours, self.cap_hours).map(|decision| PolicyStep {
                decision,
                context: json!({
                    "usage_hours": hours,
                    "usage_cap_hours": self.cap_hours,
                }),
            }),
        )
    }
}

/// What `process` did to one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Whether a transition was performed and persisted.
    pub advanced: bool,
    /// Status after this run.
    pub status: ExpiryStatus,
    /// Gate date after this run.
    pub next_step: Option<NaiveDate>,
}

impl Outcome {
    fn unchanged(record: &ExpiryRecord) -> Self {
        Outcome {
            advanced: false,
            status: record.status,
            next_step: record.next_step,
        }
    }
}

/// Target state for a project whose archival cannot make progress.
const PARKED: Option<(ExpiryStatus, Option<NaiveDate>)> = Some((ExpiryStatus::ArchiveError, None));

/// Drives one policy family over projects, one ladder rung at a time.
pub struct Expirer {
    policy: Arc<dyn ExpiryPolicy>,
    store: ProjectStore,
    archivers: Vec<Arc<dyn Archiver>>,
    notifications: Notifications,
    clock: Arc<dyn Clock>,
}

impl Expirer {
    /// Engine over the given policy, state store and resource families.
    pub fn new(
        policy: Arc<dyn ExpiryPolicy>,
        store: ProjectStore,
        archivers: Vec<Arc<dyn Archiver>>,
        notifications: Notifications,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policy,
            store,
            archivers,
            notifications,
            clock,
        }
    }

    /// Run one project through at most one transition.
    ///
    /// `Err(NotApplicable)` marks projects outside this policy's scope; the
    /// runner counts them as skips. Any other error leaves the persisted
    /// state untouched for a retry on the next invocation.
    #[instrument(skip(self, project), fields(project_id = %project.id, policy = self.policy.family()))]
    pub async fn process(&self, project: &Project) -> Result<Outcome> {
        if !project.enabled {
            return Err(EngineError::NotApplicable {
                reason: "project is disabled".into(),
            });
        }
        if project.has_ticket_hold() {
            return Err(EngineError::NotApplicable {
                reason: "expiry ticket hold is set".into(),
            });
        }
        if !project.has_active_owner() {
            return Err(EngineError::NotApplicable {
                reason: "no active owner to notify".into(),
            });
        }
        self.policy.check_applicable(project)?;

        let record = self.store.load(project).await?;
        if record.status == ExpiryStatus::Admin {
            return Err(EngineError::NotApplicable {
                reason: "operator hold".into(),
            });
        }

        let today = self.clock.today();
        let step = match self.policy.decide(project, &record, today).await {
            Ok(step) => step,
            Err(EngineError::PolicyData { detail }) => {
                warn!(%detail, "policy data unusable, holding project in place");
                return Ok(Outcome::unchanged(&record));
            }
            Err(other) => return Err(other),
        };
        let Some(step) = step else {
            debug!(status = %record.status, "settled, nothing due today");
            return Ok(Outcome::unchanged(&record));
        };

        info!(
            action = ?step.decision.action,
            from = %record.status,
            to = %step.decision.status,
            next_step = ?step.decision.next_step,
            "transition due"
        );

        let persisted = match self.execute(project, &step.decision).await {
            Ok(persisted) => persisted,
            Err(error) => {
                error!(
                    action = ?step.decision.action,
                    %error,
                    "action failed, persisted state left unchanged"
                );
                return Err(error);
            }
        };
        let Some((status, next_step)) = persisted else {
            return Ok(Outcome::unchanged(&record));
        };

        self.store.persist(project, status, next_step).await?;
        if status != record.status {
            self.notifications
                .stage_changed(project, status, next_step, step.context)
                .await;
        }

        Ok(Outcome {
            advanced: true,
            status,
            next_step,
        })
    }

    /// Perform the decided action. Returns the state to persist, or `None`
    /// when the record must stay as it is (archival still in flight).
    async fn execute(
        &self,
        project: &Project,
        decision: &Decision,
    ) -> Result<Option<(ExpiryStatus, Option<NaiveDate>)>> {
        let target = Some((decision.status, decision.next_step));
        match decision.action {
            PolicyAction::SendWarning => Ok(target),
            PolicyAction::RestrictQuotas => {
                for archiver in &self.archivers {
                    archiver.zero_quota(project).await?;
                }
                Ok(target)
            }
            PolicyAction::StopResources => {
                for archiver in &self.archivers {
                    archiver.stop_resources(project).await?;
                }
                Ok(target)
            }
            PolicyAction::StartArchive => {
                if self.request_archives(project).await? {
                    Ok(target)
                } else {
                    Ok(PARKED)
                }
            }
            PolicyAction::PollArchive => {
                let mut outcome = ArchiveOutcome::Complete;
                for archiver in &self.archivers {
                    outcome = outcome.combine(archiver.archive_status(project).await?);
                }
                match outcome {
                    ArchiveOutcome::Complete => {
                        info!("every archive is complete");
                        Ok(target)
                    }
                    ArchiveOutcome::InProgress => {
                        debug!("archives still uploading, checking again next run");
                        Ok(None)
                    }
                    ArchiveOutcome::Incomplete => {
                        if self.request_archives(project).await? {
                            Ok(None)
                        } else {
                            Ok(PARKED)
                        }
                    }
                    ArchiveOutcome::Failed(reason) => {
                        warn!(%reason, "archival failed, parking project for an operator");
                        Ok(PARKED)
                    }
                }
            }
            PolicyAction::ForceArchived => {
                info!("archiving deadline passed, advancing with whatever archives exist");
                Ok(target)
            }
            PolicyAction::Delete => {
                for archiver in &self.archivers {
                    archiver.delete_resources(project, true).await?;
                }
                for archiver in &self.archivers {
                    archiver.delete_archives(project).await?;
                }
                self.store.disable(project).await?;
                Ok(target)
            }
        }
    }

    /// Ask every family to request its missing archives. `Ok(false)` means
    /// a resource ran out of attempts and the project must be parked.
    async fn request_archives(&self, project: &Project) -> Result<bool> {
        for archiver in &self.archivers {
            match archiver.archive_resources(project).await {
                Ok(()) => {}
                Err(EngineError::ArchiveExhausted {
                    resource_id,
                    attempts,
                }) => {
                    warn!(
                        %resource_id,
                        attempts,
                        "archive attempts exhausted, parking project for an operator"
                    );
                    return Ok(false);
                }
                Err(other) => return Err(other),
            }
        }
        Ok(true)
    }
}
