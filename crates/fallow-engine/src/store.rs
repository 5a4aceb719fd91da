// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Expiry state persistence against the identity service.
//!
//! All writes go through here so the dry-run guard sits in exactly one
//! place. Reads resolve the two field generations; when only legacy fields
//! carry values they are written forward once and erased.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use fallow_clients::IdentityService;
use fallow_core::{ExpiryRecord, ExpiryStatus, Project};

use crate::error::{EngineError, Result};

/// Reads and writes a project's expiry fields.
#[derive(Clone)]
pub struct ProjectStore {
    identity: Arc<dyn IdentityService>,
    live: bool,
}

impl ProjectStore {
    /// Store over the given identity service. With `live` false every write
    /// is logged and dropped.
    pub fn new(identity: Arc<dyn IdentityService>, live: bool) -> Self {
        Self { identity, live }
    }

    /// Resolve a project's typed expiry record, migrating legacy fields
    /// forward when they are the only source.
    pub async fn load(&self, project: &Project) -> Result<ExpiryRecord> {
        let record = match ExpiryRecord::resolve(project) {
            Ok(record) => record,
            Err(error) => {
                warn!(project_id = %project.id, %error, "skipping project with unusable status");
                return Err(EngineError::NotApplicable {
                    reason: error.to_string(),
                });
            }
        };

        if project.has_stale_legacy_fields() {
            if self.live {
                self.identity
                    .set_expiry(&project.id, record.status, record.next_step)
                    .await?;
                self.identity.clear_legacy_expiry(&project.id).await?;
                info!(
                    project_id = %project.id,
                    status = %record.status,
                    "migrated legacy expiry fields forward"
                );
            } else {
                info!(
                    project_id = %project.id,
                    status = %record.status,
                    "dry run: would migrate legacy expiry fields forward"
                );
            }
        }

        Ok(record)
    }

    /// Persist a new status and gate date.
    pub async fn persist(
        &self,
        project: &Project,
        status: ExpiryStatus,
        next_step: Option<NaiveDate>,
    ) -> Result<()> {
        if !self.live {
            info!(
                project_id = %project.id,
                status = %status,
                next_step = ?next_step,
                "dry run: would persist expiry state"
            );
            return Ok(());
        }
        self.identity
            .set_expiry(&project.id, status, next_step)
            .await?;
        info!(
            project_id = %project.id,
            status = %status,
            next_step = ?next_step,
            "persisted expiry state"
        );
        Ok(())
    }

    /// Disable the project in the identity service.
    pub async fn disable(&self, project: &Project) -> Result<()> {
        if !self.live {
            info!(project_id = %project.id, "dry run: would disable project");
            return Ok(());
        }
        self.identity.disable_project(&project.id).await?;
        info!(project_id = %project.id, "project disabled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fallow_clients::mock::MockIdentity;

    fn legacy_project() -> Project {
        let mut project = Project::new("p-1", "research-lab");
        project.legacy_status = Some("restricted".into());
        project.legacy_expiry_date = Some("2025-06-30".into());
        project
    }

    #[tokio::test]
    async fn test_live_load_migrates_legacy_fields() {
        let identity = Arc::new(MockIdentity::new(vec![legacy_project()]));
        let store = ProjectStore::new(identity.clone(), true);

        let record = store.load(&legacy_project()).await.unwrap();
        assert_eq!(record.status, ExpiryStatus::Restricted);

        let migrated = identity.project("p-1").await.unwrap();
        assert_eq!(migrated.expiry_status.as_deref(), Some("restricted"));
        assert_eq!(migrated.expiry_next_step.as_deref(), Some("2025-06-30"));
        assert_eq!(migrated.legacy_status, None);
        assert_eq!(migrated.legacy_expiry_date, None);
    }

    #[tokio::test]
    async fn test_dry_run_load_leaves_legacy_fields_alone() {
        let identity = Arc::new(MockIdentity::new(vec![legacy_project()]));
        let store = ProjectStore::new(identity.clone(), false);

        let record = store.load(&legacy_project()).await.unwrap();
        assert_eq!(record.status, ExpiryStatus::Restricted);

        let untouched = identity.project("p-1").await.unwrap();
        assert_eq!(untouched.expiry_status, None);
        assert_eq!(untouched.legacy_status.as_deref(), Some("restricted"));
        assert!(identity.expiry_writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_unusable_status_is_a_skip_not_a_default() {
        let mut project = Project::new("p-1", "research-lab");
        project.expiry_status = Some("zombie".into());
        let identity = Arc::new(MockIdentity::new(vec![project.clone()]));
        let store = ProjectStore::new(identity, true);

        let err = store.load(&project).await.unwrap_err();
        assert!(matches!(err, EngineError::NotApplicable { .. }));
    }

    #[tokio::test]
    async fn test_dry_run_persist_writes_nothing() {
        let identity = Arc::new(MockIdentity::new(vec![Project::new("p-1", "lab")]));
        let store = ProjectStore::new(identity.clone(), false);

        store
            .persist(&Project::new("p-1", "lab"), ExpiryStatus::Warning, None)
            .await
            .unwrap();
        assert!(identity.expiry_writes().await.is_empty());
    }
}
