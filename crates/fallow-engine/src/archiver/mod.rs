// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-family resource archivers.
//!
//! Each resource family (compute instances, volumes, object storage)
//! implements the same capability surface; the expirer fans every action
//! out across all registered archivers. Families that cannot do something
//! implement the call as an explicit no-op rather than an error, so the
//! fan-out never needs family-specific branches.
//!
//! | Archiver | zero quota | stop | archive | delete |
//! |----------|------------|------|---------|--------|
//! | [`InstanceArchiver`] | yes | stop + lock | image snapshot | action-history gated |
//! | [`VolumeArchiver`] | yes | no-op | no-op | forced only |
//! | [`ObjectStoreArchiver`] | yes | no-op | no-op | forced only |

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use fallow_core::Project;

use crate::error::Result;

mod compute;
mod object;
mod volume;

pub use compute::InstanceArchiver;
pub use object::ObjectStoreArchiver;
pub use volume::VolumeArchiver;

/// Progress of a project's archival within one resource family.
///
/// Outcomes form a severity order; combining keeps the worse one, so a
/// project-wide outcome is the worst of its families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Every resource has a completed artifact, or none needs one.
    Complete,
    /// At least one artifact is still uploading. Wait; do not retry.
    InProgress,
    /// Some resources have no live artifact and attempts remain.
    Incomplete,
    /// An artifact errored or a resource ran out of attempts.
    Failed(String),
}

impl ArchiveOutcome {
    fn rank(&self) -> u8 {
        match self {
            ArchiveOutcome::Complete => 0,
            ArchiveOutcome::InProgress => 1,
            ArchiveOutcome::Incomplete => 2,
            ArchiveOutcome::Failed(_) => 3,
        }
    }

    /// Worse of the two outcomes. The first failure reason wins.
    pub fn combine(self, other: ArchiveOutcome) -> ArchiveOutcome {
        if other.rank() > self.rank() { other } else { self }
    }
}

/// Capability surface the expirer drives for one resource family.
///
/// Implementations isolate per-resource failures: a resource that cannot be
/// processed is logged and skipped, the rest of the family is still
/// attempted, and the call ends with
/// [`EngineError::ResourceFailures`](crate::error::EngineError) so the
/// project's state does not advance past work that was not done.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Family tag used in logs and error messages.
    fn family(&self) -> &'static str;

    /// Zero every quota of this family so nothing new can be created.
    async fn zero_quota(&self, project: &Project) -> Result<()>;

    /// Stop running resources and lock them against user restarts.
    async fn stop_resources(&self, project: &Project) -> Result<()>;

    /// Request archive artifacts for resources that lack a live one,
    /// advancing each resource's attempt counter.
    async fn archive_resources(&self, project: &Project) -> Result<()>;

    /// Inspect artifact states without mutating anything.
    async fn archive_status(&self, project: &Project) -> Result<ArchiveOutcome>;

    /// Delete the family's resources. Unforced deletion only removes
    /// resources shut down by an administrative action longer ago than the
    /// retention window; `force` removes everything.
    async fn delete_resources(&self, project: &Project, force: bool) -> Result<()>;

    /// Delete the family's archive artifacts.
    async fn delete_archives(&self, project: &Project) -> Result<()>;
}

/// Wrapper that logs mutating calls instead of making them.
///
/// Read-only calls pass through, so a dry run reports real archive
/// progress while guaranteeing that no resource is touched.
pub struct DryRunArchiver {
    inner: Arc<dyn Archiver>,
}

impl DryRunArchiver {
    /// Wrap an archiver so its mutations become log lines.
    pub fn wrap(inner: Arc<dyn Archiver>) -> Arc<dyn Archiver> {
        Arc::new(DryRunArchiver { inner })
    }
}

#[async_trait]
impl Archiver for DryRunArchiver {
    fn family(&self) -> &'static str {
        self.inner.family()
    }

    async fn zero_quota(&self, project: &Project) -> Result<()> {
        info!(
            project_id = %project.id,
            family = self.family(),
            "dry run: would zero quotas"
        );
        Ok(())
    }

    async fn stop_resources(&self, project: &Project) -> Result<()> {
        info!(
            project_id = %project.id,
            family = self.family(),
            "dry run: would stop resources"
        );
        Ok(())
    }

    async fn archive_resources(&self, project: &Project) -> Result<()> {
        info!(
            project_id = %project.id,
            family = self.family(),
            "dry run: would request archives"
        );
        Ok(())
    }

    async fn archive_status(&self, project: &Project) -> Result<ArchiveOutcome> {
        self.inner.archive_status(project).await
    }

    async fn delete_resources(&self, project: &Project, force: bool) -> Result<()> {
        info!(
            project_id = %project.id,
            family = self.family(),
            force,
            "dry run: would delete resources"
        );
        Ok(())
    }

    async fn delete_archives(&self, project: &Project) -> Result<()> {
        info!(
            project_id = %project.id,
            family = self.family(),
            "dry run: would delete archives"
        );
        Ok(())
    }
}
