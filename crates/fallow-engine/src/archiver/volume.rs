// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Archiver for block storage volumes.
//!
//! Volumes have no snapshot pipeline here; the family participates in quota
//! zeroing and final deletion only. Data that must outlive the project is
//! expected to be written into the instance archives instead.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use fallow_clients::BlockStorageService;
use fallow_core::Project;

use crate::archiver::{ArchiveOutcome, Archiver};
use crate::error::{EngineError, Result};

/// Archiver over the block storage service.
pub struct VolumeArchiver {
    volumes: Arc<dyn BlockStorageService>,
}

impl VolumeArchiver {
    /// Archiver backed by the given block storage client.
    pub fn new(volumes: Arc<dyn BlockStorageService>) -> Self {
        Self { volumes }
    }
}

#[async_trait]
impl Archiver for VolumeArchiver {
    fn family(&self) -> &'static str {
        "volume"
    }

    async fn zero_quota(&self, project: &Project) -> Result<()> {
        self.volumes.zero_quota(&project.id).await?;
        info!(project_id = %project.id, "volume quotas zeroed");
        Ok(())
    }

    async fn stop_resources(&self, project: &Project) -> Result<()> {
        debug!(project_id = %project.id, "volumes have nothing to stop");
        Ok(())
    }

    async fn archive_resources(&self, project: &Project) -> Result<()> {
        debug!(project_id = %project.id, "volumes are not archived");
        Ok(())
    }

    async fn archive_status(&self, _project: &Project) -> Result<ArchiveOutcome> {
        Ok(ArchiveOutcome::Complete)
    }

    async fn delete_resources(&self, project: &Project, force: bool) -> Result<()> {
        if !force {
            debug!(project_id = %project.id, "volumes are only deleted at project teardown");
            return Ok(());
        }
        let volumes = self.volumes.list_volumes(&project.id).await?;
        let total = volumes.len();
        let mut failed = 0;

        for volume in volumes {
            match self.volumes.delete_volume(&volume.id).await {
                Ok(()) => info!(volume_id = %volume.id, name = %volume.name, "volume deleted"),
                Err(error) => {
                    error!(volume_id = %volume.id, %error, "failed to delete volume");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(EngineError::ResourceFailures {
                family: self.family(),
                failed,
                total,
            });
        }
        Ok(())
    }

    async fn delete_archives(&self, project: &Project) -> Result<()> {
        debug!(project_id = %project.id, "volumes keep no archives");
        Ok(())
    }
}
