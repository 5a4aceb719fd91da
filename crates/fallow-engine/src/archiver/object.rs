// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Archiver for object storage containers.
//!
//! Like volumes, containers are not snapshotted. The family zeroes quotas
//! alongside the others and removes every container at final deletion.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use fallow_clients::ObjectStorageService;
use fallow_core::Project;

use crate::archiver::{ArchiveOutcome, Archiver};
use crate::error::{EngineError, Result};

/// Archiver over the object storage service.
pub struct ObjectStoreArchiver {
    store: Arc<dyn ObjectStorageService>,
}

impl ObjectStoreArchiver {
    /// Archiver backed by the given object storage client.
    pub fn new(store: Arc<dyn ObjectStorageService>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Archiver for ObjectStoreArchiver {
    fn family(&self) -> &'static str {
        "object"
    }

    async fn zero_quota(&self, project: &Project) -> Result<()> {
        self.store.zero_quota(&project.id).await?;
        info!(project_id = %project.id, "object storage quotas zeroed");
        Ok(())
    }

    async fn stop_resources(&self, project: &Project) -> Result<()> {
        debug!(project_id = %project.id, "containers have nothing to stop");
        Ok(())
    }

    async fn archive_resources(&self, project: &Project) -> Result<()> {
        debug!(project_id = %project.id, "containers are not archived");
        Ok(())
    }

    async fn archive_status(&self, _project: &Project) -> Result<ArchiveOutcome> {
        Ok(ArchiveOutcome::Complete)
    }

    async fn delete_resources(&self, project: &Project, force: bool) -> Result<()> {
        if !force {
            debug!(project_id = %project.id, "containers are only deleted at project teardown");
            return Ok(());
        }
        let containers = self.store.list_containers(&project.id).await?;
        let total = containers.len();
        let mut failed = 0;

        for container in containers {
            match self.store.delete_container(&project.id, &container.name).await {
                Ok(()) => {
                    info!(
                        container = %container.name,
                        objects = container.object_count,
                        "container deleted"
                    );
                }
                Err(error) => {
                    error!(container = %container.name, %error, "failed to delete container");
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
        debug!(project_id = %project.id, "containers keep no archives");
        Ok(())
    }
}
