// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Archiver for compute instances.
//!
//! Instances are the only family with real archival: each server gets an
//! image snapshot named after its id. The attempt counter lives in server
//! metadata and is persisted before the snapshot is requested, so a crash
//! between the two never loses an attempt and a retried run never stacks a
//! second snapshot on a live one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::{debug, error, info, warn};

use fallow_clients::{
    ARCHIVE_ATTEMPTS_KEY, ComputeService, ImageRecord, ImageService, Server, ServerStatus,
};
use fallow_core::{Clock, Project};

use crate::archiver::{ArchiveOutcome, Archiver};
use crate::config::Config;
use crate::error::{EngineError, Result};

/// Action verbs that count as an administrative shutdown.
const SHUTDOWN_ACTIONS: [&str; 2] = ["stop", "suspend"];

/// Archiver over the compute and image services.
pub struct InstanceArchiver {
    compute: Arc<dyn ComputeService>,
    images: Arc<dyn ImageService>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    delete_retention: Duration,
}

impl InstanceArchiver {
    /// Archiver using the engine's attempt and retention settings.
    pub fn new(
        compute: Arc<dyn ComputeService>,
        images: Arc<dyn ImageService>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            compute,
            images,
            clock,
            max_attempts: config.max_archive_attempts,
            delete_retention: Duration::days(i64::from(config.delete_retention_days)),
        }
    }

    /// Lock the server, then ask for a shutdown.
    async fn shut_down(&self, server: &Server) -> Result<()> {
        if !server.locked {
            self.compute.lock_server(&server.id).await?;
        }
        self.compute.stop_server(&server.id).await?;
        info!(server_id = %server.id, "server stopped and locked");
        Ok(())
    }

    fn live_archive<'a>(images: &'a [ImageRecord], name: &str) -> Option<&'a ImageRecord> {
        images.iter().find(|i| i.name == name && i.status.is_live())
    }
}

#[async_trait]
impl Archiver for InstanceArchiver {
    fn family(&self) -> &'static str {
        "instance"
    }

    async fn zero_quota(&self, project: &Project) -> Result<()> {
        self.compute.zero_quota(&project.id).await?;
        info!(project_id = %project.id, "compute quotas zeroed");
        Ok(())
    }

    async fn stop_resources(&self, project: &Project) -> Result<()> {
        let servers = self.compute.list_servers(&project.id).await?;
        let total = servers.len();
        let mut failed = 0;

        for server in servers {
            if let Some(task) = server.task_state {
                debug!(server_id = %server.id, ?task, "server is mid-operation, skipping");
                continue;
            }
            match server.status {
                ServerStatus::Active => {
                    if let Err(error) = self.shut_down(&server).await {
                        error!(server_id = %server.id, %error, "failed to stop server");
                        failed += 1;
                    }
                }
                ServerStatus::Shutoff | ServerStatus::Suspended => {
                    debug!(server_id = %server.id, "server already stopped");
                }
                ServerStatus::Error => {
                    warn!(server_id = %server.id, "server in error state, leaving it alone");
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

    async fn archive_resources(&self, project: &Project) -> Result<()> {
        let servers = self.compute.list_servers(&project.id).await?;
        let images = self.images.list_project_images(&project.id).await?;
        let total = servers.len();
        let mut failed = 0;

        for server in servers {
            if let Some(task) = server.task_state {
                debug!(server_id = %server.id, ?task, "server is mid-operation, skipping");
                continue;
            }
            let archive_name = server.archive_name();
            if let Some(existing) = Self::live_archive(&images, &archive_name) {
                debug!(
                    server_id = %server.id,
                    image_id = %existing.id,
                    status = ?existing.status,
                    "live archive already exists, skipping"
                );
                continue;
            }
            if server.status == ServerStatus::Error {
                warn!(server_id = %server.id, "server in error state, cannot archive");
                continue;
            }

            let attempts = server.archive_attempts();
            if attempts >= self.max_attempts {
                return Err(EngineError::ArchiveExhausted {
                    resource_id: server.id,
                    attempts,
                });
            }
            let attempt = attempts + 1;
            if let Err(error) = self
                .compute
                .set_server_metadata(&server.id, ARCHIVE_ATTEMPTS_KEY, &attempt.to_string())
                .await
            {
                error!(server_id = %server.id, %error, "failed to record archive attempt");
                failed += 1;
                continue;
            }

            if server.status == ServerStatus::Active {
                // Snapshotting a running server is refused; stop it now and
                // take the image on a later pass.
                match self.shut_down(&server).await {
                    Ok(()) => {
                        info!(server_id = %server.id, attempt, "server still running, stopped for a later snapshot");
                    }
                    Err(error) => {
                        error!(server_id = %server.id, %error, "failed to stop server for archiving");
                        failed += 1;
                    }
                }
                continue;
            }

            match self
                .compute
                .create_server_image(&server.id, &archive_name)
                .await
            {
                Ok(image_id) => {
                    info!(server_id = %server.id, image_id, attempt, "archive snapshot requested");
                }
                Err(error) => {
                    error!(server_id = %server.id, %error, "snapshot request failed");
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

    async fn archive_status(&self, project: &Project) -> Result<ArchiveOutcome> {
        let servers = self.compute.list_servers(&project.id).await?;
        let images = self.images.list_project_images(&project.id).await?;

        let mut outcome = ArchiveOutcome::Complete;
        for server in servers {
            let archive_name = server.archive_name();
            let named: Vec<&ImageRecord> =
                images.iter().filter(|i| i.name == archive_name).collect();

            let per_server = if let Some(errored) = named
                .iter()
                .find(|i| matches!(i.status, fallow_clients::ImageStatus::Error))
            {
                ArchiveOutcome::Failed(format!(
                    "archive '{}' ({}) is errored",
                    archive_name, errored.id
                ))
            } else if named.iter().any(|i| !i.status.is_complete()) {
                ArchiveOutcome::InProgress
            } else if !named.is_empty() {
                ArchiveOutcome::Complete
            } else if server.archive_attempts() >= self.max_attempts {
                ArchiveOutcome::Failed(format!(
                    "server '{}' has no archive after {} attempts",
                    server.id,
                    server.archive_attempts()
                ))
            } else {
                ArchiveOutcome::Incomplete
            };
            outcome = outcome.combine(per_server);
        }
        Ok(outcome)
    }

    async fn delete_resources(&self, project: &Project, force: bool) -> Result<()> {
        let servers = self.compute.list_servers(&project.id).await?;
        let total = servers.len();
        let mut failed = 0;
        let now = self.clock.now();

        for server in servers {
            if !force {
                let actions = match self.compute.list_server_actions(&server.id).await {
                    Ok(actions) => actions,
                    Err(error) => {
                        error!(server_id = %server.id, %error, "cannot read action history");
                        failed += 1;
                        continue;
                    }
                };
                let Some(shutdown) = actions
                    .iter()
                    .find(|a| SHUTDOWN_ACTIONS.contains(&a.action.as_str()))
                else {
                    debug!(server_id = %server.id, "no administrative shutdown on record, keeping");
                    continue;
                };
                if now - shutdown.started_at < self.delete_retention {
                    debug!(
                        server_id = %server.id,
                        stopped_at = %shutdown.started_at,
                        "shutdown too recent, keeping"
                    );
                    continue;
                }
            }

            match self.compute.delete_server(&server.id).await {
                Ok(()) => info!(server_id = %server.id, force, "server deleted"),
                Err(error) => {
                    error!(server_id = %server.id, %error, "failed to delete server");
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
        let images = self.images.list_project_images(&project.id).await?;
        let archives: Vec<&ImageRecord> = images
            .iter()
            .filter(|i| i.name.ends_with("_archive"))
            .collect();
        let total = archives.len();
        let mut failed = 0;

        for image in archives {
            match self.images.delete_image(&image.id).await {
                Ok(()) => info!(image_id = %image.id, name = %image.name, "archive deleted"),
                Err(error) => {
                    error!(image_id = %image.id, %error, "failed to delete archive");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(EngineError::ResourceFailures {
                family: "image",
                failed,
                total,
            });
        }
        Ok(())
    }
}
