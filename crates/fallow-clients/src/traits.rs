// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service trait definitions.
//!
//! Each external resource manager the engine talks to is abstracted behind
//! one trait. Real deployments implement these against their cloud APIs;
//! [`crate::mock`] provides in-memory implementations for tests and
//! rehearsal runs.
//!
//! Implementations are expected to make mutating calls idempotent where the
//! backing API allows it (stopping a stopped server, zeroing a zero quota),
//! because the engine retries whole transitions after partial failures.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use fallow_core::{ExpiryStatus, Project};

use crate::types::{Allocation, ImageRecord, Server, ServerAction, StorageContainer, Volume};

/// Errors from service operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The allocation system has no record for the project.
    #[error("no allocation found for project '{project_id}'")]
    AllocationNotFound {
        /// Project that was looked up.
        project_id: String,
    },

    /// A referenced object does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Object kind, e.g. `project` or `server`.
        kind: &'static str,
        /// Identifier that missed.
        id: String,
    },

    /// The object exists but refuses the operation right now.
    #[error("{kind} '{id}' rejected the operation: {reason}")]
    Conflict {
        /// Object kind.
        kind: &'static str,
        /// Identifier.
        id: String,
        /// Manager-supplied reason.
        reason: String,
    },

    /// The service could not be reached or answered garbage.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Identity service: the system of record for projects and their expiry
/// fields.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Fetch a single project by id.
    async fn get_project(&self, project_id: &str) -> Result<Project>;

    /// List every project in scope for expiry processing.
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Write the expiry status and gate date. A `None` date clears the
    /// stored field.
    async fn set_expiry(
        &self,
        project_id: &str,
        status: ExpiryStatus,
        next_step: Option<NaiveDate>,
    ) -> Result<()>;

    /// Erase the previous-generation expiry fields after their values have
    /// been written forward.
    async fn clear_legacy_expiry(&self, project_id: &str) -> Result<()>;

    /// Disable the project so it disappears from normal user view.
    async fn disable_project(&self, project_id: &str) -> Result<()>;
}

/// Allocation system: approved time windows per project.
#[async_trait]
pub trait AllocationService: Send + Sync {
    /// The project's current allocation, or
    /// [`ClientError::AllocationNotFound`].
    async fn current_allocation(&self, project_id: &str) -> Result<Allocation>;
}

/// Usage reporting: cumulative consumption per project.
#[async_trait]
pub trait UsageService: Send + Sync {
    /// Total compute hours the project has ever consumed.
    async fn cumulative_compute_hours(&self, project_id: &str) -> Result<f64>;
}

/// Compute manager: servers, their metadata and quotas.
#[async_trait]
pub trait ComputeService: Send + Sync {
    /// All servers owned by the project.
    async fn list_servers(&self, project_id: &str) -> Result<Vec<Server>>;

    /// Lock a server against user-initiated changes. Idempotent.
    async fn lock_server(&self, server_id: &str) -> Result<()>;

    /// Request a server shutdown. Idempotent on already-stopped servers.
    async fn stop_server(&self, server_id: &str) -> Result<()>;

    /// Request a named image of the server. Returns the new image id.
    async fn create_server_image(&self, server_id: &str, image_name: &str) -> Result<String>;

    /// Set one metadata key on a server.
    async fn set_server_metadata(&self, server_id: &str, key: &str, value: &str) -> Result<()>;

    /// Action history, newest first.
    async fn list_server_actions(&self, server_id: &str) -> Result<Vec<ServerAction>>;

    /// Delete a server outright.
    async fn delete_server(&self, server_id: &str) -> Result<()>;

    /// Zero every compute quota of the project.
    async fn zero_quota(&self, project_id: &str) -> Result<()>;
}

/// Image catalog: archive artifacts.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// All images owned by the project.
    async fn list_project_images(&self, project_id: &str) -> Result<Vec<ImageRecord>>;

    /// Delete an image by id.
    async fn delete_image(&self, image_id: &str) -> Result<()>;
}

/// Block storage manager: volumes and their quotas.
#[async_trait]
pub trait BlockStorageService: Send + Sync {
    /// All volumes owned by the project.
    async fn list_volumes(&self, project_id: &str) -> Result<Vec<Volume>>;

    /// Delete a volume outright.
    async fn delete_volume(&self, volume_id: &str) -> Result<()>;

    /// Zero every block storage quota of the project.
    async fn zero_quota(&self, project_id: &str) -> Result<()>;
}

/// Object storage manager: containers and their quotas.
#[async_trait]
pub trait ObjectStorageService: Send + Sync {
    /// All containers owned by the project.
    async fn list_containers(&self, project_id: &str) -> Result<Vec<StorageContainer>>;

    /// Delete a container and everything inside it.
    async fn delete_container(&self, project_id: &str, name: &str) -> Result<()>;

    /// Zero the object storage quota of the project.
    async fn zero_quota(&self, project_id: &str) -> Result<()>;
}

/// Outbound owner notifications.
///
/// `stage` is the persisted status string the project just moved to; the
/// context carries whatever the policy wants rendered into the message.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one notification about a stage change.
    async fn notify(&self, project: &Project, stage: &str, context: &serde_json::Value)
    -> Result<()>;
}
