// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire records returned by the resource-manager services.
//!
//! These are deliberately small: only the fields the expiry engine reads.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Server metadata key tracking how many archive attempts have been made.
pub const ARCHIVE_ATTEMPTS_KEY: &str = "archive_attempts";

/// Power/provision state of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    /// Running.
    Active,
    /// Shut down.
    Shutoff,
    /// Suspended to disk.
    Suspended,
    /// The compute manager gave up on it.
    Error,
}

/// In-flight operation on a server. While one is set the server must not be
/// touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// A snapshot is being taken.
    Snapshotting,
    /// The server is moving hosts.
    Migrating,
    /// The server is being torn down.
    Deleting,
}

/// A compute server owned by a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    /// Compute manager id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Power/provision state.
    pub status: ServerStatus,
    /// In-flight operation, if any.
    #[serde(default)]
    pub task_state: Option<TaskState>,
    /// Locked servers reject user-initiated state changes.
    #[serde(default)]
    pub locked: bool,
    /// Free-form key/value metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Server {
    /// Deterministic name of this server's archive artifact.
    pub fn archive_name(&self) -> String {
        format!("{}_archive", self.id)
    }

    /// Archive attempts recorded so far. Absent or garbled metadata counts
    /// as zero.
    pub fn archive_attempts(&self) -> u32 {
        self.metadata
            .get(ARCHIVE_ATTEMPTS_KEY)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// One entry from a server's action history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerAction {
    /// Action verb as the compute manager spells it (`stop`, `suspend`, ...).
    pub action: String,
    /// When the action started.
    pub started_at: DateTime<Utc>,
}

/// Lifecycle state of an image artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// Accepted, upload not started.
    Queued,
    /// Upload in progress.
    Saving,
    /// Complete and usable.
    Active,
    /// The image service gave up on it.
    Error,
}

impl ImageStatus {
    /// True while the artifact occupies its name: anything not errored.
    pub fn is_live(&self) -> bool {
        !matches!(self, ImageStatus::Error)
    }

    /// True once the artifact is fully stored.
    pub fn is_complete(&self) -> bool {
        matches!(self, ImageStatus::Active)
    }
}

/// An image artifact in the image catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Image catalog id.
    pub id: String,
    /// Artifact name; archives use [`Server::archive_name`].
    pub name: String,
    /// Lifecycle state.
    pub status: ImageStatus,
    /// Owning project.
    pub project_id: String,
}

/// A block storage volume owned by a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    /// Block storage id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// An object storage container owned by a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageContainer {
    /// Container name, unique within the project.
    pub name: String,
    /// Number of objects inside.
    #[serde(default)]
    pub object_count: u64,
}

/// Review state of an allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    /// Granted; the window is authoritative.
    Approved,
    /// Still under review.
    Pending,
    /// Rejected.
    Declined,
}

/// A project's allocation of time as the allocation system sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Project the allocation belongs to.
    pub project_id: String,
    /// Review state. Only approved allocations drive expiry.
    pub status: AllocationStatus,
    /// First day of the approved window.
    pub start: NaiveDate,
    /// Last day of the approved window.
    pub end: NaiveDate,
}
