// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory service implementations for tests and rehearsal runs.
//!
//! [`MockCloud`] implements all four resource-manager traits over one shared
//! state so cross-service flows hold together: a snapshot requested through
//! the compute trait shows up in the image catalog, a deleted server leaves
//! its archive behind. Every mutating call is appended to a log that tests
//! use to assert what a run touched (and that dry runs touch nothing).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use fallow_core::{ExpiryStatus, Project};

use crate::traits::*;
use crate::types::{
    Allocation, ImageRecord, ImageStatus, Server, ServerAction, ServerStatus, StorageContainer,
    Volume,
};

/// One recorded expiry write against the identity mock.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryWrite {
    /// Project written to.
    pub project_id: String,
    /// Status that was persisted.
    pub status: ExpiryStatus,
    /// Gate date that was persisted.
    pub next_step: Option<NaiveDate>,
}

/// Identity service over an in-memory project table.
pub struct MockIdentity {
    projects: Mutex<BTreeMap<String, Project>>,
    writes: Mutex<Vec<ExpiryWrite>>,
    /// If true, every write fails with a transport error.
    pub fail_writes: bool,
}

impl MockIdentity {
    /// Identity service holding the given projects.
    pub fn new(projects: Vec<Project>) -> Self {
        Self {
            projects: Mutex::new(projects.into_iter().map(|p| (p.id.clone(), p)).collect()),
            writes: Mutex::new(Vec::new()),
            fail_writes: false,
        }
    }

    /// Identity service whose writes always fail.
    pub fn failing_writes(projects: Vec<Project>) -> Self {
        Self {
            fail_writes: true,
            ..Self::new(projects)
        }
    }

    /// Current copy of a project, if present.
    pub async fn project(&self, project_id: &str) -> Option<Project> {
        self.projects.lock().await.get(project_id).cloned()
    }

    /// Every expiry write made so far, in order.
    pub async fn expiry_writes(&self) -> Vec<ExpiryWrite> {
        self.writes.lock().await.clone()
    }
}

#[async_trait]
impl IdentityService for MockIdentity {
    async fn get_project(&self, project_id: &str) -> Result<Project> {
        self.projects
            .lock()
            .await
            .get(project_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                kind: "project",
                id: project_id.to_string(),
            })
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.projects.lock().await.values().cloned().collect())
    }

    async fn set_expiry(
        &self,
        project_id: &str,
        status: ExpiryStatus,
        next_step: Option<NaiveDate>,
    ) -> Result<()> {
        if self.fail_writes {
            return Err(ClientError::Transport("identity writes disabled".into()));
        }
        let mut projects = self.projects.lock().await;
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| ClientError::NotFound {
                kind: "project",
                id: project_id.to_string(),
            })?;
        project.expiry_status = Some(status.as_str().to_string());
        project.expiry_next_step = next_step.map(|d| d.to_string());
        self.writes.lock().await.push(ExpiryWrite {
            project_id: project_id.to_string(),
            status,
            next_step,
        });
        Ok(())
    }

    async fn clear_legacy_expiry(&self, project_id: &str) -> Result<()> {
        if self.fail_writes {
            return Err(ClientError::Transport("identity writes disabled".into()));
        }
        let mut projects = self.projects.lock().await;
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| ClientError::NotFound {
                kind: "project",
                id: project_id.to_string(),
            })?;
        project.legacy_status = None;
        project.legacy_expiry_date = None;
        Ok(())
    }

    async fn disable_project(&self, project_id: &str) -> Result<()> {
        if self.fail_writes {
            return Err(ClientError::Transport("identity writes disabled".into()));
        }
        let mut projects = self.projects.lock().await;
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| ClientError::NotFound {
                kind: "project",
                id: project_id.to_string(),
            })?;
        project.enabled = false;
        Ok(())
    }
}

/// Allocation system over an in-memory table.
pub struct MockAllocations {
    allocations: Mutex<BTreeMap<String, Allocation>>,
}

impl MockAllocations {
    /// Allocation system holding the given allocations, keyed by project.
    pub fn new(allocations: Vec<Allocation>) -> Self {
        Self {
            allocations: Mutex::new(
                allocations
                    .into_iter()
                    .map(|a| (a.project_id.clone(), a))
                    .collect(),
            ),
        }
    }

    /// Insert or replace a project's allocation.
    pub async fn set(&self, allocation: Allocation) {
        self.allocations
            .lock()
            .await
            .insert(allocation.project_id.clone(), allocation);
    }
}

#[async_trait]
impl AllocationService for MockAllocations {
    async fn current_allocation(&self, project_id: &str) -> Result<Allocation> {
        self.allocations
            .lock()
            .await
            .get(project_id)
            .cloned()
            .ok_or_else(|| ClientError::AllocationNotFound {
                project_id: project_id.to_string(),
            })
    }
}

/// Usage reporting over an in-memory table.
pub struct MockUsage {
    hours: Mutex<BTreeMap<String, f64>>,
}

impl MockUsage {
    /// Usage service holding the given `(project_id, hours)` pairs.
    pub fn new(reports: Vec<(String, f64)>) -> Self {
        Self {
            hours: Mutex::new(reports.into_iter().collect()),
        }
    }

    /// Set a project's cumulative hours.
    pub async fn set(&self, project_id: &str, hours: f64) {
        self.hours
            .lock()
            .await
            .insert(project_id.to_string(), hours);
    }
}

#[async_trait]
impl UsageService for MockUsage {
    async fn cumulative_compute_hours(&self, project_id: &str) -> Result<f64> {
        self.hours
            .lock()
            .await
            .get(project_id)
            .copied()
            .ok_or_else(|| ClientError::NotFound {
                kind: "usage report",
                id: project_id.to_string(),
            })
    }
}

struct OwnedServer {
    project_id: String,
    server: Server,
}

struct OwnedVolume {
    project_id: String,
    volume: Volume,
}

#[derive(Default)]
struct CloudState {
    servers: BTreeMap<String, OwnedServer>,
    actions: BTreeMap<String, Vec<ServerAction>>,
    images: BTreeMap<String, ImageRecord>,
    volumes: BTreeMap<String, OwnedVolume>,
    containers: BTreeMap<String, Vec<StorageContainer>>,
    zeroed: Vec<(&'static str, String)>,
    mutations: Vec<String>,
}

/// In-memory cloud implementing the compute, image, block storage, and
/// object storage traits over one shared state.
pub struct MockCloud {
    state: Mutex<CloudState>,
    /// If false, new snapshots sit in `saving` until
    /// [`MockCloud::finish_snapshots`] is called.
    pub instant_snapshots: bool,
    /// If true, stop requests fail with a transport error.
    pub fail_stops: bool,
    /// If true, snapshot requests fail with a transport error.
    pub fail_snapshots: bool,
    /// If true, every delete fails with a transport error.
    pub fail_deletes: bool,
}

impl Default for MockCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCloud {
    /// Empty cloud where snapshots complete the moment they are requested.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CloudState::default()),
            instant_snapshots: true,
            fail_stops: false,
            fail_snapshots: false,
            fail_deletes: false,
        }
    }

    /// Empty cloud where snapshots stay in `saving` until finished
    /// explicitly.
    pub fn with_slow_snapshots() -> Self {
        Self {
            instant_snapshots: false,
            ..Self::new()
        }
    }

    /// Add a server under a project.
    pub async fn add_server(&self, project_id: &str, server: Server) {
        self.state.lock().await.servers.insert(
            server.id.clone(),
            OwnedServer {
                project_id: project_id.to_string(),
                server,
            },
        );
    }

    /// Add a volume under a project.
    pub async fn add_volume(&self, project_id: &str, volume: Volume) {
        self.state.lock().await.volumes.insert(
            volume.id.clone(),
            OwnedVolume {
                project_id: project_id.to_string(),
                volume,
            },
        );
    }

    /// Add a container under a project.
    pub async fn add_container(&self, project_id: &str, container: StorageContainer) {
        self.state
            .lock()
            .await
            .containers
            .entry(project_id.to_string())
            .or_default()
            .push(container);
    }

    /// Add an image record directly to the catalog.
    pub async fn add_image(&self, image: ImageRecord) {
        self.state.lock().await.images.insert(image.id.clone(), image);
    }

    /// Append an entry to a server's action history.
    pub async fn record_action(&self, server_id: &str, action: &str, started_at: DateTime<Utc>) {
        self.state
            .lock()
            .await
            .actions
            .entry(server_id.to_string())
            .or_default()
            .push(ServerAction {
                action: action.to_string(),
                started_at,
            });
    }

    /// Move every queued or saving image to `active`.
    pub async fn finish_snapshots(&self) {
        for image in self.state.lock().await.images.values_mut() {
            if matches!(image.status, ImageStatus::Queued | ImageStatus::Saving) {
                image.status = ImageStatus::Active;
            }
        }
    }

    /// Mark every image with the given name as errored.
    pub async fn fail_image(&self, name: &str) {
        for image in self.state.lock().await.images.values_mut() {
            if image.name == name {
                image.status = ImageStatus::Error;
            }
        }
    }

    /// Current copy of a server, if present.
    pub async fn server(&self, server_id: &str) -> Option<Server> {
        self.state
            .lock()
            .await
            .servers
            .get(server_id)
            .map(|o| o.server.clone())
    }

    /// All images carrying the given name.
    pub async fn images_named(&self, name: &str) -> Vec<ImageRecord> {
        self.state
            .lock()
            .await
            .images
            .values()
            .filter(|i| i.name == name)
            .cloned()
            .collect()
    }

    /// `(service, project)` pairs whose quotas were zeroed, in order.
    pub async fn zeroed_quotas(&self) -> Vec<(&'static str, String)> {
        self.state.lock().await.zeroed.clone()
    }

    /// Every mutating call made so far, in order.
    pub async fn mutation_log(&self) -> Vec<String> {
        self.state.lock().await.mutations.clone()
    }
}

#[async_trait]
impl ComputeService for MockCloud {
    async fn list_servers(&self, project_id: &str) -> Result<Vec<Server>> {
        Ok(self
            .state
            .lock()
            .await
            .servers
            .values()
            .filter(|o| o.project_id == project_id)
            .map(|o| o.server.clone())
            .collect())
    }

    async fn lock_server(&self, server_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let owned = state
            .servers
            .get_mut(server_id)
            .ok_or_else(|| ClientError::NotFound {
                kind: "server",
                id: server_id.to_string(),
            })?;
        owned.server.locked = true;
        state.mutations.push(format!("compute.lock {server_id}"));
        Ok(())
    }

    async fn stop_server(&self, server_id: &str) -> Result<()> {
        if self.fail_stops {
            return Err(ClientError::Transport("compute manager unreachable".into()));
        }
        let mut state = self.state.lock().await;
        let owned = state
            .servers
            .get_mut(server_id)
            .ok_or_else(|| ClientError::NotFound {
                kind: "server",
                id: server_id.to_string(),
            })?;
        owned.server.status = ServerStatus::Shutoff;
        owned.server.task_state = None;
        state
            .actions
            .entry(server_id.to_string())
            .or_default()
            .push(ServerAction {
                action: "stop".to_string(),
                started_at: Utc::now(),
            });
        state.mutations.push(format!("compute.stop {server_id}"));
        Ok(())
    }

    async fn create_server_image(&self, server_id: &str, image_name: &str) -> Result<String> {
        if self.fail_snapshots {
            return Err(ClientError::Transport("image upload refused".into()));
        }
        let mut state = self.state.lock().await;
        let project_id = state
            .servers
            .get(server_id)
            .map(|o| o.project_id.clone())
            .ok_or_else(|| ClientError::NotFound {
                kind: "server",
                id: server_id.to_string(),
            })?;
        let image_id = Uuid::new_v4().to_string();
        let status = if self.instant_snapshots {
            ImageStatus::Active
        } else {
            ImageStatus::Saving
        };
        state.images.insert(
            image_id.clone(),
            ImageRecord {
                id: image_id.clone(),
                name: image_name.to_string(),
                status,
                project_id,
            },
        );
        state
            .mutations
            .push(format!("compute.create_image {server_id} {image_name}"));
        Ok(image_id)
    }

    async fn set_server_metadata(&self, server_id: &str, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let owned = state
            .servers
            .get_mut(server_id)
            .ok_or_else(|| ClientError::NotFound {
                kind: "server",
                id: server_id.to_string(),
            })?;
        owned
            .server
            .metadata
            .insert(key.to_string(), value.to_string());
        state
            .mutations
            .push(format!("compute.set_metadata {server_id} {key}={value}"));
        Ok(())
    }

    async fn list_server_actions(&self, server_id: &str) -> Result<Vec<ServerAction>> {
        let state = self.state.lock().await;
        let mut actions = state.actions.get(server_id).cloned().unwrap_or_default();
        actions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(actions)
    }

    async fn delete_server(&self, server_id: &str) -> Result<()> {
        if self.fail_deletes {
            return Err(ClientError::Transport("compute manager unreachable".into()));
        }
        let mut state = self.state.lock().await;
        state
            .servers
            .remove(server_id)
            .ok_or_else(|| ClientError::NotFound {
                kind: "server",
                id: server_id.to_string(),
            })?;
        state.actions.remove(server_id);
        state
            .mutations
            .push(format!("compute.delete_server {server_id}"));
        Ok(())
    }

    async fn zero_quota(&self, project_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.zeroed.push(("compute", project_id.to_string()));
        state
            .mutations
            .push(format!("compute.zero_quota {project_id}"));
        Ok(())
    }
}

#[async_trait]
impl ImageService for MockCloud {
    async fn list_project_images(&self, project_id: &str) -> Result<Vec<ImageRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .images
            .values()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn delete_image(&self, image_id: &str) -> Result<()> {
        if self.fail_deletes {
            return Err(ClientError::Transport("image catalog unreachable".into()));
        }
        let mut state = self.state.lock().await;
        state
            .images
            .remove(image_id)
            .ok_or_else(|| ClientError::NotFound {
                kind: "image",
                id: image_id.to_string(),
            })?;
        state.mutations.push(format!("image.delete {image_id}"));
        Ok(())
    }
}

#[async_trait]
impl BlockStorageService for MockCloud {
    async fn list_volumes(&self, project_id: &str) -> Result<Vec<Volume>> {
        Ok(self
            .state
            .lock()
            .await
            .volumes
            .values()
            .filter(|o| o.project_id == project_id)
            .map(|o| o.volume.clone())
            .collect())
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<()> {
        if self.fail_deletes {
            return Err(ClientError::Transport("block storage unreachable".into()));
        }
        let mut state = self.state.lock().await;
        state
            .volumes
            .remove(volume_id)
            .ok_or_else(|| ClientError::NotFound {
                kind: "volume",
                id: volume_id.to_string(),
            })?;
        state.mutations.push(format!("volume.delete {volume_id}"));
        Ok(())
    }

    async fn zero_quota(&self, project_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.zeroed.push(("volume", project_id.to_string()));
        state
            .mutations
            .push(format!("volume.zero_quota {project_id}"));
        Ok(())
    }
}

#[async_trait]
impl ObjectStorageService for MockCloud {
    async fn list_containers(&self, project_id: &str) -> Result<Vec<StorageContainer>> {
        Ok(self
            .state
            .lock()
            .await
            .containers
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_container(&self, project_id: &str, name: &str) -> Result<()> {
        if self.fail_deletes {
            return Err(ClientError::Transport("object storage unreachable".into()));
        }
        let mut state = self.state.lock().await;
        let containers = state
            .containers
            .get_mut(project_id)
            .ok_or_else(|| ClientError::NotFound {
                kind: "container",
                id: name.to_string(),
            })?;
        let before = containers.len();
        containers.retain(|c| c.name != name);
        if containers.len() == before {
            return Err(ClientError::NotFound {
                kind: "container",
                id: name.to_string(),
            });
        }
        state
            .mutations
            .push(format!("object.delete_container {project_id}/{name}"));
        Ok(())
    }

    async fn zero_quota(&self, project_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.zeroed.push(("object", project_id.to_string()));
        state
            .mutations
            .push(format!("object.zero_quota {project_id}"));
        Ok(())
    }
}

/// One notification captured by [`MockNotifier`].
#[derive(Debug, Clone)]
pub struct SentNotification {
    /// Project notified about.
    pub project_id: String,
    /// Stage string the notification announced.
    pub stage: String,
    /// Rendering context passed along.
    pub context: serde_json::Value,
}

/// Notifier that records instead of sending.
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<SentNotification>>,
    /// If true, every send fails with a transport error.
    pub fail: bool,
}

impl MockNotifier {
    /// Notifier that records every send.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier whose sends always fail.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Everything sent so far, in order.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(
        &self,
        project: &Project,
        stage: &str,
        context: &serde_json::Value,
    ) -> Result<()> {
        if self.fail {
            return Err(ClientError::Transport("mail relay unreachable".into()));
        }
        self.sent.lock().await.push(SentNotification {
            project_id: project.id.clone(),
            stage: stage.to_string(),
            context: context.clone(),
        });
        Ok(())
    }
}
