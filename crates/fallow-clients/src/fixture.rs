// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Declarative service state.
//!
//! A [`FixtureState`] describes projects, allocations, usage, and cloud
//! resources in one JSON document. Seeding it produces fully wired mock
//! services; capturing reads the current state back out through the public
//! traits. The CLI uses this as its rehearsal backend, driving a real run
//! against a state snapshot instead of live services.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mock::{MockAllocations, MockCloud, MockIdentity, MockUsage};
use crate::traits::{
    AllocationService, BlockStorageService, ComputeService, IdentityService, ImageService,
    ObjectStorageService, Result, UsageService,
};
use crate::types::{Allocation, ImageRecord, Server, StorageContainer, Volume};
use fallow_core::Project;

/// A server together with the project that owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectServer {
    /// Owning project.
    pub project_id: String,
    /// The server record.
    #[serde(flatten)]
    pub server: Server,
}

/// A volume together with the project that owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectVolume {
    /// Owning project.
    pub project_id: String,
    /// The volume record.
    #[serde(flatten)]
    pub volume: Volume,
}

/// A container together with the project that owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectContainer {
    /// Owning project.
    pub project_id: String,
    /// The container record.
    #[serde(flatten)]
    pub container: StorageContainer,
}

/// One action history entry for a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedAction {
    /// Server the action ran against.
    pub server_id: String,
    /// Action verb.
    pub action: String,
    /// When the action started.
    pub started_at: DateTime<Utc>,
}

/// Complete declarative state across all services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureState {
    /// Identity service projects.
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Allocation records, keyed by their `project_id` field.
    #[serde(default)]
    pub allocations: Vec<Allocation>,
    /// Cumulative compute hours per project id.
    #[serde(default)]
    pub usage: BTreeMap<String, f64>,
    /// Compute servers.
    #[serde(default)]
    pub servers: Vec<ProjectServer>,
    /// Image catalog contents.
    #[serde(default)]
    pub images: Vec<ImageRecord>,
    /// Block storage volumes.
    #[serde(default)]
    pub volumes: Vec<ProjectVolume>,
    /// Object storage containers.
    #[serde(default)]
    pub containers: Vec<ProjectContainer>,
    /// Server action histories.
    #[serde(default)]
    pub server_actions: Vec<RecordedAction>,
}

/// Mock services seeded from a [`FixtureState`].
pub struct FixtureServices {
    /// Identity service.
    pub identity: Arc<MockIdentity>,
    /// Allocation system.
    pub allocations: Arc<MockAllocations>,
    /// Usage reporting.
    pub usage: Arc<MockUsage>,
    /// Compute, image, block storage, and object storage in one.
    pub cloud: Arc<MockCloud>,
}

impl FixtureState {
    /// Parse a fixture from JSON.
    pub fn from_json(raw: &str) -> serde_json::Result<FixtureState> {
        serde_json::from_str(raw)
    }

    /// Serialize the fixture as pretty JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Build mock services holding this state.
    pub async fn seed(self) -> FixtureServices {
        let identity = Arc::new(MockIdentity::new(self.projects));
        let allocations = Arc::new(MockAllocations::new(self.allocations));
        let usage = Arc::new(MockUsage::new(self.usage.into_iter().collect()));

        let cloud = MockCloud::with_slow_snapshots();
        for entry in self.servers {
            cloud.add_server(&entry.project_id, entry.server).await;
        }
        for image in self.images {
            cloud.add_image(image).await;
        }
        for entry in self.volumes {
            cloud.add_volume(&entry.project_id, entry.volume).await;
        }
        for entry in self.containers {
            cloud.add_container(&entry.project_id, entry.container).await;
        }
        for entry in self.server_actions {
            cloud
                .record_action(&entry.server_id, &entry.action, entry.started_at)
                .await;
        }

        FixtureServices {
            identity,
            allocations,
            usage,
            cloud: Arc::new(cloud),
        }
    }

    /// Read the current state back out of seeded services.
    ///
    /// Everything goes through the public traits, so this captures exactly
    /// what a client of the services would see.
    pub async fn capture(services: &FixtureServices) -> Result<FixtureState> {
        let projects = services.identity.list_projects().await?;
        let mut state = FixtureState {
            projects: projects.clone(),
            ..FixtureState::default()
        };

        for project in &projects {
            if let Ok(allocation) = services.allocations.current_allocation(&project.id).await {
                state.allocations.push(allocation);
            }
            if let Ok(hours) = services.usage.cumulative_compute_hours(&project.id).await {
                state.usage.insert(project.id.clone(), hours);
            }
            for server in services.cloud.list_servers(&project.id).await? {
                for action in services.cloud.list_server_actions(&server.id).await? {
                    state.server_actions.push(RecordedAction {
                        server_id: server.id.clone(),
                        action: action.action,
                        started_at: action.started_at,
                    });
                }
                state.servers.push(ProjectServer {
                    project_id: project.id.clone(),
                    server,
                });
            }
            state
                .images
                .extend(services.cloud.list_project_images(&project.id).await?);
            for volume in services.cloud.list_volumes(&project.id).await? {
                state.volumes.push(ProjectVolume {
                    project_id: project.id.clone(),
                    volume,
                });
            }
            for container in services.cloud.list_containers(&project.id).await? {
                state.containers.push(ProjectContainer {
                    project_id: project.id.clone(),
                    container,
                });
            }
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServerStatus;

    #[tokio::test]
    async fn test_minimal_documents_parse() {
        let state = FixtureState::from_json(r#"{ "projects": [] }"#).unwrap();
        assert!(state.projects.is_empty());
        assert!(state.servers.is_empty());
    }

    #[tokio::test]
    async fn test_seed_then_capture_round_trips() {
        let raw = r#"{
            "projects": [
                { "id": "p-1", "name": "research-lab", "enabled": true }
            ],
            "allocations": [
                { "project_id": "p-1", "status": "approved",
                  "start": "2025-01-01", "end": "2025-12-31" }
            ],
            "usage": { "p-1": 120.5 },
            "servers": [
                { "project_id": "p-1", "id": "srv-1", "name": "web",
                  "status": "ACTIVE" }
            ],
            "volumes": [
                { "project_id": "p-1", "id": "vol-1", "name": "data" }
            ],
            "containers": [
                { "project_id": "p-1", "name": "backups", "object_count": 3 }
            ]
        }"#;

        let services = FixtureState::from_json(raw).unwrap().seed().await;
        let captured = FixtureState::capture(&services).await.unwrap();

        assert_eq!(captured.projects.len(), 1);
        assert_eq!(captured.allocations.len(), 1);
        assert_eq!(captured.usage.get("p-1"), Some(&120.5));
        assert_eq!(captured.servers.len(), 1);
        assert_eq!(captured.servers[0].server.status, ServerStatus::Active);
        assert_eq!(captured.volumes.len(), 1);
        assert_eq!(captured.containers.len(), 1);

        // And the captured state serializes back to parseable JSON.
        let json = captured.to_json_pretty().unwrap();
        let reparsed = FixtureState::from_json(&json).unwrap();
        assert_eq!(reparsed.projects[0].id, "p-1");
    }
}
