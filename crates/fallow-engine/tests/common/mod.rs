// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for engine integration tests.
//!
//! Provides a `TestContext` holding every mock backend plus builders for
//! expirers pinned to a fixed date, wired through the same `build_expirer`
//! path the binary uses.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;

use fallow_clients::mock::{MockAllocations, MockCloud, MockIdentity, MockNotifier, MockUsage};
use fallow_clients::{Allocation, AllocationStatus, Server, ServerStatus};
use fallow_core::{Contact, FixedClock, Project};
use fallow_engine::{BatchRunner, Config, Expirer, PolicyFamily, RunOptions, Services, build_expirer};

/// Mock backends plus the engine configuration for one test.
pub struct TestContext {
    pub identity: Arc<MockIdentity>,
    pub allocations: Arc<MockAllocations>,
    pub usage: Arc<MockUsage>,
    pub cloud: Arc<MockCloud>,
    pub notifier: Arc<MockNotifier>,
    pub config: Config,
}

impl TestContext {
    /// Context applying changes, with snapshots that stay in `saving` until
    /// a test finishes them.
    pub fn live(projects: Vec<Project>) -> Self {
        Self {
            identity: Arc::new(MockIdentity::new(projects)),
            allocations: Arc::new(MockAllocations::new(Vec::new())),
            usage: Arc::new(MockUsage::new(Vec::new())),
            cloud: Arc::new(MockCloud::with_slow_snapshots()),
            notifier: Arc::new(MockNotifier::new()),
            config: Config {
                live: true,
                ..Config::default()
            },
        }
    }

    /// Context in the default dry-run mode.
    pub fn dry_run(projects: Vec<Project>) -> Self {
        let mut ctx = Self::live(projects);
        ctx.config.live = false;
        ctx
    }

    /// Service bundle with the clock pinned to `today`.
    pub fn services(&self, today: NaiveDate) -> Services {
        Services {
            identity: self.identity.clone(),
            allocations: self.allocations.clone(),
            usage: self.usage.clone(),
            compute: self.cloud.clone(),
            images: self.cloud.clone(),
            volumes: self.cloud.clone(),
            object_store: self.cloud.clone(),
            notifier: self.notifier.clone(),
            clock: Arc::new(FixedClock::at_date(today)),
        }
    }

    /// Engine for one policy family, evaluated as of `today`.
    pub fn expirer(&self, family: PolicyFamily, today: NaiveDate) -> Expirer {
        build_expirer(family, &self.services(today), &self.config)
    }

    /// Batch runner over the whole project table.
    pub fn runner(&self, family: PolicyFamily, today: NaiveDate) -> BatchRunner {
        BatchRunner::new(
            self.identity.clone(),
            self.expirer(family, today),
            RunOptions::default(),
        )
    }

    /// Current copy of a project out of the identity mock.
    pub async fn project(&self, id: &str) -> Project {
        self.identity.project(id).await.expect("project exists")
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Project with an enabled owner, eligible for processing.
pub fn owned_project(id: &str, name: &str) -> Project {
    let mut project = Project::new(id, name);
    project.owner = Some(Contact {
        email: format!("{id}-owner@example.org"),
        enabled: true,
    });
    project
}

/// Approved allocation covering `[start, end]`.
pub fn approved(project_id: &str, start: NaiveDate, end: NaiveDate) -> Allocation {
    Allocation {
        project_id: project_id.to_string(),
        status: AllocationStatus::Approved,
        start,
        end,
    }
}

/// Stopped server with no metadata.
pub fn shutoff_server(id: &str) -> Server {
    Server {
        id: id.to_string(),
        name: format!("{id}-name"),
        status: ServerStatus::Shutoff,
        task_state: None,
        locked: false,
        metadata: Default::default(),
    }
}

/// Running server with no metadata.
pub fn active_server(id: &str) -> Server {
    Server {
        status: ServerStatus::Active,
        ..shutoff_server(id)
    }
}
