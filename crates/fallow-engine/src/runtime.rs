// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service wiring.
//!
//! Deployments construct a [`Services`] bundle from their own trait
//! implementations and hand it to [`build_expirer`]. The `fallow` binary
//! builds the same bundle from a fixture snapshot instead, so a rehearsal
//! run exercises exactly the engine a live deployment embeds.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use fallow_clients::fixture::FixtureServices;
use fallow_clients::{
    AllocationService, BlockStorageService, ComputeService, IdentityService, ImageService,
    Notifier, ObjectStorageService, UsageService,
};
use fallow_core::Clock;

use crate::archiver::{
    Archiver, DryRunArchiver, InstanceArchiver, ObjectStoreArchiver, VolumeArchiver,
};
use crate::config::{Config, ConfigError};
use crate::expirer::{AllocationPolicy, Expirer, ExpiryPolicy, UsagePolicy};
use crate::notify::Notifications;
use crate::store::ProjectStore;

/// Every backend the engine talks to, as shared trait objects.
#[derive(Clone)]
pub struct Services {
    /// Project records and expiry state.
    pub identity: Arc<dyn IdentityService>,
    /// Allocation windows.
    pub allocations: Arc<dyn AllocationService>,
    /// Cumulative usage reports.
    pub usage: Arc<dyn UsageService>,
    /// Servers.
    pub compute: Arc<dyn ComputeService>,
    /// Server images.
    pub images: Arc<dyn ImageService>,
    /// Block storage volumes.
    pub volumes: Arc<dyn BlockStorageService>,
    /// Object storage containers.
    pub object_store: Arc<dyn ObjectStorageService>,
    /// Owner notification transport.
    pub notifier: Arc<dyn Notifier>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Bundle over a seeded fixture. The fixture's one cloud mock serves
    /// all four resource families.
    pub fn from_fixture(
        fixture: &FixtureServices,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Services {
            identity: fixture.identity.clone(),
            allocations: fixture.allocations.clone(),
            usage: fixture.usage.clone(),
            compute: fixture.cloud.clone(),
            images: fixture.cloud.clone(),
            volumes: fixture.cloud.clone(),
            object_store: fixture.cloud.clone(),
            notifier,
            clock,
        }
    }
}

/// The two expiry policy families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFamily {
    /// Allocation-window expiry for regular projects.
    Allocation,
    /// Usage-cap expiry for personal trial projects.
    Usage,
}

impl FromStr for PolicyFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allocation" => Ok(PolicyFamily::Allocation),
            "usage" => Ok(PolicyFamily::Usage),
            _ => Err(ConfigError::InvalidValue("policy family")),
        }
    }
}

impl fmt::Display for PolicyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyFamily::Allocation => write!(f, "allocation"),
            PolicyFamily::Usage => write!(f, "usage"),
        }
    }
}

/// Assemble an [`Expirer`] for one policy family.
///
/// With `config.live` false every archiver is wrapped in the dry-run
/// decorator and the store and notifier run in their logging-only modes.
pub fn build_expirer(family: PolicyFamily, services: &Services, config: &Config) -> Expirer {
    let policy: Arc<dyn ExpiryPolicy> = match family {
        PolicyFamily::Allocation => Arc::new(AllocationPolicy::new(services.allocations.clone())),
        PolicyFamily::Usage => Arc::new(UsagePolicy::new(services.usage.clone(), config)),
    };

    let mut archivers: Vec<Arc<dyn Archiver>> = vec![
        Arc::new(InstanceArchiver::new(
            services.compute.clone(),
            services.images.clone(),
            services.clock.clone(),
            config,
        )),
        Arc::new(VolumeArchiver::new(services.volumes.clone())),
        Arc::new(ObjectStoreArchiver::new(services.object_store.clone())),
    ];
    if !config.live {
        archivers = archivers.into_iter().map(DryRunArchiver::wrap).collect();
    }

    Expirer::new(
        policy,
        ProjectStore::new(services.identity.clone(), config.live),
        archivers,
        Notifications::new(services.notifier.clone(), config.live),
        services.clock.clone(),
    )
}
