// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fallow Clients - Resource Manager Contracts
//!
//! The expiry engine never talks to a cloud API directly; it goes through
//! the service traits defined here. Deployments implement the traits against
//! their resource managers and hand the trait objects to the engine builder.
//!
//! | Trait | Covers |
//! |-------|--------|
//! | [`IdentityService`] | projects, expiry fields, disabling |
//! | [`AllocationService`] | approved time windows |
//! | [`UsageService`] | cumulative compute hours |
//! | [`ComputeService`] | servers, snapshots, compute quotas |
//! | [`ImageService`] | archive artifacts |
//! | [`BlockStorageService`] | volumes and their quotas |
//! | [`ObjectStorageService`] | containers and their quotas |
//! | [`Notifier`] | owner notifications |
//!
//! The [`mock`] module carries complete in-memory implementations, and
//! [`fixture`] seeds them from a JSON document for rehearsal runs.

#![deny(missing_docs)]

/// Declarative service state for rehearsal runs and tests.
pub mod fixture;

/// In-memory service implementations.
pub mod mock;

/// Service trait definitions and the shared error type.
pub mod traits;

/// Wire records the services exchange.
pub mod types;

pub use traits::{
    AllocationService, BlockStorageService, ClientError, ComputeService, IdentityService,
    ImageService, Notifier, ObjectStorageService, UsageService,
};
pub use types::{
    ARCHIVE_ATTEMPTS_KEY, Allocation, AllocationStatus, ImageRecord, ImageStatus, Server,
    ServerAction, ServerStatus, StorageContainer, TaskState, Volume,
};
