// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fallow Engine - Expiry Processing Pipeline
//!
//! Wires the pure policy evaluators from `fallow-core` to the service
//! traits from `fallow-clients` and drives projects down the expiry ladder:
//!
//! ```text
//!                    ┌──────────────┐
//!   list_projects ──►│ BatchRunner  │ per project, in id order
//!                    └──────┬───────┘
//!                           ▼
//!                    ┌──────────────┐  guards, policy decision,
//!                    │   Expirer    │  action, persist, notify
//!                    └──────┬───────┘
//!            ┌──────────────┼──────────────┐
//!            ▼              ▼              ▼
//!     ProjectStore    Archiver xN    Notifications
//!     (identity)      (per family)   (owner mail)
//! ```
//!
//! # Contracts
//!
//! - One rung per run: a project advances at most one status per
//!   invocation, so stage side effects and notifications happen in order.
//! - Side effects before state: the new status is persisted only after the
//!   decided action succeeded. A crash in between repeats the action on the
//!   next run; every action tolerates being repeated.
//! - Dry run by default: with `live` unset the store, the notifier and all
//!   archivers log what they would do and change nothing.

#![deny(missing_docs)]

/// Resource archival across families.
pub mod archiver;

/// Environment-driven settings.
pub mod config;

/// Error taxonomy for the pipeline.
pub mod error;

/// Per-project expiry processing.
pub mod expirer;

/// Owner notification dispatch.
pub mod notify;

/// Batch sweep, scoping and reporting.
pub mod runner;

/// Service wiring for deployments and the CLI.
pub mod runtime;

/// Typed expiry state on top of the identity service.
pub mod store;

pub use archiver::{
    ArchiveOutcome, Archiver, DryRunArchiver, InstanceArchiver, ObjectStoreArchiver,
    VolumeArchiver,
};
pub use config::{Config, ConfigError};
pub use error::{EngineError, Result};
pub use expirer::{AllocationPolicy, Expirer, ExpiryPolicy, Outcome, PolicyStep, UsagePolicy};
pub use notify::{LogNotifier, Notifications};
pub use runner::{BatchRunner, RunOptions, RunSummary, read_project_id_file};
pub use runtime::{PolicyFamily, Services, build_expirer};
pub use store::ProjectStore;
