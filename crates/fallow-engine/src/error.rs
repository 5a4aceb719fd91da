// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for engine operations.
//!
//! The batch runner sorts these into its three buckets: `NotApplicable`
//! counts as a skip, `FatalSetup` aborts the whole run, and everything else
//! counts the project as errored and moves on. A project whose action
//! failed keeps its persisted state untouched and is retried on the next
//! invocation.

use thiserror::Error;

use fallow_clients::ClientError;

use crate::config::ConfigError;

/// Errors from engine operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The project is out of scope for this policy family.
    #[error("not applicable: {reason}")]
    NotApplicable {
        /// Why the project was skipped.
        reason: String,
    },

    /// Policy inputs exist but cannot be trusted. The project is held in
    /// place, never advanced on guesswork.
    #[error("unusable policy data: {detail}")]
    PolicyData {
        /// What was wrong with the data.
        detail: String,
    },

    /// Some resources in a family failed their operation this run.
    #[error("{failed} of {total} {family} resources failed")]
    ResourceFailures {
        /// Archiver family tag.
        family: &'static str,
        /// Resources that failed.
        failed: usize,
        /// Resources considered.
        total: usize,
    },

    /// A resource burned through every allowed archive attempt.
    #[error("archive attempts exhausted for '{resource_id}' after {attempts} attempts")]
    ArchiveExhausted {
        /// Resource that ran out of attempts.
        resource_id: String,
        /// Attempts recorded when the limit was hit.
        attempts: u32,
    },

    /// The run cannot start at all. The only error that reaches the
    /// process exit code.
    #[error("setup failed: {0}")]
    FatalSetup(String),

    /// A resource-manager call failed.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
