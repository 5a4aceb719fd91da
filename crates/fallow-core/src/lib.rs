// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fallow Core - Expiry Domain Model
//!
//! This crate holds the pure domain model of the expiry engine: the status
//! ladder, the typed project record, and the two policy evaluators. Nothing
//! here performs I/O; the engine crate loads inputs, executes decisions, and
//! persists results.
//!
//! # The ladder
//!
//! ```text
//!               ACTIVE
//!                  │ threshold reached / cap neared
//!                  ▼
//!     WARNING / QUOTA_WARNING          ADMIN (operator hold, exempt)
//!                  │ gate date
//!                  ▼
//!  RESTRICTED / PENDING_SUSPENSION
//!                  │ gate date
//!                  ▼
//!        STOPPED / SUSPENDED
//!                  │ gate date
//!                  ▼
//!              ARCHIVING ────────────► ARCHIVE_ERROR (manual repair)
//!                  │ complete or deadline
//!                  ▼
//!               ARCHIVED
//!                  │ gate date
//!                  ▼
//!               DELETED
//! ```
//!
//! Transitions only ever move down the ladder; the single loop is
//! `ARCHIVING` re-entering itself while snapshots are retried.
//!
//! # Policy families
//!
//! | Family | Trigger | Evaluator |
//! |--------|---------|-----------|
//! | Allocation | approved time window runs out | [`policy::allocation::evaluate`] |
//! | Usage | cumulative compute hours cross a cap | [`policy::usage::evaluate`] |
//!
//! Both evaluators return at most one [`policy::Decision`] per call, moving
//! a project a single rung per run.

#![deny(missing_docs)]

/// Injectable time source.
pub mod clock;

/// Pure policy evaluation for both expiry families.
pub mod policy;

/// Project records and typed expiry state resolution.
pub mod project;

/// The status ladder and its persisted string forms.
pub mod status;

pub use clock::{Clock, FixedClock, SystemClock};
pub use policy::{Decision, PolicyAction};
pub use project::{Contact, ExpiryRecord, Project, TICKET_KEY};
pub use status::{ExpiryStage, ExpiryStatus, ParseStatusError};
