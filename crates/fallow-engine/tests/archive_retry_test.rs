// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for archive attempt accounting and parking.
//!
//! These tests verify:
//! 1. The first poll requests a snapshot; later polls wait on the live
//!    artifact without growing the attempt counter
//! 2. Failed snapshot requests grow the counter one per run until the
//!    project parks in `archive_error`
//! 3. An errored artifact parks the project without another request
//! 4. A parked project is settled and never re-enters the machinery
//! 5. A passed deadline advances the project without touching the
//!    snapshot machinery at all
//!
//! Run with:
//! ```bash
//! cargo test -p fallow-engine --test archive_retry_test
//! ```

mod common;

use std::sync::Arc;

use common::{TestContext, approved, day, owned_project, shutoff_server};
use fallow_clients::mock::MockCloud;
use fallow_core::{ExpiryStatus, Project};
use fallow_engine::{EngineError, Outcome, PolicyFamily, Result};

use chrono::NaiveDate;

fn archiving_project(id: &str, deadline: &str) -> Project {
    let mut project = owned_project(id, "research-lab");
    project.expiry_status = Some("archiving".into());
    project.expiry_next_step = Some(deadline.into());
    project
}

async fn run(ctx: &TestContext, id: &str, today: NaiveDate) -> Result<Outcome> {
    let project = ctx.project(id).await;
    ctx.expirer(PolicyFamily::Allocation, today)
        .process(&project)
        .await
}

async fn attempts(ctx: &TestContext, server_id: &str) -> u32 {
    ctx.cloud.server(server_id).await.unwrap().archive_attempts()
}

// ============================================================================
// Polling
// ============================================================================

#[tokio::test]
async fn test_poll_requests_once_then_waits_for_the_snapshot() {
    let ctx = TestContext::live(vec![archiving_project("p-a", "2026-06-08")]);
    ctx.allocations
        .set(approved("p-a", day(2025, 1, 1), day(2025, 12, 31)))
        .await;
    ctx.cloud.add_server("p-a", shutoff_server("srv-1")).await;

    // First poll finds no artifact and requests one.
    let outcome = run(&ctx, "p-a", day(2026, 3, 10)).await.unwrap();
    assert!(!outcome.advanced);
    assert_eq!(outcome.status, ExpiryStatus::Archiving);
    assert_eq!(attempts(&ctx, "srv-1").await, 1);
    assert_eq!(ctx.cloud.images_named("srv-1_archive").await.len(), 1);

    // The snapshot is still saving: wait, and leave the counter alone.
    let outcome = run(&ctx, "p-a", day(2026, 3, 11)).await.unwrap();
    assert!(!outcome.advanced);
    assert_eq!(attempts(&ctx, "srv-1").await, 1);
    assert!(ctx.identity.expiry_writes().await.is_empty());

    // Upload done: the record finally moves, carrying the deadline.
    ctx.cloud.finish_snapshots().await;
    let outcome = run(&ctx, "p-a", day(2026, 3, 12)).await.unwrap();
    assert!(outcome.advanced);
    assert_eq!(outcome.status, ExpiryStatus::Archived);
    assert_eq!(outcome.next_step, Some(day(2026, 6, 8)));
    assert_eq!(ctx.identity.expiry_writes().await.len(), 1);
}

// ============================================================================
// Exhaustion
// ============================================================================

/// Every failed pass burns exactly one attempt; the pass after the last
/// one parks the project instead of trying again.
#[tokio::test]
async fn test_failed_requests_burn_attempts_until_the_project_parks() {
    let mut cloud = MockCloud::new();
    cloud.fail_snapshots = true;
    let ctx = TestContext {
        cloud: Arc::new(cloud),
        ..TestContext::live(vec![archiving_project("p-a", "2026-06-08")])
    };
    ctx.allocations
        .set(approved("p-a", day(2025, 1, 1), day(2025, 12, 31)))
        .await;
    ctx.cloud.add_server("p-a", shutoff_server("srv-1")).await;

    for attempt in 1..=10u32 {
        let err = run(&ctx, "p-a", day(2026, 3, 10)).await.unwrap_err();
        assert!(matches!(err, EngineError::ResourceFailures { .. }));
        assert_eq!(attempts(&ctx, "srv-1").await, attempt);
    }
    assert!(ctx.identity.expiry_writes().await.is_empty());

    let outcome = run(&ctx, "p-a", day(2026, 3, 10)).await.unwrap();
    assert!(outcome.advanced);
    assert_eq!(outcome.status, ExpiryStatus::ArchiveError);
    assert_eq!(outcome.next_step, None);
    assert_eq!(attempts(&ctx, "srv-1").await, 10);

    let writes = ctx.identity.expiry_writes().await;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].status, ExpiryStatus::ArchiveError);
    // Parking is an internal stage; the owner hears nothing.
    assert!(ctx.notifier.sent().await.is_empty());
}

#[tokio::test]
async fn test_errored_artifact_parks_without_another_request() {
    let ctx = TestContext::live(vec![archiving_project("p-a", "2026-06-08")]);
    ctx.allocations
        .set(approved("p-a", day(2025, 1, 1), day(2025, 12, 31)))
        .await;
    ctx.cloud.add_server("p-a", shutoff_server("srv-1")).await;

    run(&ctx, "p-a", day(2026, 3, 10)).await.unwrap();
    ctx.cloud.fail_image("srv-1_archive").await;

    let outcome = run(&ctx, "p-a", day(2026, 3, 11)).await.unwrap();
    assert!(outcome.advanced);
    assert_eq!(outcome.status, ExpiryStatus::ArchiveError);
    assert_eq!(attempts(&ctx, "srv-1").await, 1);
}

#[tokio::test]
async fn test_parked_project_is_settled() {
    let mut parked = owned_project("p-a", "research-lab");
    parked.expiry_status = Some("archive_error".into());
    let ctx = TestContext::live(vec![parked]);
    ctx.allocations
        .set(approved("p-a", day(2025, 1, 1), day(2025, 12, 31)))
        .await;
    ctx.cloud.add_server("p-a", shutoff_server("srv-1")).await;

    let outcome = run(&ctx, "p-a", day(2026, 3, 10)).await.unwrap();
    assert!(!outcome.advanced);
    assert_eq!(outcome.status, ExpiryStatus::ArchiveError);
    assert!(ctx.identity.expiry_writes().await.is_empty());
    assert_eq!(attempts(&ctx, "srv-1").await, 0);
}

// ============================================================================
// Forced advance
// ============================================================================

/// Past the deadline the project advances even though every snapshot
/// request would fail; the machinery is not consulted.
#[tokio::test]
async fn test_forced_advance_never_touches_the_snapshot_machinery() {
    let mut cloud = MockCloud::new();
    cloud.fail_snapshots = true;
    let ctx = TestContext {
        cloud: Arc::new(cloud),
        ..TestContext::live(vec![archiving_project("p-a", "2026-03-01")])
    };
    ctx.allocations
        .set(approved("p-a", day(2025, 1, 1), day(2025, 12, 31)))
        .await;
    ctx.cloud.add_server("p-a", shutoff_server("srv-1")).await;

    let outcome = run(&ctx, "p-a", day(2026, 3, 10)).await.unwrap();
    assert!(outcome.advanced);
    assert_eq!(outcome.status, ExpiryStatus::Archived);
    assert_eq!(outcome.next_step, Some(day(2026, 3, 1)));
    assert_eq!(attempts(&ctx, "srv-1").await, 0);
    assert!(ctx.cloud.images_named("srv-1_archive").await.is_empty());
}
