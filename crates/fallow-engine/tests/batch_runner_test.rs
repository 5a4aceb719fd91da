// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for sweeping a mixed project fleet.
//!
//! These tests verify:
//! 1. One sweep buckets advanced, settled, skipped and errored projects
//!    correctly, in id order
//! 2. Guarded projects (disabled, ticket hold, ownerless, operator hold)
//!    are counted as skips, not errors
//! 3. A single project can be run by id; an unknown id is a fatal error
//! 4. A project whose resources misbehave errors alone; the rest of the
//!    sweep is unaffected
//! 5. The status census reflects what the sweep changed
//!
//! Run with:
//! ```bash
//! cargo test -p fallow-engine --test batch_runner_test
//! ```

mod common;

use std::sync::Arc;

use common::{TestContext, active_server, approved, day, owned_project};
use fallow_clients::mock::MockCloud;
use fallow_core::{Project, TICKET_KEY};
use fallow_engine::{EngineError, PolicyFamily};

async fn seed_year_allocation(ctx: &TestContext, id: &str) {
    ctx.allocations
        .set(approved(id, day(2025, 1, 1), day(2025, 12, 31)))
        .await;
}

// ============================================================================
// Bucket accounting
// ============================================================================

#[tokio::test]
async fn test_mixed_fleet_lands_in_the_right_buckets() {
    // Two projects due for a transition.
    let due_for_warning = owned_project("p-1", "research-lab");
    let mut due_for_restriction = owned_project("p-2", "climate-sim");
    due_for_restriction.expiry_status = Some("warning".into());
    due_for_restriction.expiry_next_step = Some("2025-12-10".into());

    // Four projects the guards take out of scope.
    let mut disabled = owned_project("p-3", "mothballed");
    disabled.enabled = false;
    let mut held = owned_project("p-4", "in-dispute");
    held.metadata.insert(TICKET_KEY.into(), "48213".into());
    let ownerless = Project::new("p-5", "orphaned");
    let mut operator_hold = owned_project("p-6", "vip-lab");
    operator_hold.expiry_status = Some("admin".into());

    // Out of scope for the policy, and one already settled.
    let unallocated = owned_project("p-7", "no-allocation");
    let mut gone = owned_project("p-8", "torn-down");
    gone.expiry_status = Some("deleted".into());

    let ctx = TestContext::live(vec![
        due_for_warning,
        due_for_restriction,
        disabled,
        held,
        ownerless,
        operator_hold,
        unallocated,
        gone,
    ]);
    for id in ["p-1", "p-2", "p-3", "p-4", "p-5", "p-6", "p-8"] {
        seed_year_allocation(&ctx, id).await;
    }

    let summary = ctx
        .runner(PolicyFamily::Allocation, day(2025, 12, 15))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.advanced, 2);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.skipped, 5);
    assert_eq!(summary.errored, 0);

    // The sweep runs in id order, so the writes do too.
    let writes = ctx.identity.expiry_writes().await;
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].project_id, "p-1");
    assert_eq!(writes[1].project_id, "p-2");

    let stages: Vec<String> = ctx
        .notifier
        .sent()
        .await
        .iter()
        .map(|n| n.stage.clone())
        .collect();
    assert_eq!(stages, vec!["warning", "restricted"]);
}

// ============================================================================
// Single-project runs
// ============================================================================

#[tokio::test]
async fn test_run_one_loads_by_id_and_rejects_unknown_ids() {
    let ctx = TestContext::live(vec![owned_project("p-1", "research-lab")]);
    seed_year_allocation(&ctx, "p-1").await;
    let runner = ctx.runner(PolicyFamily::Allocation, day(2025, 12, 15));

    let outcome = runner.run_one("p-1").await.unwrap();
    assert!(outcome.advanced);

    let err = runner.run_one("ghost").await.unwrap_err();
    assert!(matches!(err, EngineError::FatalSetup(_)));
}

// ============================================================================
// Error isolation
// ============================================================================

/// A stop failure on one project must not keep the next project from its
/// own transition.
#[tokio::test]
async fn test_resource_failures_stay_with_their_project() {
    let mut failing = owned_project("p-1", "climate-sim");
    failing.expiry_status = Some("restricted".into());
    failing.expiry_next_step = Some("2025-12-10".into());
    let healthy = owned_project("p-2", "research-lab");

    let mut cloud = MockCloud::new();
    cloud.fail_stops = true;
    let ctx = TestContext {
        cloud: Arc::new(cloud),
        ..TestContext::live(vec![failing, healthy])
    };
    seed_year_allocation(&ctx, "p-1").await;
    seed_year_allocation(&ctx, "p-2").await;
    ctx.cloud.add_server("p-1", active_server("srv-1")).await;

    let summary = ctx
        .runner(PolicyFamily::Allocation, day(2025, 12, 15))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.errored, 1);
    assert_eq!(summary.advanced, 1);
    assert_eq!(summary.processed, 1);

    // Only the healthy project reached the store.
    let writes = ctx.identity.expiry_writes().await;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].project_id, "p-2");
}

// ============================================================================
// Census
// ============================================================================

#[tokio::test]
async fn test_status_report_tracks_the_sweep() {
    let due = owned_project("p-1", "research-lab");
    let mut waiting = owned_project("p-2", "climate-sim");
    waiting.expiry_status = Some("warning".into());
    waiting.expiry_next_step = Some("2026-06-01".into());

    let ctx = TestContext::live(vec![due, waiting]);
    seed_year_allocation(&ctx, "p-1").await;
    seed_year_allocation(&ctx, "p-2").await;
    let runner = ctx.runner(PolicyFamily::Allocation, day(2025, 12, 15));

    let before = runner.status_report().await.unwrap();
    assert_eq!(before.get("active"), Some(&1));
    assert_eq!(before.get("warning"), Some(&1));

    let summary = runner.run().await.unwrap();
    assert_eq!(summary.advanced, 1);

    let after = runner.status_report().await.unwrap();
    assert_eq!(after.get("active"), None);
    assert_eq!(after.get("warning"), Some(&2));
}
