// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Batch processing over the project list.
//!
//! The runner owns error isolation: one broken project never stops the
//! sweep. Skips (out of scope for the policy) and errors land in separate
//! buckets, and the transition limit counts only projects that actually
//! moved, so a mostly-settled fleet still gets fully visited.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

use fallow_clients::IdentityService;
use fallow_core::ExpiryRecord;

use crate::error::{EngineError, Result};
use crate::expirer::{Expirer, Outcome};

/// Scope controls for a batch run.
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Stop after this many projects have advanced a rung.
    pub limit: Option<usize>,
    /// Process only these project ids.
    pub ids: Option<HashSet<String>>,
}

/// Bucket counts from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Projects processed without error.
    pub processed: usize,
    /// Subset of processed that advanced a rung.
    pub advanced: usize,
    /// Projects out of scope for the policy.
    pub skipped: usize,
    /// Projects whose run failed; they retry next invocation.
    pub errored: usize,
}

/// Sweeps the engine across every project in scope.
pub struct BatchRunner {
    identity: Arc<dyn IdentityService>,
    expirer: Expirer,
    options: RunOptions,
}

impl BatchRunner {
    /// Runner over the given engine and scope options.
    pub fn new(identity: Arc<dyn IdentityService>, expirer: Expirer, options: RunOptions) -> Self {
        Self {
            identity,
            expirer,
            options,
        }
    }

    /// Process every project in id order. Only a failure to list projects
    /// aborts; per-project errors are counted and logged.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut projects = self
            .identity
            .list_projects()
            .await
            .map_err(|e| EngineError::FatalSetup(format!("cannot list projects: {e}")))?;
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(ids) = &self.options.ids {
            projects.retain(|p| ids.contains(&p.id));
        }

        let mut summary = RunSummary::default();
        for project in &projects {
            if let Some(limit) = self.options.limit
                && summary.advanced >= limit
            {
                info!(limit, "transition limit reached, stopping the sweep");
                break;
            }
            match self.expirer.process(project).await {
                Ok(outcome) => {
                    summary.processed += 1;
                    if outcome.advanced {
                        summary.advanced += 1;
                    }
                }
                Err(EngineError::NotApplicable { reason }) => {
                    debug!(project_id = %project.id, %reason, "skipped");
                    summary.skipped += 1;
                }
                Err(error) => {
                    error!(project_id = %project.id, %error, "project failed, continuing");
                    summary.errored += 1;
                }
            }
        }

        info!(
            processed = summary.processed,
            advanced = summary.advanced,
            skipped = summary.skipped,
            errored = summary.errored,
            "sweep finished"
        );
        Ok(summary)
    }

    /// Process a single project by id.
    pub async fn run_one(&self, project_id: &str) -> Result<Outcome> {
        let project = self
            .identity
            .get_project(project_id)
            .await
            .map_err(|e| EngineError::FatalSetup(format!("cannot load project: {e}")))?;
        self.expirer.process(&project).await
    }

    /// Count projects by their resolved status string. Records that cannot
    /// be resolved land in an `unknown` bucket.
    pub async fn status_report(&self) -> Result<BTreeMap<String, usize>> {
        let projects = self
            .identity
            .list_projects()
            .await
            .map_err(|e| EngineError::FatalSetup(format!("cannot list projects: {e}")))?;

        let mut counts = BTreeMap::new();
        for project in &projects {
            let bucket = match ExpiryRecord::resolve(project) {
                Ok(record) => record.status.as_str().to_string(),
                Err(_) => "unknown".to_string(),
            };
            *counts.entry(bucket).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

/// Read a project-id scope file: one id per line, blank lines ignored.
pub fn read_project_id_file(path: &Path) -> io::Result<HashSet<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    use chrono::NaiveDate;

    use fallow_clients::mock::{MockIdentity, MockNotifier, MockUsage};
    use fallow_core::{FixedClock, Project};

    use crate::config::Config;
    use crate::expirer::UsagePolicy;
    use crate::notify::Notifications;
    use crate::store::ProjectStore;

    const CAP: f64 = 4383.0;

    fn owned(id: &str, name: &str) -> Project {
        let mut project = Project::new(id, name);
        project.owner = Some(fallow_core::Contact {
            email: "owner@example.org".into(),
            enabled: true,
        });
        project
    }

    /// Trial projects against a usage table; ids sort in insertion order.
    fn runner(projects: Vec<Project>, usage: Vec<(String, f64)>, options: RunOptions) -> BatchRunner {
        runner_with_identity(Arc::new(MockIdentity::new(projects)), usage, options)
    }

    fn runner_with_identity(
        identity: Arc<MockIdentity>,
        usage: Vec<(String, f64)>,
        options: RunOptions,
    ) -> BatchRunner {
        let expirer = Expirer::new(
            Arc::new(UsagePolicy::new(
                Arc::new(MockUsage::new(usage)),
                &Config::default(),
            )),
            ProjectStore::new(identity.clone(), true),
            Vec::new(),
            Notifications::new(Arc::new(MockNotifier::new()), true),
            Arc::new(FixedClock::at_date(
                NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            )),
        );
        BatchRunner::new(identity, expirer, options)
    }

    #[tokio::test]
    async fn test_limit_counts_transitions_not_visits() {
        // p-1 and p-3 are settled; p-2, p-4, p-5 are over their cap.
        let projects = vec![
            owned("p-1", "pt-alice"),
            owned("p-2", "pt-bob"),
            owned("p-3", "pt-carol"),
            owned("p-4", "pt-dave"),
            owned("p-5", "pt-erin"),
        ];
        let usage = vec![
            ("p-1".into(), 10.0),
            ("p-2".into(), CAP * 1.5),
            ("p-3".into(), 20.0),
            ("p-4".into(), CAP * 1.5),
            ("p-5".into(), CAP * 1.5),
        ];
        let runner = runner(projects, usage, RunOptions {
            limit: Some(2),
            ids: None,
        });

        let summary = runner.run().await.unwrap();
        // The sweep stops before p-5: two transitions already happened.
        assert_eq!(summary.advanced, 2);
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.errored, 0);
    }

    #[tokio::test]
    async fn test_id_scope_restricts_the_sweep() {
        let projects = vec![
            owned("p-1", "pt-alice"),
            owned("p-2", "pt-bob"),
        ];
        let usage = vec![("p-1".into(), CAP * 1.5), ("p-2".into(), CAP * 1.5)];
        let identity = Arc::new(MockIdentity::new(projects));
        let runner = runner_with_identity(identity.clone(), usage, RunOptions {
            limit: None,
            ids: Some(HashSet::from(["p-2".to_string()])),
        });

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.advanced, 1);
        let writes = identity.expiry_writes().await;
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].project_id, "p-2");
    }

    #[tokio::test]
    async fn test_one_failing_project_does_not_stop_the_sweep() {
        let projects = vec![
            owned("p-1", "pt-alice"),
            owned("p-2", "pt-bob"),
        ];
        let usage = vec![("p-1".into(), CAP * 1.5), ("p-2".into(), CAP * 1.5)];
        // Writes fail, so both transitions error out at the persist step.
        let identity = Arc::new(MockIdentity::failing_writes(projects));
        let runner = runner_with_identity(identity, usage, RunOptions::default());

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.errored, 2);
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test]
    async fn test_out_of_scope_projects_are_skips() {
        let projects = vec![
            owned("p-1", "pt-alice"),
            owned("p-2", "shared-infra"),
        ];
        let usage = vec![("p-1".into(), 10.0)];
        let runner = runner(projects, usage, RunOptions::default());

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_status_report_buckets_by_resolved_status() {
        let mut warned = owned("p-2", "pt-bob");
        warned.expiry_status = Some("warning".into());
        let mut broken = owned("p-3", "pt-carol");
        broken.expiry_status = Some("mangled".into());
        let projects = vec![owned("p-1", "pt-alice"), warned, broken];
        let runner = runner(projects, Vec::new(), RunOptions::default());

        let counts = runner.status_report().await.unwrap();
        assert_eq!(counts.get("active"), Some(&1));
        assert_eq!(counts.get("warning"), Some(&1));
        assert_eq!(counts.get("unknown"), Some(&1));
    }

    #[test]
    fn test_id_file_ignores_blank_lines_and_whitespace() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "p-1\n\n  p-2  \n").unwrap();

        let ids = read_project_id_file(file.path()).unwrap();
        assert_eq!(ids, HashSet::from(["p-1".to_string(), "p-2".to_string()]));
    }
}
