// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! The reconciliation loop: fetch the candidate snapshot, diff it against
//! the acknowledged one, report the changes, and commit only once the
//! collector has the full map.

use std::process::Stdio;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::config::{Config, TriggerMode};
use crate::errors::Error;
use crate::fetch::{InstanceFacts, MetadataFetcher};
use crate::report::{EventAction, Reporter};
use crate::retry::RetryPolicy;
use crate::state::{self, Snapshot, SnapshotKey};

/// What a single reconciliation cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Candidate and acknowledged snapshots already agree.
    NoChange,
    /// Changes were reported and the candidate is now acknowledged.
    Committed { added: usize, removed: usize },
    /// The orchestrator could not be read; the cycle was skipped.
    FetchFailed,
    /// The snapshot report never got through; nothing was committed.
    ReportDropped,
}

/// Owns everything a cycle touches. One value, one worker task; triggers
/// that arrive while a cycle runs wait their turn instead of interleaving.
pub struct Reconciler {
    fetcher: MetadataFetcher,
    reporter: Reporter,
    facts: InstanceFacts,
    acknowledged: Snapshot,
    retry: RetryPolicy,
}

impl Reconciler {
    /// Build the fetcher and reporter from configuration and resolve the
    /// instance facts once, before the first cycle.
    pub async fn bootstrap(config: &Config) -> Result<Reconciler, Error> {
        let fetcher = MetadataFetcher::new(config)?;
        let reporter = Reporter::new(config)?;
        let mut retry = RetryPolicy::new(config.backoff_base_secs, config.max_retries);
        let facts = fetcher.instance_facts(&mut retry).await;
        info!(
            "instance facts: ip={} id={} type={} az={} host={}",
            facts.ip, facts.id, facts.instance_type, facts.az, facts.host_name
        );
        Ok(Reconciler::from_parts(fetcher, reporter, facts, retry))
    }

    pub fn from_parts(
        fetcher: MetadataFetcher,
        reporter: Reporter,
        facts: InstanceFacts,
        retry: RetryPolicy,
    ) -> Reconciler {
        Reconciler {
            fetcher,
            reporter,
            facts,
            acknowledged: Snapshot::new(),
            retry,
        }
    }

    /// The snapshot the collector has last confirmed.
    pub fn acknowledged(&self) -> &Snapshot {
        &self.acknowledged
    }

    /// Run one fetch, diff, report, commit pass.
    ///
    /// An empty diff makes no network call at all. Added events go out
    /// before removed events, and the acknowledged snapshot only advances
    /// when the full map report succeeds, so a dead collector leaves the
    /// diff intact for the next cycle to retry.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let candidate = match self.fetcher.task_snapshot(&mut self.retry, &self.facts).await {
            Ok(candidate) => candidate,
            Err(err) => {
                error!("skipping cycle, could not fetch task state: {err}");
                return CycleOutcome::FetchFailed;
            }
        };

        info!("comparing known state to current state");
        let diff = state::diff(&candidate, &self.acknowledged);
        if diff.is_empty() {
            info!("no container changes to report");
            return CycleOutcome::NoChange;
        }

        if !diff.added.is_empty() {
            info!("containers added: {}", join_keys(&diff.added));
            for key in &diff.added {
                self.reporter
                    .report_event(&mut self.retry, key, EventAction::Added)
                    .await;
            }
        }
        if !diff.removed.is_empty() {
            info!("containers removed: {}", join_keys(&diff.removed));
            for key in &diff.removed {
                self.reporter
                    .report_event(&mut self.retry, key, EventAction::Removed)
                    .await;
            }
        }

        if let Err(err) = self
            .reporter
            .report_snapshot(&mut self.retry, &candidate)
            .await
        {
            error!("container map not delivered, keeping previous acknowledged state: {err}");
            return CycleOutcome::ReportDropped;
        }

        let added = diff.added.len();
        let removed = diff.removed.len();
        self.acknowledged = candidate;
        info!(
            "acknowledged snapshot now has {} containers",
            self.acknowledged.len()
        );
        CycleOutcome::Committed { added, removed }
    }

    /// Drive cycles until shutdown, using the configured trigger.
    pub async fn run(
        &mut self,
        config: &Config,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), Error> {
        match config.trigger {
            TriggerMode::Interval => self.run_interval(config.poll_interval_secs, shutdown).await,
            TriggerMode::Reactive => self.run_reactive(shutdown).await,
        }
    }

    async fn run_interval(
        &mut self,
        poll_secs: u64,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), Error> {
        let period = Duration::from_secs(poll_secs.max(1));
        info!("reconciling every {}s", period.as_secs());
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.changed() => {
                    info!("reconciliation loop stopping");
                    return Ok(());
                }
            }
        }
    }

    async fn run_reactive(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), Error> {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        let mut child = spawn_lifecycle_listener(tx)?;
        info!("reconciling on container lifecycle events");
        loop {
            tokio::select! {
                nudge = rx.recv() => {
                    match nudge {
                        Some(()) => {
                            self.run_cycle().await;
                        }
                        None => {
                            warn!("lifecycle event stream ended, stopping");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("reconciliation loop stopping");
                    break;
                }
            }
        }
        let _ = child.kill().await;
        Ok(())
    }
}

/// Start `docker events` filtered to container start/die and forward each
/// line as a nudge. The capacity-1 channel coalesces bursts: a trigger that
/// lands mid-cycle queues at most one follow-up cycle.
fn spawn_lifecycle_listener(tx: mpsc::Sender<()>) -> Result<Child, Error> {
    let mut child = Command::new("docker")
        .args([
            "events",
            "--filter",
            "type=container",
            "--filter",
            "event=start",
            "--filter",
            "event=die",
            "--format",
            "{{.Status}}",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            Error::Configuration(format!("could not start docker events listener: {e}"))
        })?;
    let Some(stdout) = child.stdout.take() else {
        return Err(Error::Configuration(
            "docker events listener has no stdout".to_string(),
        ));
    };
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("lifecycle event: {line}");
            let _ = tx.try_send(());
        }
    });
    Ok(child)
}

fn join_keys(keys: &[SnapshotKey]) -> String {
    keys.iter()
        .map(SnapshotKey::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
