// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Identity of one container observation: the SHA-256 digest of container
/// id, task id, and desired status concatenated in that order.
///
/// Desired status is part of the key on purpose. A RUNNING to STOPPED
/// transition shows up as one key leaving and another arriving, so the diff
/// only ever deals in membership and needs no separate update event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SnapshotKey(String);

impl SnapshotKey {
    pub fn derive(container_id: &str, task_id: &str, desired_status: &str) -> SnapshotKey {
        let mut hasher = Sha256::new();
        hasher.update(container_id.as_bytes());
        hasher.update(task_id.as_bytes());
        hasher.update(desired_status.as_bytes());
        SnapshotKey(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One observed container at one point in time. The field names are the
/// wire contract for the collector's `report/map` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerRecord {
    pub container_id: String,
    pub container_name: String,
    pub container_port: String,
    pub task_id: String,
    pub task_name: String,
    pub task_version: String,
    pub instance_ip: String,
    pub instance_id: String,
    pub instance_type: String,
    pub instance_az: String,
    pub instance_port: String,
    pub desired_status: String,
    pub known_status: String,
    pub host_name: String,
    pub cluster_name: String,
    pub orchestrator_agent_version: String,
    pub sample_time: f64,
}

/// Point-in-time mapping from key to record. Ordered so that serialization
/// and diff output are deterministic.
pub type Snapshot = BTreeMap<SnapshotKey, ContainerRecord>;

/// Membership changes between a candidate snapshot and the acknowledged one.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Keys present in the candidate but not yet acknowledged, sorted.
    pub added: Vec<SnapshotKey>,
    /// Keys acknowledged but gone from the candidate, sorted.
    pub removed: Vec<SnapshotKey>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Pure set difference over the two key spaces. Records under a key present
/// on both sides are not compared; only membership changes surface.
pub fn diff(candidate: &Snapshot, acknowledged: &Snapshot) -> SnapshotDiff {
    let added = candidate
        .keys()
        .filter(|key| !acknowledged.contains_key(*key))
        .cloned()
        .collect();
    let removed = acknowledged
        .keys()
        .filter(|key| !candidate.contains_key(*key))
        .cloned()
        .collect();
    SnapshotDiff { added, removed }
}

/// Seconds since the unix epoch as a float, the wire timestamp format.
pub(crate) fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}
