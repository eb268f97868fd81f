// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Read side of the agent: the orchestrator introspection API, the EC2
//! instance metadata service, and the local docker port table.

use std::env;
use std::fs;
use std::process::Command;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::errors::Error;
use crate::retry::{RetryPolicy, with_backoff};
use crate::state::{ContainerRecord, Snapshot, SnapshotKey, unix_now};

/// Resolves `(container_port, host_port)` for a container id. Boxed so tests
/// can swap in a closure instead of shelling out to docker.
pub type PortResolver = Box<dyn Fn(&str) -> (String, String) + Send + Sync>;

/// Host-level facts resolved once at startup. None of these can change while
/// the process is alive, so they are fetched before the first cycle and
/// reused for every record.
#[derive(Debug, Clone, Default)]
pub struct InstanceFacts {
    pub ip: String,
    pub id: String,
    pub instance_type: String,
    pub az: String,
    pub host_name: String,
}

// Raw response shapes. `default` on every field keeps one sparse task or
// container from poisoning the whole response: anything absent comes back
// as an empty string or list.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct TaskListResponse {
    tasks: Vec<TaskEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct TaskEntry {
    arn: String,
    desired_status: String,
    known_status: String,
    family: String,
    version: String,
    containers: Vec<ContainerEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ContainerEntry {
    docker_id: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ClusterMetadataResponse {
    cluster: String,
    version: String,
}

pub struct MetadataFetcher {
    client: reqwest::Client,
    orchestrator_url: String,
    metadata_url: String,
    resolve_ports: PortResolver,
}

impl MetadataFetcher {
    pub fn new(config: &Config) -> Result<MetadataFetcher, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("could not build HTTP client: {e}")))?;
        Ok(MetadataFetcher {
            client,
            orchestrator_url: trim_base(&config.orchestrator_url),
            metadata_url: trim_base(&config.metadata_url),
            resolve_ports: Box::new(docker_port_mapping),
        })
    }

    /// Replace the docker-backed port lookup.
    pub fn with_port_resolver(mut self, resolver: PortResolver) -> MetadataFetcher {
        self.resolve_ports = resolver;
        self
    }

    /// Fetch the current task list and cluster metadata and assemble the
    /// candidate snapshot. Transport failures are retried under `policy`;
    /// a body that does not parse at the top level is `MalformedMetadata`.
    pub async fn task_snapshot(
        &self,
        policy: &mut RetryPolicy,
        facts: &InstanceFacts,
    ) -> Result<Snapshot, Error> {
        info!("requesting task state from the orchestrator agent");
        let tasks_url = format!("{}/v1/tasks", self.orchestrator_url);
        let tasks: TaskListResponse = self.get_json(policy, &tasks_url).await?;
        let cluster_url = format!("{}/v1/metadata", self.orchestrator_url);
        let cluster: ClusterMetadataResponse = self.get_json(policy, &cluster_url).await?;
        Ok(self.assemble(&tasks, &cluster, facts))
    }

    /// Fetch the per-instance facts from the metadata service. Each
    /// attribute falls back to an empty string once retries are exhausted,
    /// matching the plain-text "" the service returns for unknown paths.
    pub async fn instance_facts(&self, policy: &mut RetryPolicy) -> InstanceFacts {
        InstanceFacts {
            ip: self.instance_attribute(policy, "local-ipv4").await,
            id: self.instance_attribute(policy, "instance-id").await,
            instance_type: self.instance_attribute(policy, "instance-type").await,
            az: self
                .instance_attribute(policy, "placement/availability-zone")
                .await,
            host_name: host_name(),
        }
    }

    async fn instance_attribute(&self, policy: &mut RetryPolicy, path: &str) -> String {
        info!("checking instance metadata for {path}");
        let url = format!("{}/{}", self.metadata_url, path);
        match self.get_text(policy, &url).await {
            Ok(value) => value,
            Err(err) => {
                warn!("could not read instance metadata {path}: {err}");
                String::new()
            }
        }
    }

    fn assemble(
        &self,
        tasks: &TaskListResponse,
        cluster: &ClusterMetadataResponse,
        facts: &InstanceFacts,
    ) -> Snapshot {
        let mut snapshot = Snapshot::new();
        let now = unix_now();
        for task in &tasks.tasks {
            let task_id = task_id_from_arn(&task.arn);
            for container in &task.containers {
                let (container_port, instance_port) = if task.desired_status == "RUNNING" {
                    (self.resolve_ports)(&container.docker_id)
                } else {
                    fallback_ports()
                };
                let key = SnapshotKey::derive(&container.docker_id, task_id, &task.desired_status);
                snapshot.insert(
                    key,
                    ContainerRecord {
                        container_id: container.docker_id.clone(),
                        container_name: container.name.clone(),
                        container_port,
                        task_id: task_id.to_string(),
                        task_name: task.family.clone(),
                        task_version: task.version.clone(),
                        instance_ip: facts.ip.clone(),
                        instance_id: facts.id.clone(),
                        instance_type: facts.instance_type.clone(),
                        instance_az: facts.az.clone(),
                        instance_port,
                        desired_status: task.desired_status.clone(),
                        known_status: task.known_status.clone(),
                        host_name: facts.host_name.clone(),
                        cluster_name: cluster.cluster.clone(),
                        orchestrator_agent_version: cluster.version.clone(),
                        sample_time: now,
                    },
                );
            }
        }
        snapshot
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        policy: &mut RetryPolicy,
        url: &str,
    ) -> Result<T, Error> {
        let body = self.get_text(policy, url).await?;
        serde_json::from_str(&body).map_err(|source| Error::MalformedMetadata {
            url: url.to_string(),
            source,
        })
    }

    /// One GET under the shared retry policy. A non-2xx status counts as a
    /// transient failure, like the connection errors it usually accompanies.
    async fn get_text(&self, policy: &mut RetryPolicy, url: &str) -> Result<String, Error> {
        debug!("connecting to {url}");
        let client = &self.client;
        with_backoff(policy, || async move {
            let response = client
                .get(url)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| Error::from_reqwest(url, e))?;
            response.text().await.map_err(|e| Error::from_reqwest(url, e))
        })
        .await
    }
}

/// Task id from a task ARN: the text after the last `:`, minus the
/// leading `task/`.
fn task_id_from_arn(arn: &str) -> &str {
    arn.rsplit(':').next().unwrap_or("").get(5..).unwrap_or("")
}

/// Ask docker for the port mappings of a container. Any failure at all
/// resolves to `("0", "0")`, the same placeholder used for containers that
/// are not running.
fn docker_port_mapping(container_id: &str) -> (String, String) {
    let short_id = container_id.get(..12).unwrap_or(container_id);
    let output = match Command::new("docker").args(["port", short_id]).output() {
        Ok(output) => output,
        Err(_) => return fallback_ports(),
    };
    if !output.status.success() {
        return fallback_ports();
    }
    parse_port_mapping(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the first `CPORT/proto -> HOST:HPORT` line of `docker port` output.
fn parse_port_mapping(output: &str) -> (String, String) {
    let Some(line) = output.lines().next() else {
        return fallback_ports();
    };
    let Some((container_side, host_side)) = line.split_once("->") else {
        return fallback_ports();
    };
    let container_port = container_side.split('/').next().unwrap_or("").trim();
    let host_port = host_side.rsplit(':').next().unwrap_or("").trim();
    if container_port.is_empty() || host_port.is_empty() {
        return fallback_ports();
    }
    (container_port.to_string(), host_port.to_string())
}

fn fallback_ports() -> (String, String) {
    ("0".to_string(), "0".to_string())
}

fn host_name() -> String {
    if let Ok(name) = env::var("HOSTNAME") {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    match fs::read_to_string("/proc/sys/kernel/hostname") {
        Ok(name) => name.trim().to_string(),
        Err(_) => String::new(),
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
