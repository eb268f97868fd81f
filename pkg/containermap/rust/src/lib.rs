// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Sidecar agent that maps the containers running on an ECS instance and
//! keeps a remote collector's view of them current. Each cycle fetches the
//! orchestrator's task state, diffs it against the last acknowledged
//! snapshot, and pushes membership events plus the full map.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod config;
mod errors;
mod fetch;
mod reconcile;
mod report;
mod retry;
mod state;

// Re-export the public API
pub use config::{Config, TriggerMode};
pub use errors::Error;
pub use fetch::{InstanceFacts, MetadataFetcher, PortResolver};
pub use reconcile::{CycleOutcome, Reconciler};
pub use report::{EventAction, Reporter};
pub use retry::{RetryDecision, RetryPolicy};
pub use state::{ContainerRecord, Snapshot, SnapshotDiff, SnapshotKey, diff};
