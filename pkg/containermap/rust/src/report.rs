// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Write side of the agent: event and snapshot reports to the collector.

use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::config::Config;
use crate::errors::Error;
use crate::retry::{RetryPolicy, with_backoff};
use crate::state::{Snapshot, SnapshotKey, unix_now};

/// Membership change for a single snapshot key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Added,
    Removed,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Added => "added",
            EventAction::Removed => "removed",
        }
    }
}

#[derive(Serialize)]
struct EventBody<'a> {
    event_id: &'a str,
    event: &'static str,
    timestamp: f64,
}

pub struct Reporter {
    client: reqwest::Client,
    collector_url: String,
}

impl Reporter {
    pub fn new(config: &Config) -> Result<Reporter, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("could not build HTTP client: {e}")))?;
        Ok(Reporter {
            client,
            collector_url: config.collector_url.trim_end_matches('/').to_string(),
        })
    }

    /// Report one membership change. Fire and forget: when retries run out
    /// the event is logged and dropped, and the cycle moves on.
    pub async fn report_event(
        &self,
        policy: &mut RetryPolicy,
        key: &SnapshotKey,
        action: EventAction,
    ) {
        info!("reporting container event {} for {key}", action.as_str());
        let url = format!("{}/report/event", self.collector_url);
        let body = EventBody {
            event_id: key.as_str(),
            event: action.as_str(),
            timestamp: unix_now(),
        };
        if let Err(err) = self.post_json(policy, &url, &body).await {
            error!("dropping {} event for {key}: {err}", action.as_str());
        }
    }

    /// Report the full key to record map. The caller commits its candidate
    /// snapshot only when this returns Ok.
    pub async fn report_snapshot(
        &self,
        policy: &mut RetryPolicy,
        snapshot: &Snapshot,
    ) -> Result<(), Error> {
        info!("reporting current container map ({} entries)", snapshot.len());
        let url = format!("{}/report/map", self.collector_url);
        self.post_json(policy, &url, snapshot).await
    }

    /// One POST under the shared retry policy. Delivery means the collector
    /// answered at all: a non-2xx status is logged and still counts, only
    /// transport failures are errors.
    async fn post_json<T: Serialize>(
        &self,
        policy: &mut RetryPolicy,
        url: &str,
        body: &T,
    ) -> Result<(), Error> {
        let client = &self.client;
        let status = with_backoff(policy, || async move {
            client
                .post(url)
                .json(body)
                .send()
                .await
                .map(|response| response.status())
                .map_err(|e| Error::from_reqwest(url, e))
        })
        .await?;
        if status.is_success() {
            debug!("HTTP response: {status}");
        } else {
            warn!("collector answered {status} for {url}");
        }
        Ok(())
    }
}
