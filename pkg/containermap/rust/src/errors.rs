// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use thiserror::Error;

/// Failure taxonomy for agent operations.
///
/// Every failure path resolves to one of these; nothing in the agent panics
/// past startup. Transient errors go through the retry policy and end as
/// dropped payloads or skipped cycles, malformed metadata skips the cycle,
/// and configuration errors are fatal before the loop starts.
#[derive(Debug, Error)]
pub enum Error {
    /// The request failed in flight or the endpoint answered with an error
    /// status.
    #[error("transient network error for {url}: {source}")]
    TransientNetwork {
        url: String,
        source: reqwest::Error,
    },

    /// The orchestrator answered with a body that does not parse at the top
    /// level.
    #[error("malformed metadata from {url}: {source}")]
    MalformedMetadata {
        url: String,
        source: serde_json::Error,
    },

    /// Required configuration is missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Wrap a reqwest failure against the URL it hit. Everything reqwest
    /// reports on the request path is transient here; response bodies are
    /// parsed separately and have their own variant.
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        Error::TransientNetwork {
            url: url.to_string(),
            source,
        }
    }

    /// Whether the retry policy should take another attempt at this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientNetwork { .. })
    }
}
