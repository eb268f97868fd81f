// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::future::Future;
use std::time::Duration;

use log::{debug, info};

use crate::errors::Error;

/// What the policy wants the caller to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep this long, then try again.
    RetryAfter(Duration),
    /// Budget exhausted; drop the payload. The policy has already reset.
    GiveUp,
}

/// Escalating backoff budget shared by every outbound call.
///
/// The delay starts at the base and is squared after each use, so the sleep
/// sequence is B, B^2, B^4 and so on. The counter survives across calls
/// until an attempt succeeds or the policy gives up; consecutive failing
/// calls in one burst keep escalating instead of each getting a fresh
/// budget.
///
/// The bound is strict: the counter starts at zero and the policy gives up
/// once it exceeds `max_retries`, so the default of 2 yields exactly three
/// sleeps (2s, 4s, 16s) before the drop.
#[derive(Debug)]
pub struct RetryPolicy {
    base: Duration,
    max_retries: u32,
    retries: u32,
    current: Duration,
}

impl RetryPolicy {
    pub fn new(base_secs: u64, max_retries: u32) -> RetryPolicy {
        let base = Duration::from_secs(base_secs);
        RetryPolicy {
            base,
            max_retries,
            retries: 0,
            current: base,
        }
    }

    /// Record a failed attempt and decide what happens next.
    pub fn on_failure(&mut self) -> RetryDecision {
        debug!(
            "backoff {}s, retry {} of {}",
            self.current.as_secs(),
            self.retries,
            self.max_retries
        );
        if self.retries > self.max_retries {
            info!("retry budget exhausted, giving up");
            self.reset();
            return RetryDecision::GiveUp;
        }
        let delay = self.current;
        self.retries += 1;
        let secs = delay.as_secs();
        self.current = Duration::from_secs(secs.saturating_mul(secs));
        RetryDecision::RetryAfter(delay)
    }

    /// Record a successful attempt.
    pub fn on_success(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.retries = 0;
        self.current = self.base;
    }
}

/// Run `op` until it succeeds, retrying transient failures under `policy`.
///
/// Non-transient errors return immediately without touching the budget. A
/// give-up returns the last error; the caller decides whether that means a
/// dropped payload or a skipped cycle.
pub(crate) async fn with_backoff<T, F, Fut>(policy: &mut RetryPolicy, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    loop {
        match op().await {
            Ok(value) => {
                policy.on_success();
                return Ok(value);
            }
            Err(err) if err.is_transient() => match policy.on_failure() {
                RetryDecision::RetryAfter(delay) => {
                    info!("sleeping for {} seconds: {err}", delay.as_secs());
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}
