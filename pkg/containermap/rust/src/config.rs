// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::env;

use log::warn;

use crate::errors::Error;

pub const DEFAULT_ORCHESTRATOR_URL: &str = "http://127.0.0.1:51678";
pub const DEFAULT_METADATA_URL: &str = "http://169.254.169.254/latest/meta-data";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 20;
const DEFAULT_BACKOFF_BASE_SECS: u64 = 2;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 1;

/// How reconciliation cycles are triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Fixed-period polling.
    Interval,
    /// Container lifecycle events from the local runtime.
    Reactive,
}

/// Agent configuration, resolved from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub collector_url: String,
    pub orchestrator_url: String,
    pub metadata_url: String,
    pub poll_interval_secs: u64,
    pub backoff_base_secs: u64,
    pub max_retries: u32,
    pub http_timeout_secs: u64,
    pub trigger: TriggerMode,
    pub log_level: log::Level,
}

impl Config {
    /// Read every recognized variable. The collector URL is the only
    /// required one; everything else has a default. Unparsable numeric
    /// values warn and fall back rather than failing startup.
    pub fn from_env() -> Result<Config, Error> {
        let collector_url = match env::var("DD_CM_COLLECTOR_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => {
                return Err(Error::Configuration(
                    "DD_CM_COLLECTOR_URL must be set to the collector base URL".to_string(),
                ));
            }
        };
        Ok(Config {
            collector_url,
            orchestrator_url: get_env_string("DD_CM_ORCHESTRATOR_URL", DEFAULT_ORCHESTRATOR_URL),
            metadata_url: get_env_string("DD_CM_METADATA_URL", DEFAULT_METADATA_URL),
            poll_interval_secs: get_env_u64("DD_CM_POLL_INTERVAL", DEFAULT_POLL_INTERVAL_SECS),
            backoff_base_secs: get_env_u64("DD_CM_BACKOFF_BASE", DEFAULT_BACKOFF_BASE_SECS),
            max_retries: get_env_u32("DD_CM_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            http_timeout_secs: get_env_u64("DD_CM_HTTP_TIMEOUT", DEFAULT_HTTP_TIMEOUT_SECS),
            trigger: get_trigger_mode(),
            log_level: log_level_from_env(),
        })
    }
}

fn get_env_string(var: &str, default: &str) -> String {
    env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn get_env_u64(var: &str, default: u64) -> u64 {
    match env::var(var) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("ignoring {var}={value}: not a whole number, using {default}");
                default
            }
        },
        Err(_) => default,
    }
}

fn get_env_u32(var: &str, default: u32) -> u32 {
    match env::var(var) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("ignoring {var}={value}: not a whole number, using {default}");
                default
            }
        },
        Err(_) => default,
    }
}

fn get_trigger_mode() -> TriggerMode {
    match env::var("DD_CM_TRIGGER") {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "interval" | "" => TriggerMode::Interval,
            "reactive" => TriggerMode::Reactive,
            other => {
                warn!("ignoring DD_CM_TRIGGER={other}: expected interval or reactive");
                TriggerMode::Interval
            }
        },
        Err(_) => TriggerMode::Interval,
    }
}

/// Parse a log level string into a log::Level.
/// Unknown levels silently default to Info.
fn parse_log_level(level: &str) -> log::Level {
    match level.to_lowercase().as_str() {
        "trace" => log::Level::Trace,
        "debug" => log::Level::Debug,
        "info" => log::Level::Info,
        "warn" | "warning" => log::Level::Warn,
        "error" | "critical" => log::Level::Error,
        "off" => log::Level::Error, // the log crate has no "off"; Error is the quietest
        _ => log::Level::Info,
    }
}

/// Gets the log level from the environment.
/// Priority: DD_LOG_LEVEL > LOG_LEVEL > default Info.
///
/// Public on its own so the binary can install the logger before the rest
/// of the configuration is parsed; parse warnings would otherwise be lost.
pub fn log_level_from_env() -> log::Level {
    if let Ok(level) = env::var("DD_LOG_LEVEL") {
        return parse_log_level(&level);
    }

    if let Ok(level) = env::var("LOG_LEVEL") {
        return parse_log_level(&level);
    }

    log::Level::Info
}
