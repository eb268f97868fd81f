// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Minimal process logger shared by the agent daemons.
//!
//! Records are printed as `2026-01-02T15:04:05.000Z LEVEL [target] message`.
//! INFO and below go to stdout, WARN and ERROR to stderr, so supervisors and
//! test harnesses can split the two streams.

use std::io::Write;

use log::{Level, Log, Metadata, Record, SetLoggerError};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

struct SimpleLogger {
    level: Level,
}

fn format_line(record: &Record) -> String {
    let timestamp = OffsetDateTime::now_utc()
        .format(&TIMESTAMP_FORMAT)
        .unwrap_or_default();
    format!(
        "{} {:<5} [{}] {}",
        timestamp,
        record.level(),
        record.target(),
        record.args()
    )
}

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record);
        // A write failure here has nowhere useful to go.
        match record.level() {
            Level::Error | Level::Warn => {
                let _ = writeln!(std::io::stderr().lock(), "{line}");
            }
            _ => {
                let _ = writeln!(std::io::stdout().lock(), "{line}");
            }
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
    }
}

/// Install the process-wide logger at the given maximum level.
///
/// Fails if a logger is already installed.
pub fn init_with_level(level: Level) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(SimpleLogger { level }))?;
    log::set_max_level(level.to_level_filter());
    Ok(())
}
