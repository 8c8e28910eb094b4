/*
 * This file is part of uboot-bootcount.
 *
 * Copyright (C) 2025 uboot-bootcount contributors
 *
 * uboot-bootcount is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * uboot-bootcount is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with uboot-bootcount. If not, see <https://www.gnu.org/licenses/>.
 */

//! Diagnostics: a stderr `tracing` subscriber, plus an optional JSON-lines
//! event log for boards where stderr is not collected.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use crate::constants::paths::{EVENT_LOG, EVENT_LOG_FALLBACK};

lazy_static! {
    static ref LOG_FILE: Mutex<Option<File>> = Mutex::new(None);
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Install the stderr subscriber. `RUST_LOG` wins over `debug`.
pub fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn open_append(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Open the event log, falling back to /tmp when /var/log is not writable.
/// Returns the file in use.
pub fn init_event_log() -> Option<PathBuf> {
    [EVENT_LOG, EVENT_LOG_FALLBACK]
        .iter()
        .map(PathBuf::from)
        .find(|path| init_event_log_at(path))
}

pub fn init_event_log_at(path: &Path) -> bool {
    match open_append(path) {
        Some(f) => {
            if let Ok(mut guard) = LOG_FILE.lock() {
                *guard = Some(f);
                return true;
            }
            false
        }
        None => false,
    }
}

/// Append one event. Silently dropped while no event log is open.
pub fn log_event(event: &str, data: Value) {
    let line = json!({
        "ts_ms": now_millis(),
        "event": event,
        "data": data,
    })
    .to_string();

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(f) = guard.as_mut() {
            let _ = writeln!(f, "{}", line);
        }
    }
}

pub fn shutdown_event_log() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(mut f) = guard.take() {
            let _ = f.flush();
        }
    }
}
