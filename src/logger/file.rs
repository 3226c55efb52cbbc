//! File persistence for log output
//!
//! Appends plain-text log lines to a daily log file under the logs
//! directory. Write failures are silently ignored; logging must never
//! take the bot down.

use crate::paths;
use chrono::Local;
use once_cell::sync::Lazy;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

static LOG_FILE: Lazy<Mutex<Option<File>>> = Lazy::new(|| Mutex::new(None));

/// Open today's log file for appending
pub fn init_file_logging() {
    let filename = format!("swarmbot_{}.log", Local::now().format("%Y-%m-%d"));
    let path = paths::logs_dir().join(filename);

    let file = OpenOptions::new().create(true).append(true).open(&path);

    if let (Ok(file), Ok(mut guard)) = (file, LOG_FILE.lock()) {
        *guard = Some(file);
    }
}

/// Append a line to the log file (no-op when file logging is unavailable)
pub fn write_to_file(line: &str) {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(file) = guard.as_mut() {
            let _ = writeln!(file, "{}", line);
        }
    }
}

/// Flush pending writes to disk
pub fn flush_file_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(file) = guard.as_mut() {
            let _ = file.flush();
        }
    }
}
