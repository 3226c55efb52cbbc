//! Log formatting and output with ANSI colors
//!
//! Handles colorized console output with aligned tag/level columns,
//! dual output (console + file), and broken-pipe safety for piped runs.

use super::file::write_to_file;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Column widths for alignment
const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 8;

/// Format and output a log message to console and file
pub fn format_and_log(tag: LogTag, level: &str, message: &str) {
    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string();

    let tag_str = format_tag(&tag);
    let level_str = format_level(level);

    let console_line = format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        tag_str,
        level_str,
        message
    );
    print_stdout_safe(&console_line);

    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let file_line = format!(
        "{} [{}] [{}] {}",
        timestamp,
        tag.to_plain_string(),
        level,
        message
    );
    write_to_file(&file_line);
}

/// Format a tag with its subsystem color
fn format_tag(tag: &LogTag) -> ColoredString {
    let padded = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => padded.bright_yellow().bold(),
        LogTag::Config => padded.bright_white().bold(),
        LogTag::Engine => padded.bright_green().bold(),
        LogTag::Market => padded.bright_blue().bold(),
        LogTag::Swarm => padded.bright_magenta().bold(),
        LogTag::Consensus => padded.bright_cyan().bold(),
        LogTag::Risk => padded.bright_red().bold(),
        LogTag::Orders => padded.bright_yellow().bold(),
        LogTag::Exchange => padded.bright_cyan().bold(),
        LogTag::Portfolio => padded.bright_green().bold(),
        LogTag::Learner => padded.bright_magenta().bold(),
        LogTag::Sentiment => padded.bright_blue().bold(),
        LogTag::Webserver => padded.bright_green().bold(),
        LogTag::Test => padded.bright_blue().bold(),
        LogTag::Other(_) => padded.white().bold(),
    }
}

/// Format the log level column
fn format_level(level: &str) -> ColoredString {
    let padded = format!("{:<width$}", level, width = LEVEL_WIDTH);
    match level {
        "ERROR" => padded.bright_red().bold(),
        "WARNING" => padded.bright_yellow().bold(),
        "DEBUG" | "VERBOSE" => padded.dimmed(),
        _ => padded.white().bold(),
    }
}

/// Print to stdout but ignore broken pipe errors
fn print_stdout_safe(message: &str) {
    if let Err(e) = writeln!(stdout(), "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
    if let Err(e) = stdout().flush() {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
}
