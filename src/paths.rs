/// Filesystem layout for runtime data
///
/// All mutable state lives under a single data directory next to the
/// binary (overridable with SWARMBOT_DATA_DIR):
///
/// ```text
/// data/
///   logs/            daily log files
///   learning/        experience buffer snapshots
/// ```
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Root data directory
pub fn data_dir() -> PathBuf {
    match env::var("SWARMBOT_DATA_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("data"),
    }
}

/// Directory for log files
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Directory for learner snapshots
pub fn learning_dir() -> PathBuf {
    data_dir().join("learning")
}

/// Experience buffer snapshot file
pub fn experience_snapshot_path() -> PathBuf {
    learning_dir().join("experience.json")
}

/// Default config file location (next to the binary)
pub fn config_file_path() -> PathBuf {
    match crate::arguments::config_path_override() {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from("swarmbot.json"),
    }
}

/// Create every directory the bot needs. Called before logger init.
pub fn ensure_all_directories() -> io::Result<()> {
    fs::create_dir_all(logs_dir())?;
    fs::create_dir_all(learning_dir())?;
    Ok(())
}
