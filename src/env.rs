//! Defaults and well-known paths.
//!
//! Centralizes the hardcoded names and values used throughout the application.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory name (hidden, like .git)
pub const LABBOX_DIR_NAME: &str = ".labbox";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "labbox.toml";

/// System-wide configuration file (Unix-like systems)
pub const SYSTEM_CONFIG_FILE: &str = "/etc/labbox/config.toml";

/// Engine executable used by the CLI backend
pub const DEFAULT_ENGINE_EXECUTABLE: &str = "podman";

/// Image the submissions run in
pub const DEFAULT_IMAGE: &str = "localhost/labwork-runner:latest";

/// Remote test server the runner talks to
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/";

/// Program started inside the container
pub const DEFAULT_RUNNER_COMMAND: &str = "labwork-runner";

/// Suffix a submission file name must carry
pub const DEFAULT_ARCHIVE_SUFFIX: &str = ".zip";

/// Where the submission is copied inside the container
pub const DEFAULT_CONTAINER_PATH: &str = "/labwork/submission.zip";

/// Seconds a submission may run before it is stopped
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Delay between two polling passes
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Build the application directory path from a base directory
pub fn labbox_dir_path(base: &Path) -> PathBuf {
    base.join(LABBOX_DIR_NAME)
}

/// Build the local config file path (`./.labbox/config.toml`)
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    labbox_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

/// Build the user config file path (`~/.labbox/config.toml`)
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    labbox_dir_path(home_dir).join(CONFIG_FILE_NAME)
}
