use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::SearchResult;

/// Upper bound on content-search workers regardless of core count.
pub const MAX_TEXT_THREADS: usize = 12;

/// Launcher settings.
///
/// # Configuration Locations
///
/// Loaded from, in increasing order of precedence:
/// 1. Global `$HOME/.config/launchr/config.yaml`
/// 2. Local `.launchr.yaml` in the current directory
/// 3. Custom file given via `--config`
///
/// # Configuration Format
///
/// ```yaml
/// # Directory every backend searches (default: current directory)
/// working_dir: "D:/PortableApps"
///
/// # Backend toggles
/// portable_app_support: true
/// file_name_support: true
/// text_support: false
///
/// # Bytes of each file scanned by content search (0 = whole file)
/// text_max_size: 1048576
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
///
/// Command-line values take precedence over file values, see `merge_with_cli`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LauncherConfig {
    /// Root of every search. `None` means the process working directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Enable the portable application index
    #[serde(default = "default_true")]
    pub portable_app_support: bool,

    /// Enable live file name search
    #[serde(default = "default_true")]
    pub file_name_support: bool,

    /// Enable live file content search
    #[serde(default)]
    pub text_support: bool,

    /// Maximum number of bytes scanned per file by content search.
    /// Matches beyond this offset are not reported. 0 disables the limit.
    #[serde(default)]
    pub text_max_size: u64,

    /// Cap on content search worker threads
    #[serde(default = "default_max_text_threads")]
    pub max_text_threads: usize,

    /// Depth limit for file name search, `None` for unbounded
    #[serde(default)]
    pub file_name_max_depth: Option<usize>,

    /// Sleep between orchestrator ticks that produced nothing
    #[serde(default = "default_poll_idle_ms")]
    pub poll_idle_ms: u64,

    /// Interval between progress notifications
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_max_text_threads() -> usize {
    MAX_TEXT_THREADS
}

fn default_poll_idle_ms() -> u64 {
    10
}

fn default_progress_interval_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            portable_app_support: true,
            file_name_support: true,
            text_support: false,
            text_max_size: 0,
            max_text_threads: default_max_text_threads(),
            file_name_max_depth: None,
            poll_idle_ms: default_poll_idle_ms(),
            progress_interval_ms: default_progress_interval_ms(),
            log_level: default_log_level(),
        }
    }
}

/// Overrides supplied on the command line. `None` leaves the file value alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub working_dir: Option<PathBuf>,
    pub portable_app_support: Option<bool>,
    pub file_name_support: Option<bool>,
    pub text_support: Option<bool>,
    pub text_max_size: Option<u64>,
    pub log_level: Option<String>,
}

impl LauncherConfig {
    /// Loads configuration, layering `config_path` over the default locations
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("launchr/config.yaml")),
            Some(PathBuf::from(".launchr.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicit file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Merges command line values over configuration file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if cli.working_dir.is_some() {
            self.working_dir = cli.working_dir;
        }
        if let Some(enabled) = cli.portable_app_support {
            self.portable_app_support = enabled;
        }
        if let Some(enabled) = cli.file_name_support {
            self.file_name_support = enabled;
        }
        if let Some(enabled) = cli.text_support {
            self.text_support = enabled;
        }
        if let Some(size) = cli.text_max_size {
            self.text_max_size = size;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Scanned-bytes limit for content search, `None` when unlimited
    pub fn text_limit(&self) -> Option<usize> {
        match self.text_max_size {
            0 => None,
            n => Some(usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }

    /// Number of content search workers: core count, capped, at least one
    pub fn text_worker_count(&self) -> usize {
        let cap = self.max_text_threads.clamp(1, MAX_TEXT_THREADS);
        num_cpus::get().clamp(1, cap)
    }

    pub fn poll_idle(&self) -> Duration {
        Duration::from_millis(self.poll_idle_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}
