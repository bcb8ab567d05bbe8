use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::LauncherConfig;
use crate::errors::SearchResult;
use crate::search::{FileNameSearcher, PortableAppSearcher, Searcher, TextSearcher};

/// Application state built once at startup and handed by reference to every
/// backend and to the orchestrator.
#[derive(Debug, Clone)]
pub struct LauncherContext {
    config: LauncherConfig,
    working_dir: PathBuf,
}

impl LauncherContext {
    /// Resolves the working directory: the configured one, or the process
    /// current directory when none is set.
    pub fn new(config: LauncherConfig) -> SearchResult<Self> {
        let working_dir = match &config.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        debug!("Launcher working directory: {}", working_dir.display());
        Ok(Self {
            config,
            working_dir,
        })
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Builds the enabled backends, in fixed order: portable apps, file
    /// names, file contents.
    ///
    /// The portable app index starts scanning here, not on first query.
    pub fn build_searchers(&self) -> Vec<Arc<dyn Searcher>> {
        let mut searchers: Vec<Arc<dyn Searcher>> = Vec::new();
        if self.config.portable_app_support {
            searchers.push(Arc::new(PortableAppSearcher::new(self)));
        }
        if self.config.file_name_support {
            searchers.push(Arc::new(FileNameSearcher::new(self)));
        }
        if self.config.text_support {
            searchers.push(Arc::new(TextSearcher::new(self)));
        }

        info!(
            "Registered searchers: [{}]",
            searchers
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        searchers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_working_dir_defaults_to_current_dir() {
        let context = LauncherContext::new(LauncherConfig::default()).unwrap();
        assert_eq!(context.working_dir(), std::env::current_dir().unwrap());
    }

    #[test]
    fn test_configured_working_dir() {
        let dir = tempdir().unwrap();
        let config = LauncherConfig {
            working_dir: Some(dir.path().to_path_buf()),
            ..LauncherConfig::default()
        };
        let context = LauncherContext::new(config).unwrap();
        assert_eq!(context.working_dir(), dir.path());
    }

    #[test]
    fn test_build_searchers_follows_toggles() {
        let dir = tempdir().unwrap();
        let mut config = LauncherConfig {
            working_dir: Some(dir.path().to_path_buf()),
            portable_app_support: true,
            file_name_support: true,
            text_support: true,
            ..LauncherConfig::default()
        };

        let names: Vec<_> = LauncherContext::new(config.clone())
            .unwrap()
            .build_searchers()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["portable-apps", "file-name", "text"]);

        config.portable_app_support = false;
        config.text_support = false;
        let names: Vec<_> = LauncherContext::new(config)
            .unwrap()
            .build_searchers()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["file-name"]);
    }
}
