//! Services the cleanup engine consumes from its host.
//!
//! The engine never talks to an IDE, a terminal or a version control system
//! directly. Everything host-specific goes through the traits below, which
//! are injected into [`crate::CleanupOrchestrator`] and [`crate::SafeDeleter`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::rules::DeletionRuleSet;

/// The container of projects the user has open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    pub path: PathBuf,
}

/// A project reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// Project file or project directory, `None` when the host cannot resolve it
    pub path: Option<PathBuf>,
    pub loaded: bool,
}

impl Project {
    pub fn new<P: Into<PathBuf>>(name: impl Into<String>, path: P) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
            loaded: true,
        }
    }

    /// Directory the project lives in.
    ///
    /// A path pointing at an existing file (the project manifest) resolves to
    /// its parent directory, anything else is taken as the root itself.
    /// Unloaded projects have no root.
    pub fn root(&self) -> Option<PathBuf> {
        if !self.loaded {
            return None;
        }

        let path = self.path.as_ref()?;
        if path.as_os_str().is_empty() {
            return None;
        }

        if path.is_file() {
            path.parent().map(Path::to_path_buf)
        } else {
            Some(path.clone())
        }
    }
}

pub trait WorkspaceProvider: Send + Sync {
    fn current_workspace(&self) -> Option<Workspace>;

    fn all_projects(&self) -> Result<Vec<Project>>;
}

pub trait VersionControlStatus: Send + Sync {
    /// Whether `path` is tracked by version control
    fn is_controlled(&self, path: &Path) -> bool;
}

pub trait NativeCleanInvoker: Send + Sync {
    /// Run the host's own clean action; blocks until it is done
    fn run_default_clean(&self) -> Result<()>;
}

/// Output surface of the host. Calls must return promptly.
pub trait StatusReporter: Send + Sync {
    fn message(&self, text: &str);

    fn progress(&self, label: &str, current: usize, total: usize);

    fn status_bar_message(&self, text: &str);
}

pub trait SettingsStore: Send + Sync {
    /// Current rules; every call returns an independent snapshot
    fn rules(&self) -> DeletionRuleSet;
}

/// No version control: every file is deletable
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVersionControl;

impl VersionControlStatus for NoVersionControl {
    fn is_controlled(&self, _path: &Path) -> bool {
        false
    }
}

/// Host without a native clean action
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNativeClean;

impl NativeCleanInvoker for NoNativeClean {
    fn run_default_clean(&self) -> Result<()> {
        debug!("No native clean action configured");
        Ok(())
    }
}

/// Reporter that forwards everything to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl StatusReporter for TracingReporter {
    fn message(&self, text: &str) {
        info!("{}", text);
    }

    fn progress(&self, label: &str, current: usize, total: usize) {
        debug!("{}: {}/{}", label, current, total);
    }

    fn status_bar_message(&self, text: &str) {
        info!("[status] {}", text);
    }
}

/// In-memory settings that can be changed while runs are in progress
#[derive(Debug, Default, Clone)]
pub struct SharedSettings {
    rules: Arc<RwLock<DeletionRuleSet>>,
}

impl SharedSettings {
    pub fn new(rules: DeletionRuleSet) -> Self {
        Self {
            rules: Arc::new(RwLock::new(rules)),
        }
    }

    pub fn set(&self, rules: DeletionRuleSet) {
        let mut guard = self.rules.write().unwrap_or_else(|e| e.into_inner());
        *guard = rules;
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut DeletionRuleSet),
    {
        let mut guard = self.rules.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

impl SettingsStore for SharedSettings {
    fn rules(&self) -> DeletionRuleSet {
        self.rules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_project_root_from_manifest_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let manifest = temp_dir.path().join("App.csproj");
        std::fs::write(&manifest, "<Project />")?;

        let project = Project::new("App", &manifest);
        assert_eq!(project.root(), Some(temp_dir.path().to_path_buf()));

        let project = Project::new("App", temp_dir.path());
        assert_eq!(project.root(), Some(temp_dir.path().to_path_buf()));

        Ok(())
    }

    #[test]
    fn test_unloaded_or_unresolved_project_has_no_root() {
        let mut project = Project::new("App", "/some/where");
        project.loaded = false;
        assert_eq!(project.root(), None);

        let project = Project {
            name: "Ghost".to_string(),
            path: None,
            loaded: true,
        };
        assert_eq!(project.root(), None);

        let project = Project::new("Empty", "");
        assert_eq!(project.root(), None);
    }

    #[test]
    fn test_shared_settings_snapshots_are_independent() {
        let settings = SharedSettings::new(DeletionRuleSet::default());
        let snapshot = settings.rules();

        settings.update(|rules| rules.delete_build_output_folders = false);

        assert!(snapshot.delete_build_output_folders);
        assert!(!settings.rules().delete_build_output_folders);

        settings.set(DeletionRuleSet::none());
        assert_eq!(settings.rules(), DeletionRuleSet::none());
    }
}
