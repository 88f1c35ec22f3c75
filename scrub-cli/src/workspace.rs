use anyhow::{Context, Result};
use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use scrub_core::{Project, Workspace, WorkspaceProvider};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Manifest file patterns recognised when no configuration says otherwise
pub const DEFAULT_MANIFEST_PATTERNS: &[&str] = &[
    "*.csproj",
    "*.vbproj",
    "*.fsproj",
    "*.vcxproj",
    "*.sqlproj",
];

/// A plain directory acting as the workspace.
///
/// Projects are the manifest files found beneath it.
#[derive(Debug, Clone)]
pub struct DirectoryWorkspace {
    root: PathBuf,
    manifest_patterns: Vec<String>,
    max_depth: Option<usize>,
}

impl DirectoryWorkspace {
    pub fn new<P: AsRef<Path>>(root: P, manifest_patterns: Vec<String>) -> Self {
        Self {
            root: scrub_core::path::normalize(root.as_ref()),
            manifest_patterns,
            max_depth: Some(10),
        }
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifest_filter(&self) -> Result<Override> {
        let mut builder = OverrideBuilder::new(&self.root);
        for pattern in &self.manifest_patterns {
            builder
                .add(pattern)
                .with_context(|| format!("Invalid manifest pattern: {pattern}"))?;
        }
        builder.build().context("Failed to build manifest filter")
    }

    fn project_from_manifest(manifest: &Path) -> Project {
        let name = manifest
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| manifest.display().to_string());

        Project::new(name, manifest)
    }
}

impl WorkspaceProvider for DirectoryWorkspace {
    fn current_workspace(&self) -> Option<Workspace> {
        if !self.root.is_dir() {
            debug!("Workspace root is not a directory: {:?}", self.root);
            return None;
        }

        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string());

        Some(Workspace {
            name,
            path: self.root.clone(),
        })
    }

    fn all_projects(&self) -> Result<Vec<Project>> {
        if self.manifest_patterns.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .follow_links(false)
            .hidden(true)
            .git_ignore(true)
            .max_depth(self.max_depth)
            .overrides(self.manifest_filter()?);

        let mut projects: Vec<Project> = builder
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Walk error: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(|entry| {
                debug!("Found manifest: {:?}", entry.path());
                Self::project_from_manifest(entry.path())
            })
            .collect();

        projects.sort_by(|a, b| a.path.cmp(&b.path));
        info!("Found {} projects in {:?}", projects.len(), self.root);

        Ok(projects)
    }
}
