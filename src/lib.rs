//! # Scrub
//!
//! A tool for removing build output and cache folders (`bin`, `obj`,
//! `packages`, `TestResults`, `.vs`) from project workspaces.
//!
//! ## Features
//!
//! - Discover output folders below every project of a workspace
//! - Keep files under version control and `.refresh` marker files
//! - Delete twice, with a settle delay, to catch regenerated files
//! - Run on demand or when the host reports a clean build
//!
//! ## Usage
//!
//! ### Command Line
//!
//! ```bash
//! # Show what would be removed
//! scrub scan
//!
//! # Clean the current directory, including TestResults folders
//! scrub run --test-results
//!
//! # Tell scrub that a workspace-wide clean just finished
//! scrub notify build-finished --action clean
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use scrub::{DeletionRuleSet, DiscoveryConfig, FolderDiscovery, SafeDeleter};
//! use std::fs;
//!
//! let workspace = tempfile::tempdir()?;
//! let project = workspace.path().join("App");
//! fs::create_dir_all(project.join("bin").join("Debug"))?;
//! fs::write(project.join("bin").join("Debug").join("App.dll"), "dll")?;
//!
//! let discovery = FolderDiscovery::new(DiscoveryConfig {
//!     external_base: None,
//!     ..Default::default()
//! });
//! let folders = discovery.discover(&[project.clone()], &DeletionRuleSet::default());
//!
//! let report = SafeDeleter::default().delete_all(&folders);
//! assert_eq!(report.deleted_files(), 1);
//! assert!(!project.join("bin").exists());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export core functionality
pub use scrub_core::*;
