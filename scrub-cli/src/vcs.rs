//! Version control status backed by the `git` command line.

use scrub_core::{PathIdentity, VersionControlStatus};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Asks git whether a file is tracked.
///
/// The index of each repository is listed once with `git ls-files` and kept
/// for the lifetime of the value.
#[derive(Debug, Default)]
pub struct GitStatus {
    tracked: Mutex<HashMap<PathBuf, HashSet<PathIdentity>>>,
}

impl GitStatus {
    pub fn new() -> Self {
        Self::default()
    }

    fn repository_root(path: &Path) -> Option<PathBuf> {
        path.ancestors()
            .skip(1)
            .find(|ancestor| ancestor.join(".git").exists())
            .map(Path::to_path_buf)
    }

    fn list_tracked(root: &Path) -> HashSet<PathIdentity> {
        let output = Command::new("git")
            .arg("ls-files")
            .arg("-z")
            .current_dir(root)
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let files: HashSet<PathIdentity> = output
                    .stdout
                    .split(|b| *b == 0)
                    .filter(|entry| !entry.is_empty())
                    .map(|entry| PathIdentity::of(root.join(&*String::from_utf8_lossy(entry))))
                    .collect();
                debug!("{} tracked files in {:?}", files.len(), root);
                files
            }
            Ok(output) => {
                warn!(
                    "git ls-files failed in {:?}: {}",
                    root,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                HashSet::new()
            }
            Err(e) => {
                warn!("Failed to run git in {:?}: {}", root, e);
                HashSet::new()
            }
        }
    }
}

impl VersionControlStatus for GitStatus {
    fn is_controlled(&self, path: &Path) -> bool {
        let Some(root) = Self::repository_root(path) else {
            return false;
        };

        let mut tracked = self.tracked.lock().unwrap_or_else(|e| e.into_inner());
        tracked
            .entry(root)
            .or_insert_with_key(|root| Self::list_tracked(root))
            .contains(&PathIdentity::of(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn git(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .is_ok_and(|o| o.status.success())
    }

    #[test]
    fn test_outside_repository() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("bin").join("x.dll");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "x").unwrap();

        assert!(!GitStatus::new().is_controlled(&file));
    }

    #[test]
    fn test_tracked_and_untracked_files() {
        if !git_available() {
            eprintln!("git not available, skipping");
            return;
        }

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        if !git(root, &["init", "-q"]) {
            eprintln!("git init failed, skipping");
            return;
        }

        let bin = root.join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("tracked.dll"), "t").unwrap();
        fs::write(bin.join("build.dll"), "b").unwrap();
        assert!(git(root, &["add", "bin/tracked.dll"]));

        let status = GitStatus::new();
        assert!(status.is_controlled(&bin.join("tracked.dll")));
        assert!(!status.is_controlled(&bin.join("build.dll")));
    }
}
