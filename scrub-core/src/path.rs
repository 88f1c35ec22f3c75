use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Normalized absolute form of a path, used as the identity of a folder.
///
/// Two paths with the same identity refer to the same folder. Computing an
/// identity never touches the filesystem: relative paths are resolved
/// against the current directory, `.` and `..` are folded lexically and
/// trailing separators are dropped. On case-insensitive platforms the
/// identity is lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathIdentity(String);

impl PathIdentity {
    /// Compute the identity of `path`
    pub fn of<P: AsRef<Path>>(path: P) -> Self {
        let normalized = normalize(path.as_ref());
        Self(fold_case(normalized.to_string_lossy().into_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of `path`, see [`PathIdentity::of`]
pub fn identity<P: AsRef<Path>>(path: P) -> PathIdentity {
    PathIdentity::of(path)
}

/// Whether `a` and `b` have the same normalized absolute form
pub fn paths_equal<A: AsRef<Path>, B: AsRef<Path>>(a: A, b: B) -> bool {
    identity(a) == identity(b)
}

/// Make `path` absolute and fold `.`/`..` components without resolving symlinks
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(any(windows, target_os = "macos"))]
fn fold_case(path: String) -> String {
    path.to_lowercase()
}

#[cfg(not(any(windows, target_os = "macos")))]
fn fold_case(path: String) -> String {
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_after_normalization() {
        let base = std::env::temp_dir();
        assert!(paths_equal(base.join("a").join("bin"), base.join("a/./bin")));
        assert!(paths_equal(base.join("a").join("bin"), base.join("a/obj/../bin")));
        assert!(paths_equal(base.join("a").join("bin"), base.join("a/bin/")));
        assert!(!paths_equal(base.join("a").join("bin"), base.join("a").join("obj")));
    }

    #[test]
    fn test_relative_path_resolves_against_current_dir() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(identity("some/dir"), identity(cwd.join("some").join("dir")));
    }

    #[test]
    fn test_parent_of_root_stays_root() {
        let root = if cfg!(windows) { "C:\\" } else { "/" };
        let above = format!("{root}..");
        assert_eq!(identity(&above), identity(root));
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    #[test]
    fn test_case_sensitive_platform() {
        assert!(!paths_equal("/tmp/Bin", "/tmp/bin"));
    }

    #[cfg(any(windows, target_os = "macos"))]
    #[test]
    fn test_case_insensitive_platform() {
        let base = std::env::temp_dir();
        assert!(paths_equal(base.join("Bin"), base.join("bin")));
    }

    #[test]
    fn test_normalize_has_no_filesystem_access() {
        // 不存在的路径也能得到稳定的标识
        let missing = std::env::temp_dir().join("scrub-missing").join("x").join("..");
        assert_eq!(
            normalize(&missing),
            normalize(&std::env::temp_dir().join("scrub-missing"))
        );
    }
}
