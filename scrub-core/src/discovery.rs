use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::path::{PathIdentity, normalize};
use crate::rules::DeletionRuleSet;

/// 版本控制内部目录，永远不进入
pub const VCS_INTERNALS: &[&str] = &[
    ".git", ".jj", ".svn", ".hg", ".bzr", "_darcs", ".pijul", "CVS", ".fossil",
];

/// 待删除的候选目录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFolder {
    pub path: PathBuf,
    pub identity: PathIdentity,
    /// 发现时目录是否存在
    pub exists: bool,
}

impl CandidateFolder {
    /// 根据当前文件系统状态创建候选目录
    pub fn inspect<P: AsRef<Path>>(path: P) -> Self {
        let path = normalize(path.as_ref());
        let identity = PathIdentity::of(&path);
        let exists = path.is_dir();
        Self {
            path,
            identity,
            exists,
        }
    }

    /// 目录名称
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

/// 目录发现配置
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub max_depth: Option<usize>,
    pub follow_links: bool,
    pub parallel: bool,
    /// 外部日志目录的基准路径（默认为用户文档目录）
    pub external_base: Option<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            follow_links: false,
            parallel: true,
            external_base: dirs::document_dir(),
        }
    }
}

/// 候选目录发现器
#[derive(Debug, Clone, Default)]
pub struct FolderDiscovery {
    config: DiscoveryConfig,
}

impl FolderDiscovery {
    /// 创建新的发现器
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// 在项目根目录下查找所有需要删除的目录
    ///
    /// 结果已去重、只包含当前存在的目录，并按路径标识排序。
    pub fn discover(&self, roots: &[PathBuf], rules: &DeletionRuleSet) -> Vec<CandidateFolder> {
        let names = rules.folder_names();
        debug!("查找目录 {:?}，共 {} 个项目根目录", names, roots.len());

        let mut paths: Vec<PathBuf> = if names.is_empty() {
            Vec::new()
        } else if self.config.parallel {
            self.scan_roots_parallel(roots, &names)
        } else {
            self.scan_roots_sequential(roots, &names)
        };

        paths.extend(self.external_folders(rules));

        let mut unique: BTreeMap<PathIdentity, PathBuf> = BTreeMap::new();
        for path in paths {
            unique.entry(PathIdentity::of(&path)).or_insert(path);
        }

        let candidates: Vec<CandidateFolder> = unique
            .into_values()
            .map(CandidateFolder::inspect)
            .filter(|folder| folder.exists)
            .collect();

        info!("找到 {} 个可删除的目录", candidates.len());
        candidates
    }

    /// 并行扫描项目根目录
    fn scan_roots_parallel(&self, roots: &[PathBuf], names: &[&str]) -> Vec<PathBuf> {
        roots
            .par_iter()
            .flat_map_iter(|root| self.scan_root(root, names))
            .collect()
    }

    /// 串行扫描项目根目录
    fn scan_roots_sequential(&self, roots: &[PathBuf], names: &[&str]) -> Vec<PathBuf> {
        roots
            .iter()
            .flat_map(|root| self.scan_root(root, names))
            .collect()
    }

    /// 扫描单个项目根目录
    fn scan_root(&self, root: &Path, names: &[&str]) -> Vec<PathBuf> {
        if !root.is_dir() {
            debug!("项目根目录不存在，跳过: {:?}", root);
            return Vec::new();
        }

        let mut walker = WalkDir::new(root).follow_links(self.config.follow_links);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut found = Vec::new();
        let mut entries = walker.into_iter();
        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("扫描错误: {}", e);
                    continue;
                }
            };

            if entry.depth() == 0 || !entry.file_type().is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if names.iter().any(|n| *n == name) {
                debug!("发现目录: {:?}", entry.path());
                found.push(entry.path().to_path_buf());
                // 匹配目录的内容会随它一起清理
                entries.skip_current_dir();
            } else if VCS_INTERNALS.contains(&&*name) {
                entries.skip_current_dir();
            }
        }

        found
    }

    /// 项目目录之外的固定目录
    fn external_folders(&self, rules: &DeletionRuleSet) -> Vec<PathBuf> {
        if !rules.delete_external_log_folder && !rules.delete_external_trace_folder {
            return Vec::new();
        }

        match &self.config.external_base {
            Some(base) => rules.external_folders(base),
            None => {
                warn!("无法确定用户文档目录，跳过外部日志目录");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;

    fn config_without_external() -> DiscoveryConfig {
        DiscoveryConfig {
            external_base: None,
            ..Default::default()
        }
    }

    fn build_only() -> DeletionRuleSet {
        DeletionRuleSet {
            delete_build_output_folders: true,
            ..DeletionRuleSet::none()
        }
    }

    fn paths(candidates: &[CandidateFolder]) -> Vec<PathBuf> {
        candidates.iter().map(|c| c.path.clone()).collect()
    }

    #[test]
    fn test_discover_build_output_folders() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let project = temp_dir.path().join("P");
        fs::create_dir_all(project.join("bin"))?;
        fs::create_dir_all(project.join("obj"))?;
        fs::create_dir_all(project.join("src"))?;

        let discovery = FolderDiscovery::new(config_without_external());
        let found = discovery.discover(&[project.clone()], &build_only());

        assert_eq!(
            paths(&found),
            vec![normalize(&project.join("bin")), normalize(&project.join("obj"))]
        );
        assert!(found.iter().all(|c| c.exists));

        Ok(())
    }

    #[test]
    fn test_discover_nested_folders() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let project = temp_dir.path().join("P");
        fs::create_dir_all(project.join("tools").join("gen").join("obj"))?;
        fs::create_dir_all(project.join("bin").join("Debug").join("bin"))?;

        let discovery = FolderDiscovery::new(config_without_external());
        let found = discovery.discover(&[project.clone()], &build_only());

        // 不进入已匹配的目录
        assert_eq!(
            paths(&found),
            vec![
                normalize(&project.join("bin")),
                normalize(&project.join("tools").join("gen").join("obj")),
            ]
        );

        Ok(())
    }

    #[test]
    fn test_discover_respects_rules() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let project = temp_dir.path().join("P");
        for name in ["bin", "obj", "packages", "TestResults", ".vs"] {
            fs::create_dir_all(project.join(name))?;
        }

        let discovery = FolderDiscovery::new(config_without_external());

        let rules = DeletionRuleSet {
            delete_test_results_folder: true,
            delete_ide_metadata_folder: true,
            ..DeletionRuleSet::none()
        };
        let found = discovery.discover(&[project.clone()], &rules);
        assert_eq!(
            paths(&found),
            vec![normalize(&project.join(".vs")), normalize(&project.join("TestResults"))]
        );

        let found = discovery.discover(&[project.clone()], &DeletionRuleSet::none());
        assert!(found.is_empty());

        Ok(())
    }

    #[test]
    fn test_discover_skips_vcs_internals() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let project = temp_dir.path().join("P");
        fs::create_dir_all(project.join(".git").join("objects").join("bin"))?;

        let discovery = FolderDiscovery::new(config_without_external());
        let found = discovery.discover(&[project], &build_only());
        assert!(found.is_empty());

        Ok(())
    }

    #[test]
    fn test_discover_dedups_shared_roots() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let project = temp_dir.path().join("P");
        fs::create_dir_all(project.join("sub").join("bin"))?;

        let roots = vec![
            project.clone(),
            project.join("."),
            project.join("sub"),
            project.join("sub").join(".."),
        ];

        let discovery = FolderDiscovery::new(config_without_external());
        let found = discovery.discover(&roots, &build_only());

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, normalize(&project.join("sub").join("bin")));

        Ok(())
    }

    #[test]
    fn test_discover_is_idempotent() -> Result<()> {
        let temp_dir = TempDir::new()?;
        for project in ["A", "B", "C"] {
            fs::create_dir_all(temp_dir.path().join(project).join("bin"))?;
            fs::create_dir_all(temp_dir.path().join(project).join("x").join("obj"))?;
        }
        let roots: Vec<PathBuf> = ["C", "A", "B"]
            .iter()
            .map(|p| temp_dir.path().join(p))
            .collect();

        let discovery = FolderDiscovery::new(config_without_external());
        let first = discovery.discover(&roots, &build_only());
        let second = discovery.discover(&roots, &build_only());

        assert_eq!(first.len(), 6);
        assert_eq!(first, second);

        Ok(())
    }

    #[test]
    fn test_parallel_and_sequential_agree() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let mut roots = Vec::new();
        for i in 0..5 {
            let root = temp_dir.path().join(format!("project_{i}"));
            fs::create_dir_all(root.join("bin"))?;
            roots.push(root);
        }

        let parallel = FolderDiscovery::new(DiscoveryConfig {
            parallel: true,
            ..config_without_external()
        });
        let sequential = FolderDiscovery::new(DiscoveryConfig {
            parallel: false,
            ..config_without_external()
        });

        assert_eq!(
            parallel.discover(&roots, &build_only()),
            sequential.discover(&roots, &build_only())
        );

        Ok(())
    }

    #[test]
    fn test_missing_root_is_skipped() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let present = temp_dir.path().join("present");
        fs::create_dir_all(present.join("obj"))?;

        let discovery = FolderDiscovery::new(config_without_external());
        let found = discovery.discover(
            &[temp_dir.path().join("missing"), present.clone()],
            &build_only(),
        );

        assert_eq!(paths(&found), vec![normalize(&present.join("obj"))]);

        Ok(())
    }

    #[test]
    fn test_external_folders_only_when_present() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let documents = temp_dir.path().join("Documents");
        fs::create_dir_all(documents.join("IISExpress").join("Logs"))?;

        let discovery = FolderDiscovery::new(DiscoveryConfig {
            external_base: Some(documents.clone()),
            ..Default::default()
        });
        let rules = DeletionRuleSet {
            delete_external_log_folder: true,
            delete_external_trace_folder: true,
            ..DeletionRuleSet::none()
        };

        let found = discovery.discover(&[], &rules);
        assert_eq!(
            paths(&found),
            vec![normalize(&documents.join("IISExpress").join("Logs"))]
        );

        Ok(())
    }

    #[test]
    fn test_max_depth() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let project = temp_dir.path().join("P");
        fs::create_dir_all(project.join("bin"))?;
        fs::create_dir_all(project.join("a").join("b").join("obj"))?;

        let discovery = FolderDiscovery::new(DiscoveryConfig {
            max_depth: Some(1),
            ..config_without_external()
        });
        let found = discovery.discover(&[project.clone()], &build_only());

        assert_eq!(paths(&found), vec![normalize(&project.join("bin"))]);

        Ok(())
    }

    #[test]
    fn test_candidate_name() {
        let candidate = CandidateFolder::inspect("/definitely/not/here/TestResults");
        assert_eq!(candidate.name(), "TestResults");
        assert!(!candidate.exists);
    }
}
