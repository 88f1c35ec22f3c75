use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::DeletionReport;
use crate::discovery::CandidateFolder;
use crate::services::{NoVersionControl, StatusReporter, TracingReporter, VersionControlStatus};

/// 默认的标记文件后缀（由工具自动重新生成的文件）
pub const DEFAULT_MARKER_SUFFIX: &str = ".refresh";

/// 进度条标签
pub const PROGRESS_LABEL: &str = "Removing output folders";

/// 状态栏消息前缀
pub const STATUS_PREFIX: &str = "scrub";

/// 删除对象类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    File,
    Folder,
}

/// 单个文件或目录的处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionOutcome {
    Deleted,
    SkippedVersionControlled,
    SkippedMarkerFile,
    FailedIo(String),
}

impl DeletionOutcome {
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            DeletionOutcome::SkippedVersionControlled | DeletionOutcome::SkippedMarkerFile
        )
    }
}

/// 处理记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRecord {
    pub path: PathBuf,
    pub kind: ItemKind,
    pub outcome: DeletionOutcome,
    /// 删除前的文件大小（目录为0）
    pub bytes: u64,
}

impl DeletionRecord {
    fn file(path: &Path, outcome: DeletionOutcome, bytes: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: ItemKind::File,
            outcome,
            bytes,
        }
    }

    fn folder(path: &Path, outcome: DeletionOutcome) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: ItemKind::Folder,
            outcome,
            bytes: 0,
        }
    }
}

impl fmt::Display for DeletionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.display();
        match (&self.kind, &self.outcome) {
            (ItemKind::File, DeletionOutcome::Deleted) => write!(f, "File {path} has been deleted."),
            (ItemKind::Folder, DeletionOutcome::Deleted) => {
                write!(f, "Folder {path} has been deleted.")
            }
            (_, DeletionOutcome::SkippedMarkerFile) => match self.path.extension() {
                Some(ext) => write!(
                    f,
                    "Can't delete {path}. This is a .{} file.",
                    ext.to_string_lossy()
                ),
                None => write!(f, "Can't delete {path}. This is a marker file."),
            },
            (_, DeletionOutcome::SkippedVersionControlled) => {
                write!(f, "Can't delete {path}. This file is under source control.")
            }
            (ItemKind::File, DeletionOutcome::FailedIo(msg)) => {
                write!(f, "Error deleting file {path}. {msg}")
            }
            (ItemKind::Folder, DeletionOutcome::FailedIo(msg)) => {
                write!(f, "Error deleting folder {path}. {msg}")
            }
        }
    }
}

/// 删除器配置
#[derive(Debug, Clone)]
pub struct DeleterConfig {
    /// 文件名以此结尾的文件永远不会被删除
    pub marker_suffix: String,
}

impl Default for DeleterConfig {
    fn default() -> Self {
        Self {
            marker_suffix: DEFAULT_MARKER_SUFFIX.to_string(),
        }
    }
}

/// 安全删除器
///
/// 先删除所有目录中的文件（跳过标记文件和受版本控制的文件），
/// 再自底向上删除已经变空的目录。
pub struct SafeDeleter {
    config: DeleterConfig,
    vcs: Arc<dyn VersionControlStatus>,
    reporter: Arc<dyn StatusReporter>,
}

impl SafeDeleter {
    /// 创建新的删除器
    pub fn new(
        config: DeleterConfig,
        vcs: Arc<dyn VersionControlStatus>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            config,
            vcs,
            reporter,
        }
    }

    /// 删除候选目录中的所有内容
    ///
    /// 所有目录的文件删除完成后才开始删除目录。单个文件或目录失败不会中断其他项。
    pub fn delete_all(&self, folders: &[CandidateFolder]) -> DeletionReport {
        let start_time = Instant::now();
        let mut report = DeletionReport::new();

        info!("开始清理 {} 个目录", folders.len());

        for folder in folders {
            self.sweep_files(folder, &mut report);
        }

        for folder in folders {
            self.prune_folder(&folder.path, &mut report);
        }

        report.duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "清理完成: 删除 {} 个文件和 {} 个目录，跳过 {} 个，失败 {} 个，释放空间 {}，耗时 {}ms",
            report.deleted_files(),
            report.deleted_folders(),
            report.skipped(),
            report.failed(),
            report.format_size(),
            report.duration_ms
        );

        report
    }

    /// 第一阶段：删除单个目录下的所有文件
    fn sweep_files(&self, folder: &CandidateFolder, report: &mut DeletionReport) {
        let files = self.collect_files(&folder.path, report);
        let total = files.len();

        debug!("目录 {:?} 中有 {} 个文件", folder.path, total);
        self.reporter
            .message(&format!("Deleting folder {}...", folder.path.display()));
        self.reporter
            .status_bar_message(&format!("{STATUS_PREFIX} - {}", folder.name()));

        for (index, file) in files.iter().enumerate() {
            let record = self.delete_file(file);
            self.reporter.message(&record.to_string());
            report.push(record);
            self.reporter.progress(PROGRESS_LABEL, index + 1, total);
        }
    }

    /// 列出目录树中的所有文件（只列出一次，删除过程中不重新扫描）
    fn collect_files(&self, dir: &Path, report: &mut DeletionReport) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir) {
            match entry {
                Ok(entry) if !entry.file_type().is_dir() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => {
                    let path = e.path().unwrap_or(dir).to_path_buf();
                    if e.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) {
                        debug!("目录已不存在: {:?}", path);
                        continue;
                    }
                    warn!("无法读取目录 {:?}: {}", path, e);
                    let record =
                        DeletionRecord::folder(&path, DeletionOutcome::FailedIo(e.to_string()));
                    self.reporter.message(&record.to_string());
                    report.push(record);
                }
            }
        }

        files
    }

    /// 删除单个文件
    fn delete_file(&self, path: &Path) -> DeletionRecord {
        if self.is_marker_file(path) {
            debug!("跳过标记文件: {:?}", path);
            return DeletionRecord::file(path, DeletionOutcome::SkippedMarkerFile, 0);
        }

        if self.vcs.is_controlled(path) {
            debug!("跳过受版本控制的文件: {:?}", path);
            return DeletionRecord::file(path, DeletionOutcome::SkippedVersionControlled, 0);
        }

        let size = fs::symlink_metadata(path).map(|m| m.len()).unwrap_or(0);
        match fs::remove_file(path) {
            Ok(()) => DeletionRecord::file(path, DeletionOutcome::Deleted, size),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // 其他进程已经删除了它
                debug!("文件已不存在: {:?}", path);
                DeletionRecord::file(path, DeletionOutcome::Deleted, 0)
            }
            Err(e) => {
                warn!("删除文件失败 {:?}: {}", path, e);
                DeletionRecord::file(path, DeletionOutcome::FailedIo(e.to_string()), 0)
            }
        }
    }

    fn is_marker_file(&self, path: &Path) -> bool {
        !self.config.marker_suffix.is_empty()
            && path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().ends_with(&self.config.marker_suffix))
    }

    /// 第二阶段：深度优先删除空目录（先子目录后父目录）
    fn prune_folder(&self, dir: &Path, report: &mut DeletionReport) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => {
                self.record_folder_failure(dir, &e, report);
                return;
            }
        };

        let mut subfolders: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .map(|entry| entry.path())
            .collect();
        subfolders.sort();

        for subfolder in &subfolders {
            self.prune_folder(subfolder, report);
        }

        match is_empty_dir(dir) {
            Ok(true) => match fs::remove_dir(dir) {
                Ok(()) => {
                    let record = DeletionRecord::folder(dir, DeletionOutcome::Deleted);
                    self.reporter.message(&record.to_string());
                    report.push(record);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => self.record_folder_failure(dir, &e, report),
            },
            Ok(false) => debug!("目录非空，保留: {:?}", dir),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => self.record_folder_failure(dir, &e, report),
        }
    }

    fn record_folder_failure(&self, dir: &Path, error: &io::Error, report: &mut DeletionReport) {
        warn!("删除目录失败 {:?}: {}", dir, error);
        let record = DeletionRecord::folder(dir, DeletionOutcome::FailedIo(error.to_string()));
        self.reporter.message(&record.to_string());
        report.push(record);
    }
}

impl Default for SafeDeleter {
    fn default() -> Self {
        Self::new(
            DeleterConfig::default(),
            Arc::new(NoVersionControl),
            Arc::new(TracingReporter),
        )
    }
}

fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}
