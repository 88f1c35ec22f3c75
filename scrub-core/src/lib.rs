use serde::{Deserialize, Serialize};

pub mod deleter;
pub mod discovery;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod path;
pub mod rules;
pub mod services;
pub mod settings;

pub use deleter::{DeleterConfig, DeletionOutcome, DeletionRecord, ItemKind, SafeDeleter};
pub use discovery::{CandidateFolder, DiscoveryConfig, FolderDiscovery};
pub use error::CleanupError;
pub use events::{BuildAction, BuildScope, EventBus, LifecycleEvent, LifecycleEvents};
pub use orchestrator::{
    CleanupOrchestrator, OrchestratorConfig, OrchestratorState, RunSummary, Services, Trigger,
    TriggerOutcome,
};
pub use path::{PathIdentity, identity, paths_equal};
pub use rules::DeletionRuleSet;
pub use services::{
    NativeCleanInvoker, Project, SettingsStore, SharedSettings, StatusReporter,
    VersionControlStatus, Workspace, WorkspaceProvider,
};
pub use settings::Settings;

/// 一次删除调用的结果统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletionReport {
    pub records: Vec<DeletionRecord>,
    pub bytes_freed: u64,
    pub duration_ms: u64,
}

impl DeletionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DeletionRecord) {
        if record.outcome == DeletionOutcome::Deleted {
            self.bytes_freed += record.bytes;
        }
        self.records.push(record);
    }

    /// 合并另一轮的结果
    pub fn merge(&mut self, other: DeletionReport) {
        self.bytes_freed += other.bytes_freed;
        self.duration_ms += other.duration_ms;
        self.records.extend(other.records);
    }

    fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&DeletionRecord) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).count()
    }

    pub fn deleted_files(&self) -> usize {
        self.count(|r| r.kind == ItemKind::File && r.outcome == DeletionOutcome::Deleted)
    }

    pub fn deleted_folders(&self) -> usize {
        self.count(|r| r.kind == ItemKind::Folder && r.outcome == DeletionOutcome::Deleted)
    }

    pub fn skipped_marker_files(&self) -> usize {
        self.count(|r| r.outcome == DeletionOutcome::SkippedMarkerFile)
    }

    pub fn skipped_version_controlled(&self) -> usize {
        self.count(|r| r.outcome == DeletionOutcome::SkippedVersionControlled)
    }

    pub fn skipped(&self) -> usize {
        self.count(|r| r.outcome.is_skip())
    }

    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r.outcome, DeletionOutcome::FailedIo(_)))
    }

    /// 失败项
    pub fn failures(&self) -> impl Iterator<Item = &DeletionRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, DeletionOutcome::FailedIo(_)))
    }

    pub fn format_size(&self) -> String {
        format_bytes(self.bytes_freed)
    }
}

/// 格式化字节大小为人类可读格式
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
