use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::DeletionReport;
use crate::deleter::{DeleterConfig, STATUS_PREFIX, SafeDeleter};
use crate::discovery::{DiscoveryConfig, FolderDiscovery};
use crate::error::CleanupError;
use crate::events::{
    BuildAction, BuildScope, EventKind, LifecycleEvent, LifecycleEvents, Listener, SubscriptionId,
};
use crate::rules::DeletionRuleSet;
use crate::services::{
    NativeCleanInvoker, Project, SettingsStore, StatusReporter, VersionControlStatus, Workspace,
    WorkspaceProvider,
};
use crate::settings::{DEFAULT_SETTLE_DELAY_SECS, Settings};

const BUSY_MESSAGE: &str = "A cleanup is already running.";
const NO_WORKSPACE_MESSAGE: &str = "There is no open workspace.";
const RECREATED_FILES_MESSAGE: &str = "Removing automatically recreated files as well...";
const NATIVE_CLEAN_MESSAGE: &str = "Running default cleanup...";
const NATIVE_CLEAN_DONE_MESSAGE: &str = "Default cleanup completed.";

/// 编排器依赖的宿主服务
#[derive(Clone)]
pub struct Services {
    pub workspace: Arc<dyn WorkspaceProvider>,
    pub vcs: Arc<dyn VersionControlStatus>,
    pub native_clean: Arc<dyn NativeCleanInvoker>,
    pub reporter: Arc<dyn StatusReporter>,
    pub settings: Arc<dyn SettingsStore>,
    pub events: Arc<dyn LifecycleEvents>,
}

/// 编排器配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 两轮删除之间的等待时间
    pub settle_delay: Duration,
    pub discovery: DiscoveryConfig,
    pub deleter: DeleterConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(DEFAULT_SETTLE_DELAY_SECS),
            discovery: DiscoveryConfig::default(),
            deleter: DeleterConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            settle_delay: settings.settle_delay(),
            deleter: settings.deleter_config(),
            ..Default::default()
        }
    }
}

/// 触发清理的事件来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    BuildFinished {
        scope: BuildScope,
        action: BuildAction,
    },
    WorkspaceClosing,
}

impl From<LifecycleEvent> for Trigger {
    fn from(event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::BuildFinished { scope, action } => Trigger::BuildFinished { scope, action },
            LifecycleEvent::WorkspaceClosing => Trigger::WorkspaceClosing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Running,
}

/// 单轮删除的结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassReport {
    /// 本轮发现的候选目录
    pub folders: Vec<PathBuf>,
    pub report: DeletionReport,
}

/// 一次完整运行的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub workspace: Workspace,
    pub project_count: usize,
    pub first_pass: PassReport,
    pub second_pass: PassReport,
    pub native_clean_ran: bool,
}

impl RunSummary {
    /// 两轮删除的合并结果
    pub fn combined(&self) -> DeletionReport {
        let mut combined = self.first_pass.report.clone();
        combined.merge(self.second_pass.report.clone());
        combined
    }
}

#[derive(Debug)]
pub enum TriggerOutcome {
    Completed(Box<RunSummary>),
    /// 已有清理在运行，本次触发被拒绝
    Busy,
    /// 事件不满足触发条件
    Ignored,
    NoWorkspace,
    NoProjects,
    Failed(String),
}

impl TriggerOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TriggerOutcome::Completed(_))
    }
}

#[derive(Default)]
struct Subscriptions {
    attached: bool,
    build_finished: Option<SubscriptionId>,
    workspace_closing: Option<SubscriptionId>,
}

/// 清理编排器
///
/// 同一时间最多只有一次运行。运行期间取消订阅构建完成事件，
/// 避免宿主清理命令再次触发自身，运行结束后（包括失败和 panic）恢复订阅并清除忙碌标志。
pub struct CleanupOrchestrator {
    me: Weak<CleanupOrchestrator>,
    services: Services,
    config: OrchestratorConfig,
    discovery: Arc<FolderDiscovery>,
    deleter: Arc<SafeDeleter>,
    busy: AtomicBool,
    runs_started: AtomicUsize,
    subscriptions: Mutex<Subscriptions>,
    runtime: Mutex<Option<Handle>>,
    pending: Mutex<Vec<JoinHandle<TriggerOutcome>>>,
}

impl CleanupOrchestrator {
    /// 创建新的编排器
    pub fn new(services: Services, config: OrchestratorConfig) -> Arc<Self> {
        let discovery = Arc::new(FolderDiscovery::new(config.discovery.clone()));
        let deleter = Arc::new(SafeDeleter::new(
            config.deleter.clone(),
            Arc::clone(&services.vcs),
            Arc::clone(&services.reporter),
        ));

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            services,
            config,
            discovery,
            deleter,
            busy: AtomicBool::new(false),
            runs_started: AtomicUsize::new(0),
            subscriptions: Mutex::new(Subscriptions::default()),
            runtime: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn state(&self) -> OrchestratorState {
        if self.is_busy() {
            OrchestratorState::Running
        } else {
            OrchestratorState::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// 已开始的运行次数
    pub fn runs_started(&self) -> usize {
        self.runs_started.load(Ordering::Relaxed)
    }

    /// 订阅宿主的生命周期事件
    ///
    /// 事件回调在调用时所在的 tokio 运行时上启动清理任务。
    pub fn attach(&self) {
        match Handle::try_current() {
            Ok(handle) => *lock(&self.runtime) = Some(handle),
            Err(_) => warn!("attach 未在 tokio 运行时中调用，事件将被忽略"),
        }

        let mut subs = lock(&self.subscriptions);
        subs.attached = true;
        if subs.workspace_closing.is_none() {
            subs.workspace_closing = Some(
                self.services
                    .events
                    .subscribe(EventKind::WorkspaceClosing, self.listener()),
            );
        }
        // 运行中保持取消订阅，运行结束时再订阅
        if subs.build_finished.is_none() && !self.is_busy() {
            subs.build_finished = Some(self.subscribe_build_finished());
        }
        debug!("已订阅生命周期事件");
    }

    /// 取消所有事件订阅
    pub fn detach(&self) {
        let mut subs = lock(&self.subscriptions);
        subs.attached = false;
        for id in [subs.build_finished.take(), subs.workspace_closing.take()]
            .into_iter()
            .flatten()
        {
            self.services.events.unsubscribe(id);
        }
        debug!("已取消订阅生命周期事件");
    }

    /// 等待由事件启动的清理任务完成
    ///
    /// 只包含仍被保留的任务；新事件到达时已结束的任务会被丢弃，
    /// 它们的结果已经通过 `StatusReporter` 报告过。
    pub async fn drain_pending(&self) -> Vec<TriggerOutcome> {
        let handles = std::mem::take(&mut *lock(&self.pending));
        let mut outcomes = Vec::with_capacity(handles.len());

        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(TriggerOutcome::Failed(e.to_string())),
            }
        }

        outcomes
    }

    /// 由事件启动、尚未结束的任务数
    pub fn pending_count(&self) -> usize {
        let mut pending = lock(&self.pending);
        pending.retain(|task| !task.is_finished());
        pending.len()
    }

    /// 处理一次触发
    pub async fn trigger(&self, trigger: Trigger) -> TriggerOutcome {
        if !self.accepts(&trigger) {
            debug!("忽略触发: {:?}", trigger);
            return TriggerOutcome::Ignored;
        }

        let Some(_guard) = self.try_begin() else {
            info!("清理正在进行，拒绝触发: {:?}", trigger);
            self.services.reporter.message(BUSY_MESSAGE);
            return TriggerOutcome::Busy;
        };

        self.runs_started.fetch_add(1, Ordering::Relaxed);
        info!("开始清理，触发来源: {:?}", trigger);

        match self.run().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("清理失败: {}", e);
                self.services
                    .reporter
                    .message(&format!("Cleanup failed: {e}"));
                TriggerOutcome::Failed(e.to_string())
            }
        }
    }

    fn accepts(&self, trigger: &Trigger) -> bool {
        match trigger {
            Trigger::Manual => true,
            Trigger::BuildFinished { scope, action } => {
                *scope == BuildScope::Workspace && *action == BuildAction::Clean
            }
            Trigger::WorkspaceClosing => self.services.settings.rules().run_on_workspace_close,
        }
    }

    /// 原子地进入运行状态
    fn try_begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let mut subs = lock(&self.subscriptions);
        if let Some(id) = subs.build_finished.take() {
            self.services.events.unsubscribe(id);
            debug!("运行期间取消订阅构建完成事件");
        }

        Some(BusyGuard { orchestrator: self })
    }

    fn finish(&self) {
        let mut subs = lock(&self.subscriptions);
        if subs.attached && subs.build_finished.is_none() {
            subs.build_finished = Some(self.subscribe_build_finished());
        }
        // 持有订阅锁时清除标志，新的运行只能在重新订阅之后开始
        self.busy.store(false, Ordering::Release);
        debug!("清理结束，状态恢复为空闲");
    }

    async fn run(&self) -> Result<TriggerOutcome, CleanupError> {
        let reporter = &self.services.reporter;

        let Some(workspace) = self.services.workspace.current_workspace() else {
            reporter.message(NO_WORKSPACE_MESSAGE);
            return Ok(TriggerOutcome::NoWorkspace);
        };

        let provider = Arc::clone(&self.services.workspace);
        let projects = tokio::task::spawn_blocking(move || provider.all_projects())
            .await?
            .map_err(CleanupError::Enumeration)?;
        let roots: Vec<PathBuf> = projects.iter().filter_map(Project::root).collect();

        if roots.is_empty() {
            reporter.message(&format!(
                "There are no projects in {}.",
                workspace.path.display()
            ));
            return Ok(TriggerOutcome::NoProjects);
        }

        let rules = self.services.settings.rules();
        debug!("规则快照: {:?}", rules);

        reporter.message(&format!(
            "Deleting output folders in {}...",
            workspace.path.display()
        ));
        let first_pass = self.sweep(&roots, &rules).await?;

        let native_clean_ran = rules.run_native_clean;
        if native_clean_ran {
            self.run_native_clean().await?;
        }

        reporter.message(RECREATED_FILES_MESSAGE);
        debug!("等待 {:?} 后开始第二轮删除", self.config.settle_delay);
        tokio::time::sleep(self.config.settle_delay).await;

        let second_pass = self.sweep(&roots, &rules).await?;

        let summary = RunSummary {
            workspace,
            project_count: roots.len(),
            first_pass,
            second_pass,
            native_clean_ran,
        };

        let combined = summary.combined();
        reporter.message(&format!(
            "Cleanup of {} finished: {} files and {} folders deleted, {} skipped, {} failed, {} freed.",
            summary.workspace.path.display(),
            combined.deleted_files(),
            combined.deleted_folders(),
            combined.skipped(),
            combined.failed(),
            combined.format_size()
        ));
        reporter.status_bar_message(&format!("{STATUS_PREFIX} - Done!"));

        Ok(TriggerOutcome::Completed(Box::new(summary)))
    }

    /// 发现并删除，在阻塞线程池中执行
    async fn sweep(
        &self,
        roots: &[PathBuf],
        rules: &DeletionRuleSet,
    ) -> Result<PassReport, CleanupError> {
        let discovery = Arc::clone(&self.discovery);
        let deleter = Arc::clone(&self.deleter);
        let roots = roots.to_vec();
        let rules = rules.clone();

        let pass = tokio::task::spawn_blocking(move || {
            let candidates = discovery.discover(&roots, &rules);
            let report = deleter.delete_all(&candidates);
            PassReport {
                folders: candidates.into_iter().map(|c| c.path).collect(),
                report,
            }
        })
        .await?;

        Ok(pass)
    }

    async fn run_native_clean(&self) -> Result<(), CleanupError> {
        let reporter = &self.services.reporter;
        reporter.message(NATIVE_CLEAN_MESSAGE);

        let invoker = Arc::clone(&self.services.native_clean);
        if let Err(e) = tokio::task::spawn_blocking(move || invoker.run_default_clean()).await? {
            warn!("宿主清理命令失败: {:#}", e);
            reporter.message(&format!("Default cleanup failed: {e:#}"));
        }

        reporter.message(NATIVE_CLEAN_DONE_MESSAGE);
        Ok(())
    }

    fn subscribe_build_finished(&self) -> SubscriptionId {
        self.services
            .events
            .subscribe(EventKind::BuildFinished, self.listener())
    }

    fn listener(&self) -> Listener {
        let me = self.me.clone();
        Arc::new(move |event: &LifecycleEvent| {
            if let Some(orchestrator) = me.upgrade() {
                orchestrator.dispatch(Trigger::from(*event));
            }
        })
    }

    /// 在后台启动一次触发
    fn dispatch(&self, trigger: Trigger) {
        if !self.accepts(&trigger) {
            debug!("忽略事件: {:?}", trigger);
            return;
        }
        let Some(handle) = lock(&self.runtime).clone() else {
            warn!("没有可用的运行时，忽略事件: {:?}", trigger);
            return;
        };
        let Some(me) = self.me.upgrade() else {
            return;
        };

        let task = handle.spawn(async move { me.trigger(trigger).await });
        let mut pending = lock(&self.pending);
        pending.retain(|task| !task.is_finished());
        pending.push(task);
    }
}

/// 运行期间持有；释放时恢复空闲状态
struct BusyGuard<'a> {
    orchestrator: &'a CleanupOrchestrator,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.finish();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
