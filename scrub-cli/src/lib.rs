use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scrub_core::{
    BuildAction, BuildScope, CleanupOrchestrator, DiscoveryConfig, EventBus, FolderDiscovery,
    LifecycleEvent, LifecycleEvents, OrchestratorConfig, Project, RunSummary, Services,
    SharedSettings, Trigger, TriggerOutcome, WorkspaceProvider, format_bytes,
};

pub mod config;
pub mod native_clean;
pub mod reporter;
pub mod vcs;
pub mod workspace;

pub use config::{CliConfig, HostConfig, RuleOverrides};
pub use native_clean::CommandClean;
pub use reporter::ConsoleReporter;
pub use vcs::GitStatus;
pub use workspace::DirectoryWorkspace;

#[derive(Parser)]
#[command(name = "scrub")]
#[command(about = "Remove build output folders (bin, obj, packages, ...) from project trees")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to <config dir>/scrub/scrub.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub rules: RuleArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

/// Switch on folder categories for this invocation
#[derive(Debug, Default, Args)]
pub struct RuleArgs {
    /// Also remove packages folders
    #[arg(long, global = true)]
    pub packages: bool,

    /// Also remove TestResults folders
    #[arg(long, global = true)]
    pub test_results: bool,

    /// Also remove .vs folders
    #[arg(long, global = true)]
    pub ide_metadata: bool,

    /// Also remove the IIS Express log folder
    #[arg(long, global = true)]
    pub external_logs: bool,

    /// Also remove the IIS Express trace folder
    #[arg(long, global = true)]
    pub external_traces: bool,

    /// Keep bin and obj folders
    #[arg(long, global = true)]
    pub no_build_output: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the folders that would be removed
    Scan {
        /// Workspace directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clean the workspace now
    Run {
        /// Workspace directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Seconds to wait before the second pass
        #[arg(long, value_name = "SECS")]
        settle_delay: Option<u64>,

        /// Skip the default clean command
        #[arg(long)]
        no_native_clean: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Deliver a host lifecycle event
    Notify {
        #[command(subcommand)]
        event: NotifyEvent,
    },
}

#[derive(Subcommand)]
pub enum NotifyEvent {
    /// A build action has finished
    BuildFinished {
        /// Workspace directory
        #[arg(default_value = ".")]
        path: PathBuf,

        #[arg(long, value_enum, default_value = "workspace")]
        scope: ScopeArg,

        #[arg(long, value_enum)]
        action: ActionArg,
    },
    /// The workspace is about to close
    WorkspaceClosing {
        /// Workspace directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScopeArg {
    Workspace,
    Project,
    Batch,
}

impl From<ScopeArg> for BuildScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Workspace => BuildScope::Workspace,
            ScopeArg::Project => BuildScope::Project,
            ScopeArg::Batch => BuildScope::Batch,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ActionArg {
    Build,
    Rebuild,
    Clean,
    Deploy,
}

impl From<ActionArg> for BuildAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Build => BuildAction::Build,
            ActionArg::Rebuild => BuildAction::Rebuild,
            ActionArg::Clean => BuildAction::Clean,
            ActionArg::Deploy => BuildAction::Deploy,
        }
    }
}

impl NotifyEvent {
    fn path(&self) -> &Path {
        match self {
            NotifyEvent::BuildFinished { path, .. } | NotifyEvent::WorkspaceClosing { path } => {
                path
            }
        }
    }

    fn to_event(&self) -> LifecycleEvent {
        match self {
            NotifyEvent::BuildFinished { scope, action, .. } => LifecycleEvent::BuildFinished {
                scope: (*scope).into(),
                action: (*action).into(),
            },
            NotifyEvent::WorkspaceClosing { .. } => LifecycleEvent::WorkspaceClosing,
        }
    }
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // 设置日志级别
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "scrub={log_level},scrub_core={log_level},scrub_cli={log_level}"
        ))
        .with_writer(std::io::stderr)
        .init();

    let mut config: CliConfig = scrub_core::settings::load_or_default(cli.config.as_deref())?;

    let no_native_clean = matches!(
        cli.command,
        Commands::Run {
            no_native_clean: true,
            ..
        }
    );
    overrides_from(&cli.rules, no_native_clean).apply(&mut config.settings.rules);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;

    match cli.command {
        Commands::Scan { path, json } => handle_scan_command(&path, json, &config),
        Commands::Run {
            path,
            settle_delay,
            yes,
            ..
        } => {
            if let Some(secs) = settle_delay {
                config.settings.settle_delay_secs = secs;
            }
            if !yes && !confirm_run(&path, &mut io::stdin().lock())? {
                println!("Cleaning cancelled.");
                return Ok(());
            }
            runtime.block_on(handle_run_command(&path, &config))
        }
        Commands::Notify { event } => runtime.block_on(handle_notify_command(&event, &config)),
    }
}

fn overrides_from(args: &RuleArgs, no_native_clean: bool) -> RuleOverrides {
    RuleOverrides {
        packages: args.packages,
        test_results: args.test_results,
        ide_metadata: args.ide_metadata,
        external_logs: args.external_logs,
        external_traces: args.external_traces,
        no_build_output: args.no_build_output,
        no_native_clean,
    }
}

/// 扫描结果
#[derive(Debug, Serialize)]
struct ScanReport {
    workspace: PathBuf,
    projects: Vec<Project>,
    folders: Vec<FolderEntry>,
    total_size: u64,
}

#[derive(Debug, Serialize)]
struct FolderEntry {
    path: PathBuf,
    size: u64,
}

fn handle_scan_command(path: &Path, json: bool, config: &CliConfig) -> Result<()> {
    let workspace = DirectoryWorkspace::new(path, config.host.manifest_patterns.clone());
    let Some(current) = workspace.current_workspace() else {
        anyhow::bail!("No workspace found at {}", path.display());
    };

    let projects = workspace.all_projects()?;
    let roots: Vec<PathBuf> = projects.iter().filter_map(Project::root).collect();

    let discovery = FolderDiscovery::new(DiscoveryConfig::default());
    let folders: Vec<FolderEntry> = discovery
        .discover(&roots, &config.settings.rules)
        .into_iter()
        .map(|candidate| FolderEntry {
            size: folder_size(&candidate.path),
            path: candidate.path,
        })
        .collect();

    let report = ScanReport {
        workspace: current.path,
        total_size: folders.iter().map(|f| f.size).sum(),
        projects,
        folders,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display_scan_report(&report);
    }

    Ok(())
}

async fn handle_run_command(path: &Path, config: &CliConfig) -> Result<()> {
    let bus = Arc::new(EventBus::new());
    let orchestrator = build_orchestrator(path, config, bus);

    let outcome = orchestrator.trigger(Trigger::Manual).await;
    display_outcome(&outcome, path)
}

async fn handle_notify_command(event: &NotifyEvent, config: &CliConfig) -> Result<()> {
    let bus = Arc::new(EventBus::new());
    let orchestrator = build_orchestrator(event.path(), config, bus.clone());

    orchestrator.attach();
    bus.emit(event.to_event());
    let outcomes = orchestrator.drain_pending().await;
    orchestrator.detach();

    if outcomes.is_empty() {
        println!("Event ignored.");
    }
    for outcome in &outcomes {
        display_outcome(outcome, event.path())?;
    }

    Ok(())
}

fn confirm_run(path: &Path, input: &mut impl BufRead) -> Result<bool> {
    print!(
        "\nThis will delete output folders in {}. Continue? [y/N]: ",
        path.display()
    );

    io::stdout().flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;

    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn build_orchestrator(
    path: &Path,
    config: &CliConfig,
    events: Arc<dyn LifecycleEvents>,
) -> Arc<CleanupOrchestrator> {
    let workspace = DirectoryWorkspace::new(path, config.host.manifest_patterns.clone());
    let native_clean =
        CommandClean::from_command_line(&config.host.native_clean_command, workspace.root());

    let services = Services {
        workspace: Arc::new(workspace),
        vcs: Arc::new(GitStatus::new()),
        native_clean: Arc::new(native_clean),
        reporter: Arc::new(ConsoleReporter::default()),
        settings: Arc::new(SharedSettings::new(config.settings.rules.clone())),
        events,
    };

    CleanupOrchestrator::new(services, OrchestratorConfig::from_settings(&config.settings))
}

fn folder_size(path: &Path) -> u64 {
    ignore::WalkBuilder::new(path)
        .standard_filters(false)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

fn display_scan_report(report: &ScanReport) {
    println!(
        "Found {} projects in {}",
        report.projects.len(),
        report.workspace.display()
    );

    if report.folders.is_empty() {
        println!("No folders to remove.");
        return;
    }

    println!("\n{:<60} {:<15}", "Folder", "Size");
    println!("{}", "-".repeat(75));

    for folder in &report.folders {
        let shown = folder
            .path
            .strip_prefix(&report.workspace)
            .unwrap_or(&folder.path);
        println!("{:<60} {:<15}", shown.display(), format_bytes(folder.size));
    }

    println!("{}", "-".repeat(75));
    println!("Total size: {}", format_bytes(report.total_size));
}

fn display_outcome(outcome: &TriggerOutcome, path: &Path) -> Result<()> {
    match outcome {
        TriggerOutcome::Completed(summary) => display_run_summary(summary),
        TriggerOutcome::Busy => println!("A cleanup is already running."),
        TriggerOutcome::Ignored => println!("Event ignored."),
        TriggerOutcome::NoWorkspace => {
            anyhow::bail!("No workspace found at {}", path.display())
        }
        TriggerOutcome::NoProjects => {}
        TriggerOutcome::Failed(message) => anyhow::bail!("Cleanup failed: {message}"),
    }

    Ok(())
}

fn display_run_summary(summary: &RunSummary) {
    let combined = summary.combined();

    println!("\nCleanup completed!");
    println!("Projects: {}", summary.project_count);
    println!(
        "Folders found: {} (second pass: {})",
        summary.first_pass.folders.len(),
        summary.second_pass.folders.len()
    );
    println!("Files deleted: {}", combined.deleted_files());
    println!("Folders deleted: {}", combined.deleted_folders());
    println!("Skipped: {}", combined.skipped());
    println!("Size freed: {}", combined.format_size());

    if combined.failed() > 0 {
        println!("\nFailed to delete {} items:", combined.failed());
        for record in combined.failures() {
            println!("  - {record}");
        }
    }
}
