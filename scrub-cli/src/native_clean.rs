use anyhow::{Context, Result};
use scrub_core::NativeCleanInvoker;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Runs the toolchain's own clean command (for example `dotnet clean`)
/// in the workspace directory.
#[derive(Debug, Clone)]
pub struct CommandClean {
    program: Option<String>,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl CommandClean {
    /// Split a command line on whitespace. An empty line means no command.
    pub fn from_command_line<P: AsRef<Path>>(command_line: &str, working_dir: P) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);

        Self {
            program: parts.next(),
            args: parts.collect(),
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.program.is_some()
    }
}

impl NativeCleanInvoker for CommandClean {
    fn run_default_clean(&self) -> Result<()> {
        let Some(program) = &self.program else {
            debug!("没有配置清理命令");
            return Ok(());
        };

        info!("执行 {} {:?} 于 {:?}", program, self.args, self.working_dir);

        let output = Command::new(program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .output()
            .with_context(|| format!("执行 {program} 失败"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} 失败 ({}): {}", program, output.status, stderr.trim());
        }

        Ok(())
    }
}
