use std::io::ErrorKind;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;

use nix::sys::signal::Signal;
use tracing::{debug, info};

use crate::error::{Result, WizardError};
use crate::fetch::Transport;

/// Everything a step hands to the outside world: subprocesses and downloads.
pub trait ToolService: Transport + Send + Sync {
    /// Run a command in `cwd` with stdout/stderr going straight to the terminal.
    fn run(&self, cmd: &[String], cwd: &Path) -> Result<()>;

    fn is_dryrun(&self) -> bool;

    fn command_string(&self, cmd: &[String]) -> String {
        format_command_string(cmd)
    }
}

/// Shell-quoted rendering of a command for banners and logs
pub fn format_command_string(cmd: &[String]) -> String {
    cmd.iter()
        .map(|s| shell_escape::escape(s.into()).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_status(tool: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    // Ctrl-C reaches the whole foreground group, so the tool dies alongside us
    match status.signal().map(Signal::try_from) {
        Some(Ok(Signal::SIGINT | Signal::SIGTERM)) => Err(WizardError::Interrupted),
        _ => Err(WizardError::ExternalTool {
            tool: tool.to_string(),
            code: status.code(),
        }),
    }
}

fn spawn_err(program: &str, e: std::io::Error) -> WizardError {
    if e.kind() == ErrorKind::NotFound {
        WizardError::Environment(format!("{program} not found on PATH"))
    } else {
        WizardError::Io(e)
    }
}

/// Live service that executes real commands
pub struct LiveService;

impl Transport for LiveService {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        info!("curl {} -> {:?}", url, dest);
        let status = Command::new("curl")
            .args(["-fL", "--progress-bar", "-o"])
            .arg(dest)
            .arg(url)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| spawn_err("curl", e))?;
        check_status("curl", status)
    }
}

impl ToolService for LiveService {
    fn run(&self, cmd: &[String], cwd: &Path) -> Result<()> {
        let Some((program, args)) = cmd.split_first() else {
            return Err(WizardError::Environment("empty command".to_string()));
        };

        info!("Running in {:?}: {}", cwd, format_command_string(cmd));

        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| spawn_err(program, e))?;

        debug!("{} exited with {:?}", program, status.code());
        check_status(program, status)
    }

    fn is_dryrun(&self) -> bool {
        false
    }
}

/// Dryrun service that logs instead of touching the system
pub struct DryrunService;

impl Transport for DryrunService {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        info!("Dryrun: skipping download of {} to {:?}", url, dest);
        Ok(())
    }
}

impl ToolService for DryrunService {
    fn run(&self, cmd: &[String], cwd: &Path) -> Result<()> {
        if cmd.is_empty() {
            return Err(WizardError::Environment("empty command".to_string()));
        }
        info!("Dryrun: would run in {:?}: {}", cwd, format_command_string(cmd));
        Ok(())
    }

    fn is_dryrun(&self) -> bool {
        true
    }
}

/// Create the appropriate service based on dryrun mode
pub fn create_service(dryrun: bool) -> Arc<dyn ToolService> {
    if dryrun {
        Arc::new(DryrunService)
    } else {
        Arc::new(LiveService)
    }
}
