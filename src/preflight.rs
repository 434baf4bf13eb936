use std::path::{Path, PathBuf};
use std::process::Command;

use nix::unistd::Uid;
use tracing::info;

use crate::error::{Result, WizardError};

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn check_required_tools<S: AsRef<str>>(tools: &[S]) -> Result<()> {
    let missing: Vec<&str> = tools
        .iter()
        .map(AsRef::as_ref)
        .filter(|tool| !command_exists(tool))
        .collect();

    if !missing.is_empty() {
        return Err(WizardError::Environment(format!(
            "missing required tools: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

pub fn check_root(required: bool) -> Result<()> {
    if required && !Uid::effective().is_root() {
        return Err(WizardError::Environment(
            "root privileges required".to_string(),
        ));
    }
    Ok(())
}

/// Create the run's private working directory. It is left on disk afterwards.
pub fn create_workdir(base: Option<&Path>) -> Result<PathBuf> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("pipewiz-");
    let dir = match base {
        Some(base) => builder.tempdir_in(base),
        None => builder.tempdir(),
    }
    .map_err(|e| {
        WizardError::Environment(format!(
            "cannot create working directory{}: {e}",
            base.map(|b| format!(" in {}", b.display())).unwrap_or_default()
        ))
    })?;

    let path = dir.keep();
    info!("Working directory {:?}", path);
    Ok(path)
}
