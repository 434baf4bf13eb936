use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::config::{StepConfig, WizardConfig};
use crate::error::{Result, WizardError};
use crate::lookup::path_candidates;
use crate::pipeline::{Phase, StepContext, WorkUnit, register_phases};
use crate::wizard::Session;

/// Replace every `${name}` with its value from `vars`.
pub fn expand_vars(text: &str, vars: &BTreeMap<String, String>) -> String {
    vars.iter().fold(text.to_string(), |acc, (name, value)| {
        acc.replace(&format!("${{{name}}}"), value)
    })
}

/// Work unit described entirely by configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredStep {
    note: Option<String>,
    fetch: Option<(String, String)>,
    locate: Vec<String>,
    commands: Vec<Vec<String>>,
}

impl ConfiguredStep {
    pub fn from_config(step: &StepConfig, vars: &BTreeMap<String, String>) -> Result<Self> {
        let commands = step
            .commands
            .iter()
            .map(|line| {
                let line = expand_vars(line, vars);
                match shell_words::split(&line) {
                    Ok(argv) if !argv.is_empty() => Ok(argv),
                    Ok(_) => Err(WizardError::Environment(format!(
                        "step {}: empty command",
                        step.name
                    ))),
                    Err(e) => Err(WizardError::Environment(format!(
                        "step {}: cannot parse {line:?}: {e}",
                        step.name
                    ))),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            note: step.note.as_deref().map(|n| expand_vars(n, vars)),
            fetch: step
                .fetch
                .as_ref()
                .map(|f| (expand_vars(&f.url, vars), expand_vars(&f.manifest, vars))),
            locate: step.locate.iter().map(|p| expand_vars(p, vars)).collect(),
            commands,
        })
    }
}

impl WorkUnit for ConfiguredStep {
    fn run(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        if let Some(note) = &self.note {
            ctx.annotate(note)?;
        }
        if let Some((url, manifest)) = &self.fetch {
            ctx.fetch_verified(url, manifest)?;
        }
        if !self.locate.is_empty() {
            let found = path_candidates(self.locate.as_slice()).resolve(ctx.name())?;
            ctx.annotate(&found.display().to_string())?;
        }
        for cmd in &self.commands {
            ctx.run(cmd)?;
        }
        Ok(())
    }
}

/// Phases built from a [`WizardConfig`], in config order.
pub fn build_phases(config: &WizardConfig) -> Result<Vec<Phase>> {
    let vars = &config.general.vars;
    config
        .phases
        .iter()
        .map(|phase| {
            debug!("Building phase {} (enabled: {})", phase.name, phase.enabled);
            phase
                .steps
                .iter()
                .try_fold(Phase::new(&phase.name, phase.enabled), |built, step| -> Result<Phase> {
                    Ok(built.step(&step.name, ConfiguredStep::from_config(step, vars)?))
                })
        })
        .collect()
}

pub fn header_lines(config: &WizardConfig, workdir: &Path) -> Vec<String> {
    let mut lines: Vec<String> = config
        .general
        .header
        .iter()
        .map(|l| expand_vars(l, &config.general.vars))
        .collect();

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    lines.push(format!("Host:    {host}"));
    lines.push(format!(
        "Started: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    lines.push(format!("Workdir: {}", workdir.display()));
    if config.general.dryrun {
        lines.push("DRYRUN - no changes will be made".to_string());
    }
    lines
}

/// Session with every configured step registered, plus the phases to run.
pub fn build_session(config: &WizardConfig, workdir: &Path) -> Result<(Session, Vec<Phase>)> {
    let phases = build_phases(config)?;
    let mut session = Session::new(
        expand_vars(&config.general.title, &config.general.vars),
        header_lines(config, workdir),
    );
    register_phases(&mut session, &phases)?;
    Ok((session, phases))
}
