mod step;

pub use step::{Step, StepStatus};

use tracing::debug;

use crate::error::{Result, WizardError};

/// Title, static header and the ordered step registry for one run.
///
/// Registration order is both execution and display order. Steps are never
/// removed or reordered, so an index returned by [`Session::register`] or
/// [`Session::select`] stays valid for the session's lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    title: String,
    header: Vec<String>,
    steps: Vec<Step>,
    cursor: Option<usize>,
}

impl Session {
    pub fn new(title: impl Into<String>, header: Vec<String>) -> Self {
        Self {
            title: title.into(),
            header,
            steps: Vec::new(),
            cursor: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> &Step {
        &self.steps[index]
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Append a new `Planned` step. Names must be unique.
    pub fn register(&mut self, name: &str) -> Result<usize> {
        if self.steps.iter().any(|s| s.name == name) {
            return Err(WizardError::DuplicateName(name.to_string()));
        }
        self.steps.push(Step::new(name));
        debug!("Registered step {}: {}", self.steps.len() - 1, name);
        Ok(self.steps.len() - 1)
    }

    /// Look up a step by exact name and move the cursor to it.
    pub fn select(&mut self, name: &str) -> Result<usize> {
        let index = self
            .steps
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| WizardError::StepNotFound(name.to_string()))?;
        self.cursor = Some(index);
        Ok(index)
    }

    pub fn annotate(&mut self, index: usize, text: &str) {
        self.steps[index].annotate(text);
    }

    /// Unconditional overwrite, see [`Session::transition`] for the checked form.
    pub fn set_status(&mut self, index: usize, status: StepStatus) {
        self.steps[index].status = status;
    }

    pub fn transition(&mut self, index: usize, to: StepStatus) -> Result<()> {
        let step = &mut self.steps[index];
        if !step.status.can_transition_to(to) {
            return Err(WizardError::InvalidTransition {
                step: step.name.clone(),
                from: step.status,
                to,
            });
        }
        debug!("Step {}: {:?} -> {:?}", step.name, step.status, to);
        step.status = to;
        Ok(())
    }

    /// Index of the step currently running, if any.
    pub fn current(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.status == StepStatus::Current)
    }

    /// Reclassify every step still `Planned` as `Skipped`. Returns how many moved.
    pub fn skip_planned(&mut self) -> usize {
        let mut count = 0;
        for step in self
            .steps
            .iter_mut()
            .filter(|s| s.status == StepStatus::Planned)
        {
            step.status = StepStatus::Skipped;
            count += 1;
        }
        self.cursor = None;
        count
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}
