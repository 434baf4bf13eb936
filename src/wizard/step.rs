/// Lifecycle of a single step.
///
/// `Planned` is the initial state. `Completed`, `Failed` and `Skipped` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepStatus {
    #[default]
    Planned,
    Current,
    Skipped,
    Completed,
    Failed,
}

impl StepStatus {
    /// Whether the executor may move a step from `self` to `next`.
    pub fn can_transition_to(self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Planned, StepStatus::Current)
                | (StepStatus::Planned, StepStatus::Skipped)
                | (StepStatus::Current, StepStatus::Completed)
                | (StepStatus::Current, StepStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Skipped | StepStatus::Completed | StepStatus::Failed
        )
    }

    /// Marker drawn in front of the step name
    pub fn marker(self) -> &'static str {
        match self {
            StepStatus::Planned => "[ ]",
            StepStatus::Current => "[>]",
            StepStatus::Skipped => "[-]",
            StepStatus::Completed => "[x]",
            StepStatus::Failed => "[!]",
        }
    }
}

/// One named unit of orchestrated work.
#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub status: StepStatus,
    pub comment: String,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Planned,
            comment: String::new(),
        }
    }

    /// Append to the comment, separating entries with `"; "`.
    pub fn annotate(&mut self, text: &str) {
        if self.comment.is_empty() {
            self.comment = text.to_string();
        } else {
            self.comment.push_str("; ");
            self.comment.push_str(text);
        }
    }
}
