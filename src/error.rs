use thiserror::Error;

use crate::wizard::StepStatus;

#[derive(Error, Debug)]
pub enum WizardError {
    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Checksum manifest unavailable at {url}: {reason}")]
    ManifestUnavailable { url: String, reason: String },

    #[error("No checksum entry for {file} in manifest")]
    ChecksumMissing { file: String },

    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("Duplicate step name: {0}")]
    DuplicateName(String),

    #[error("{tool} exited with code {code:?}")]
    ExternalTool { tool: String, code: Option<i32> },

    #[error("Invalid transition for step {step}: {from:?} -> {to:?}")]
    InvalidTransition {
        step: String,
        from: StepStatus,
        to: StepStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("Interrupted")]
    Interrupted,
}

impl WizardError {
    /// One-line diagnostic for the failed step's comment.
    pub fn short(&self) -> String {
        match self {
            WizardError::ManifestUnavailable { .. } => "manifest unavailable".to_string(),
            WizardError::ChecksumMissing { file } => format!("no checksum for {file}"),
            WizardError::ChecksumMismatch { file, .. } => format!("checksum mismatch: {file}"),
            WizardError::ExternalTool { tool, code } => match code {
                Some(code) => format!("{tool} failed ({code})"),
                None => format!("{tool} killed"),
            },
            WizardError::Io(e) => format!("io: {}", e.kind()),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WizardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_diagnostic_is_single_line() {
        let err = WizardError::ChecksumMismatch {
            file: "linux-6.1.tar.xz".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert_eq!(err.short(), "checksum mismatch: linux-6.1.tar.xz");

        let err = WizardError::ExternalTool {
            tool: "make".to_string(),
            code: Some(2),
        };
        assert_eq!(err.short(), "make failed (2)");
        assert!(!err.to_string().contains('\n'));
    }
}
