use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, WizardError};

type Strategy<T> = Box<dyn Fn() -> Option<T> + Send>;

/// Ordered fallback lookup: each strategy is tried in turn and the first hit wins.
pub struct Candidates<T> {
    strategies: Vec<(String, Strategy<T>)>,
}

impl<T> Default for Candidates<T> {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }
}

impl<T> Candidates<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn or(mut self, label: impl Into<String>, f: impl Fn() -> Option<T> + Send + 'static) -> Self {
        self.strategies.push((label.into(), Box::new(f)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// First strategy that produces a value; an `Environment` error naming all of them otherwise.
    pub fn resolve(&self, what: &str) -> Result<T> {
        for (label, strategy) in &self.strategies {
            if let Some(found) = strategy() {
                debug!("{} resolved via {}", what, label);
                return Ok(found);
            }
            debug!("{} not found via {}", what, label);
        }
        let tried = self
            .strategies
            .iter()
            .map(|(label, _)| label.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Err(WizardError::Environment(format!(
            "{what} not found (tried: {tried})"
        )))
    }
}

/// Path strategies: `dir/name` must exist, `dir/prefix*` takes the first
/// matching entry in sorted order.
pub fn path_candidates<S: AsRef<str>>(patterns: &[S]) -> Candidates<PathBuf> {
    patterns.iter().fold(Candidates::new(), |candidates, pattern| {
        let pattern = pattern.as_ref().to_string();
        let label = pattern.clone();
        candidates.or(label, move || match_pattern(&pattern))
    })
}

fn match_pattern(pattern: &str) -> Option<PathBuf> {
    let Some(prefix_pattern) = pattern.strip_suffix('*') else {
        let path = PathBuf::from(pattern);
        return path.exists().then_some(path);
    };

    let path = Path::new(prefix_pattern);
    let (dir, prefix) = if prefix_pattern.ends_with('/') {
        (path, "")
    } else {
        (
            path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new(".")),
            path.file_name()?.to_str()?,
        )
    };

    let mut matches: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_str().is_some_and(|n| n.starts_with(prefix)))
        .map(|entry| entry.path())
        .collect();
    matches.sort();
    matches.into_iter().next()
}
