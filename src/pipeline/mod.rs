mod context;

pub use context::{StepContext, WorkUnit};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::error::{Result, WizardError};
use crate::render::Renderer;
use crate::service::ToolService;
use crate::wizard::{Session, StepStatus};

/// One or more steps behind a single toggle. Steps of a disabled phase stay
/// `Planned` until the final sweep turns them `Skipped`.
pub struct Phase {
    name: String,
    enabled: bool,
    steps: Vec<(String, Box<dyn WorkUnit>)>,
}

impl Phase {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, name: impl Into<String>, work: impl WorkUnit + 'static) -> Self {
        self.steps.push((name.into(), Box::new(work)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|(name, _)| name.as_str())
    }
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phase")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("steps", &self.step_names().collect::<Vec<_>>())
            .finish()
    }
}

/// Register the steps of every phase, enabled or not, in phase order.
pub fn register_phases(session: &mut Session, phases: &[Phase]) -> Result<()> {
    for name in phases.iter().flat_map(Phase::step_names) {
        session.register(name)?;
    }
    Ok(())
}

/// Strictly ordered, fail-fast executor.
///
/// A step becomes `Completed` only when the executor moves on from it. The
/// first error, whether raised by the work unit or by drawing, marks the
/// running step `Failed` and ends the run.
pub struct Pipeline {
    session: Session,
    renderer: Renderer,
    service: Arc<dyn ToolService>,
    workdir: PathBuf,
}

impl Pipeline {
    pub fn new(
        session: Session,
        renderer: Renderer,
        service: Arc<dyn ToolService>,
        workdir: PathBuf,
    ) -> Self {
        Self {
            session,
            renderer,
            service,
            workdir,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn run(&mut self, phases: Vec<Phase>) -> Result<()> {
        // Every referenced step must exist before anything is drawn or run
        for name in phases.iter().flat_map(Phase::step_names) {
            if !self.session.steps().iter().any(|s| s.name == name) {
                return Err(WizardError::StepNotFound(name.to_string()));
            }
        }

        self.renderer.full_redraw(&self.session)?;

        for phase in phases {
            if !phase.enabled {
                info!("Phase {} disabled", phase.name);
                continue;
            }
            info!("Phase {}", phase.name);

            for (name, mut work) in phase.steps {
                let index = match self.enter(&name) {
                    Ok(index) => index,
                    Err(e) => return Err(self.abort(e)),
                };

                let started = Instant::now();
                let result = {
                    let mut ctx = StepContext {
                        session: &mut self.session,
                        renderer: &mut self.renderer,
                        service: self.service.as_ref(),
                        workdir: &self.workdir,
                        index,
                    };
                    work.run(&mut ctx)
                };

                if let Err(e) = result {
                    return Err(self.abort(e));
                }
                info!("Step {} finished in {:.1?}", name, started.elapsed());
            }
        }

        self.finish().map_err(|e| self.abort(e))
    }

    /// Complete the running step and make `name` current. States change
    /// before anything is drawn, so a drawing error always finds `name` current.
    fn enter(&mut self, name: &str) -> Result<usize> {
        let previous = self.session.current();
        if let Some(previous) = previous {
            self.session.transition(previous, StepStatus::Completed)?;
        }
        let index = self.session.select(name)?;
        self.session.transition(index, StepStatus::Current)?;
        info!("Step {} started", name);

        if let Some(previous) = previous {
            self.renderer.redraw_step(&self.session, previous)?;
        }
        self.renderer.redraw_step(&self.session, index)?;
        self.renderer.begin_step_output(&self.session, index)?;
        Ok(index)
    }

    fn abort(&mut self, err: WizardError) -> WizardError {
        if let Some(index) = self.session.current() {
            self.fail(index, &err);
        }
        err
    }

    /// Leave the failure visible in place. Rendering problems here must not mask `err`.
    fn fail(&mut self, index: usize, err: &WizardError) {
        error!("Step {} failed: {}", self.session.step(index).name, err);
        self.session.annotate(index, &err.short());
        self.session.set_status(index, StepStatus::Failed);

        let shown = self
            .renderer
            .println(&format!("error: {err}"))
            .and_then(|_| self.renderer.redraw_step(&self.session, index));
        if let Err(e) = shown {
            warn!("Failed to draw failure of step {}: {}", index, e);
        }
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(index) = self.session.current() {
            self.session.transition(index, StepStatus::Completed)?;
        }
        let skipped = self.session.skip_planned();
        let completed = self.session.count(StepStatus::Completed);
        info!("Pipeline done: {} completed, {} skipped", completed, skipped);

        self.renderer.redraw_panel(&self.session)?;
        self.renderer
            .println(&format!("Done: {completed} completed, {skipped} skipped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::DryrunService;
    use std::io::Write;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn ok(_: &mut StepContext<'_>) -> Result<()> {
        Ok(())
    }

    fn boom(_: &mut StepContext<'_>) -> Result<()> {
        Err(WizardError::ExternalTool {
            tool: "make".to_string(),
            code: Some(2),
        })
    }

    fn pipeline(phases: &[Phase]) -> (Pipeline, Capture) {
        let mut session = Session::new("Test", Vec::new());
        register_phases(&mut session, phases).unwrap();
        let capture = Capture::default();
        let renderer = Renderer::with_size(Box::new(capture.clone()), 80, 24);
        let pipeline = Pipeline::new(
            session,
            renderer,
            Arc::new(DryrunService),
            std::env::temp_dir(),
        );
        (pipeline, capture)
    }

    fn statuses(pipeline: &Pipeline) -> Vec<StepStatus> {
        pipeline.session().steps().iter().map(|s| s.status).collect()
    }

    #[test]
    fn failure_aborts_remaining_steps() {
        let phases = vec![
            Phase::new("all", true)
                .step("A", ok)
                .step("B", boom)
                .step("C", ok),
        ];
        let (mut pipeline, _) = pipeline(&phases);

        let err = pipeline.run(phases).unwrap_err();

        assert!(matches!(err, WizardError::ExternalTool { .. }));
        assert_eq!(
            statuses(&pipeline),
            [StepStatus::Completed, StepStatus::Failed, StepStatus::Planned]
        );
        assert_eq!(pipeline.session().step(1).comment, "make failed (2)");
    }

    #[test]
    fn disabled_phase_is_skipped_at_finish() {
        let phases = vec![
            Phase::new("first", true).step("A", ok),
            Phase::new("second", false).step("B", boom),
        ];
        let (mut pipeline, _) = pipeline(&phases);

        pipeline.run(phases).unwrap();

        assert_eq!(statuses(&pipeline), [StepStatus::Completed, StepStatus::Skipped]);
        assert_eq!(pipeline.session().current(), None);
    }

    #[test]
    fn previous_step_completes_only_when_next_is_selected() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let phases = vec![Phase::new("all", true).step("A", ok).step(
            "B",
            move |ctx: &mut StepContext<'_>| -> Result<()> {
                let statuses: Vec<_> = ctx.session.steps().iter().map(|s| s.status).collect();
                record.lock().unwrap().extend(statuses);
                Ok(())
            },
        )];
        let (mut pipeline, _) = pipeline(&phases);

        pipeline.run(phases).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            [StepStatus::Completed, StepStatus::Current]
        );
    }

    #[test]
    fn unknown_step_fails_before_drawing() {
        let phases = vec![Phase::new("all", true).step("A", ok)];
        let (mut pipeline, capture) = pipeline(&[]);

        let err = pipeline.run(phases).unwrap_err();

        assert!(matches!(err, WizardError::StepNotFound(name) if name == "A"));
        assert!(capture.0.lock().unwrap().is_empty());
    }

    #[test]
    fn annotation_from_work_unit_is_drawn() {
        let phases = vec![Phase::new("all", true).step(
            "Resolve",
            |ctx: &mut StepContext<'_>| ctx.annotate("6.1.42"),
        )];
        let (mut pipeline, capture) = pipeline(&phases);

        pipeline.run(phases).unwrap();

        assert_eq!(pipeline.session().step(0).comment, "6.1.42");
        let out = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("[x] Resolve"));
        assert!(out.contains("  6.1.42"));
        assert!(out.contains("Done: 1 completed, 0 skipped"));
    }

    /// Writer that starts failing once `broken` is set.
    #[derive(Clone, Default)]
    struct Breakable {
        broken: Arc<AtomicBool>,
    }

    impl Write for Breakable {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("terminal went away"));
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn drawing_error_while_starting_a_step_fails_that_step() {
        let out = Breakable::default();
        let broken = Arc::clone(&out.broken);
        let phases = vec![
            Phase::new("all", true)
                .step("A", move |_: &mut StepContext<'_>| -> Result<()> {
                    broken.store(true, Ordering::SeqCst);
                    Ok(())
                })
                .step("B", ok)
                .step("C", ok),
        ];
        let mut session = Session::new("Test", Vec::new());
        register_phases(&mut session, &phases).unwrap();
        let renderer = Renderer::with_size(Box::new(out), 80, 24);
        let mut pipeline = Pipeline::new(
            session,
            renderer,
            Arc::new(DryrunService),
            std::env::temp_dir(),
        );

        let err = pipeline.run(phases).unwrap_err();

        assert!(matches!(err, WizardError::Terminal(_)));
        assert_eq!(
            statuses(&pipeline),
            [StepStatus::Completed, StepStatus::Failed, StepStatus::Planned]
        );
        assert_eq!(pipeline.session().current(), None);
    }

    #[test]
    fn drawing_error_at_finish_leaves_no_step_current() {
        let out = Breakable::default();
        let broken = Arc::clone(&out.broken);
        let phases = vec![Phase::new("all", true).step(
            "A",
            move |_: &mut StepContext<'_>| -> Result<()> {
                broken.store(true, Ordering::SeqCst);
                Ok(())
            },
        )];
        let mut session = Session::new("Test", Vec::new());
        register_phases(&mut session, &phases).unwrap();
        let renderer = Renderer::with_size(Box::new(out), 80, 24);
        let mut pipeline = Pipeline::new(
            session,
            renderer,
            Arc::new(DryrunService),
            std::env::temp_dir(),
        );

        assert!(pipeline.run(phases).is_err());
        assert_eq!(statuses(&pipeline), [StepStatus::Completed]);
    }
}
