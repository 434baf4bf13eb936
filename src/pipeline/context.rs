use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::fetch;
use crate::render::Renderer;
use crate::service::ToolService;
use crate::wizard::Session;

/// A step's unit of work.
pub trait WorkUnit: Send {
    fn run(&mut self, ctx: &mut StepContext<'_>) -> Result<()>;
}

impl<F> WorkUnit for F
where
    F: FnMut(&mut StepContext<'_>) -> Result<()> + Send,
{
    fn run(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        self(ctx)
    }
}

/// What a running step may touch: its own comment, the output region,
/// the working directory and the tool service.
pub struct StepContext<'a> {
    pub(super) session: &'a mut Session,
    pub(super) renderer: &'a mut Renderer,
    pub(super) service: &'a dyn ToolService,
    pub(super) workdir: &'a Path,
    pub(super) index: usize,
}

impl StepContext<'_> {
    pub fn name(&self) -> &str {
        &self.session.step(self.index).name
    }

    pub fn workdir(&self) -> &Path {
        self.workdir
    }

    pub fn service(&self) -> &dyn ToolService {
        self.service
    }

    pub fn is_dryrun(&self) -> bool {
        self.service.is_dryrun()
    }

    /// Record a short status string on this step and show it immediately.
    pub fn annotate(&mut self, text: &str) -> Result<()> {
        self.session.annotate(self.index, text);
        self.renderer.redraw_step(self.session, self.index)
    }

    /// Print a line into the scroll region.
    pub fn println(&mut self, line: &str) -> Result<()> {
        self.renderer.println(line)
    }

    /// Run a command in the working directory, output going to the scroll region.
    pub fn run(&mut self, cmd: &[String]) -> Result<()> {
        let shown = format!("$ {}", self.service.command_string(cmd));
        self.renderer.println(&shown)?;
        self.service.run(cmd, self.workdir)
    }

    /// Checksum-verified download into the working directory.
    pub fn fetch_verified(&mut self, source_url: &str, manifest_url: &str) -> Result<PathBuf> {
        let file = fetch::file_name_from_url(source_url)?;
        if self.is_dryrun() {
            info!("Dryrun: not fetching {}", source_url);
            self.annotate(&format!("{file} (dryrun)"))?;
            return Ok(self.workdir.join(file));
        }

        self.renderer.println(&format!("Fetching {source_url}"))?;
        let path = fetch::fetch_verified(self.service, source_url, manifest_url, self.workdir)?;
        self.renderer.println(&format!("Verified {file}"))?;
        self.annotate(&file)?;
        Ok(path)
    }
}
