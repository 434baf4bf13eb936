mod guard;
mod region;
mod theme;

pub use guard::{Restorer, TerminalGuard, write_restore};
pub use region::{ResetScrollRegion, SetScrollRegion};
pub use theme::Theme;

use std::io::Write;
use std::sync::Arc;

use crossterm::{
    cursor::{Hide, MoveTo, RestorePosition, SavePosition},
    queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use tracing::warn;
use unicode_width::UnicodeWidthChar;

use crate::error::{Result, WizardError};
use crate::wizard::{Session, StepStatus};

const DEFAULT_SIZE: (u16, u16) = (80, 24);

/// Screen rows derived from a session's shape.
///
/// ```text
/// row 0                 title
/// rows 1..=h            static header lines
/// row h+1               blank
/// rows h+2..h+2+n       one line per step
/// row h+2+n             divider
/// rows below divider    scroll region for the running step's output
/// ```
///
/// Every row is computed from the header length and the step index, so a
/// redraw can never address a stale offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub steps_top: u16,
    pub divider: u16,
    pub scroll_top: u16,
    pub scroll_bottom: u16,
}

impl Layout {
    pub fn new(session: &Session, rows: u16) -> Self {
        let steps_top = session.header().len() as u16 + 2;
        let divider = steps_top + session.steps().len() as u16;
        let scroll_bottom = rows.saturating_sub(1);
        // Keep at least one row of output on undersized terminals
        let scroll_top = (divider + 1).min(scroll_bottom.saturating_sub(1));
        Self {
            steps_top,
            divider,
            scroll_top,
            scroll_bottom,
        }
    }

    pub fn step_row(&self, index: usize) -> u16 {
        self.steps_top + index as u16
    }
}

pub struct Renderer {
    out: Box<dyn Write + Send>,
    theme: Theme,
    cols: u16,
    rows: u16,
    restorer: Option<Arc<Restorer>>,
}

impl Renderer {
    /// Renderer sized to the controlling terminal, 80x24 if that can't be queried.
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        let (cols, rows) = match terminal::size() {
            Ok((cols, rows)) if cols > 0 && rows > 0 => (cols, rows),
            Ok(_) | Err(_) => {
                warn!("Terminal size unavailable, assuming {:?}", DEFAULT_SIZE);
                DEFAULT_SIZE
            }
        };
        Self::with_size(out, cols, rows)
    }

    pub fn with_size(out: Box<dyn Write + Send>, cols: u16, rows: u16) -> Self {
        Self {
            out,
            theme: Theme::default(),
            cols,
            rows,
            restorer: None,
        }
    }

    /// Stop drawing once `restorer` has handed the terminal back.
    pub fn with_restorer(mut self, restorer: Arc<Restorer>) -> Self {
        self.restorer = Some(restorer);
        self
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn layout(&self, session: &Session) -> Layout {
        Layout::new(session, self.rows)
    }

    /// Clear the screen, draw header and step panel, then confine scrolling below the panel.
    pub fn full_redraw(&mut self, session: &Session) -> Result<()> {
        self.ensure_live()?;
        let layout = self.layout(session);
        let width = self.cols as usize;

        queue!(
            self.out,
            ResetScrollRegion,
            ResetColor,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0),
            SetForegroundColor(self.theme.primary),
            SetAttribute(Attribute::Bold),
            Print(fit(session.title(), width)),
            SetAttribute(Attribute::Reset),
            ResetColor,
        )
        .map_err(term_err)?;

        for (i, line) in session.header().iter().enumerate() {
            queue!(
                self.out,
                MoveTo(0, i as u16 + 1),
                SetForegroundColor(self.theme.foreground),
                Print(fit(line, width)),
                ResetColor,
            )
            .map_err(term_err)?;
        }

        for index in 0..session.steps().len() {
            self.queue_step_line(session, &layout, index)?;
        }

        queue!(
            self.out,
            MoveTo(0, layout.divider),
            SetForegroundColor(self.theme.muted),
            Print("─".repeat(width)),
            ResetColor,
            SetScrollRegion(layout.scroll_top, layout.scroll_bottom),
            MoveTo(0, layout.scroll_top),
        )
        .map_err(term_err)?;

        self.flush()
    }

    /// Rewrite a single step line in place, leaving the output cursor where it was.
    pub fn redraw_step(&mut self, session: &Session, index: usize) -> Result<()> {
        self.ensure_live()?;
        let layout = self.layout(session);
        queue!(self.out, SavePosition).map_err(term_err)?;
        self.queue_step_line(session, &layout, index)?;
        queue!(self.out, RestorePosition).map_err(term_err)?;
        self.flush()
    }

    /// Rewrite every step line in place without touching the scroll region.
    pub fn redraw_panel(&mut self, session: &Session) -> Result<()> {
        self.ensure_live()?;
        let layout = self.layout(session);
        queue!(self.out, SavePosition).map_err(term_err)?;
        for index in 0..session.steps().len() {
            self.queue_step_line(session, &layout, index)?;
        }
        queue!(self.out, RestorePosition).map_err(term_err)?;
        self.flush()
    }

    /// Clear the output region and print the banner for a step that just became current.
    pub fn begin_step_output(&mut self, session: &Session, index: usize) -> Result<()> {
        self.ensure_live()?;
        let layout = self.layout(session);
        let banner = format!("==> {}", session.step(index).name);
        queue!(
            self.out,
            SetScrollRegion(layout.scroll_top, layout.scroll_bottom),
            MoveTo(0, layout.scroll_top),
            Clear(ClearType::FromCursorDown),
            SetForegroundColor(self.theme.secondary),
            SetAttribute(Attribute::Bold),
            Print(fit(&banner, self.cols as usize)),
            SetAttribute(Attribute::Reset),
            ResetColor,
            Print("\r\n"),
        )
        .map_err(term_err)?;
        self.flush()
    }

    /// Write a line of step output into the scroll region.
    pub fn println(&mut self, line: &str) -> Result<()> {
        self.ensure_live()?;
        queue!(self.out, Print(line), Print("\r\n")).map_err(term_err)?;
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(term_err)
    }

    fn ensure_live(&self) -> Result<()> {
        match &self.restorer {
            Some(restorer) if restorer.is_restored() => Err(WizardError::Interrupted),
            _ => Ok(()),
        }
    }

    fn queue_step_line(&mut self, session: &Session, layout: &Layout, index: usize) -> Result<()> {
        let step = session.step(index);
        let width = self.cols as usize;
        let label = fit(&format!("{} {}", step.status.marker(), step.name), width);
        let comment = if step.comment.is_empty() {
            String::new()
        } else {
            fit(
                &format!("  {}", step.comment),
                width.saturating_sub(display_width(&label)),
            )
        };

        queue!(
            self.out,
            MoveTo(0, layout.step_row(index)),
            Clear(ClearType::CurrentLine),
            SetForegroundColor(self.theme.status_color(step.status)),
        )
        .map_err(term_err)?;
        if step.status == StepStatus::Planned {
            queue!(self.out, SetAttribute(Attribute::Dim)).map_err(term_err)?;
        }
        queue!(
            self.out,
            Print(label),
            SetAttribute(Attribute::Reset),
            SetForegroundColor(self.theme.muted),
            Print(comment),
            ResetColor,
        )
        .map_err(term_err)
    }
}

/// Single-row rendering of `text` at most `width` columns wide.
///
/// Control characters become spaces so nothing can move the cursor off the row.
fn fit(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut fitted = String::new();
    for c in text.chars() {
        let c = if c.is_control() { ' ' } else { c };
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        fitted.push(c);
    }
    fitted
}

fn display_width(text: &str) -> usize {
    text.chars().map(|c| c.width().unwrap_or(0)).sum()
}

fn term_err(e: std::io::Error) -> WizardError {
    WizardError::Terminal(e.to_string())
}
