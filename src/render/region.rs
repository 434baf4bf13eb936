use std::fmt;

use crossterm::Command;

/// DECSTBM: confine scrolling to rows `top..=bottom` (0-based, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetScrollRegion(pub u16, pub u16);

impl Command for SetScrollRegion {
    fn write_ansi(&self, f: &mut impl fmt::Write) -> fmt::Result {
        write!(f, "\x1b[{};{}r", self.0 + 1, self.1 + 1)
    }

    #[cfg(windows)]
    fn execute_winapi(&self) -> std::io::Result<()> {
        Err(std::io::Error::other("scroll regions need an ANSI terminal"))
    }
}

/// Reset the scroll region to the whole screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetScrollRegion;

impl Command for ResetScrollRegion {
    fn write_ansi(&self, f: &mut impl fmt::Write) -> fmt::Result {
        f.write_str("\x1b[r")
    }

    #[cfg(windows)]
    fn execute_winapi(&self) -> std::io::Result<()> {
        Err(std::io::Error::other("scroll regions need an ANSI terminal"))
    }
}
