use crossterm::style::Color;

use crate::wizard::StepStatus;

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color,
    pub secondary: Color,
    pub foreground: Color,
    pub error: Color,
    pub success: Color,
    pub muted: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color::Yellow,
            secondary: Color::Cyan,
            foreground: Color::White,
            error: Color::Red,
            success: Color::Green,
            muted: Color::DarkGrey,
        }
    }
}

impl Theme {
    pub fn status_color(&self, status: StepStatus) -> Color {
        match status {
            StepStatus::Planned => self.muted,
            StepStatus::Current => self.primary,
            StepStatus::Skipped => self.secondary,
            StepStatus::Completed => self.success,
            StepStatus::Failed => self.error,
        }
    }
}
