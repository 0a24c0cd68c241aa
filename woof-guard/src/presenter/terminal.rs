//! Terminal output

use colored::*;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType};
use std::io::{self, Stdout, Write};
use woof_core::domain::group::Severity;

/// Screen the dashboard is drawn on
pub trait Terminal: Send {
    /// Width in columns, if known
    fn width(&self) -> Option<usize>;

    /// Clears the screen and homes the cursor
    fn clear(&mut self) -> io::Result<()>;

    fn write_line(&mut self, text: &str, severity: Severity) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// The process's stdout
pub struct ConsoleTerminal {
    out: Stdout,
}

impl ConsoleTerminal {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for ConsoleTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for ConsoleTerminal {
    fn width(&self) -> Option<usize> {
        terminal::size()
            .ok()
            .map(|(columns, _)| columns as usize)
            .filter(|&columns| columns > 0)
    }

    fn clear(&mut self) -> io::Result<()> {
        execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))
    }

    fn write_line(&mut self, text: &str, severity: Severity) -> io::Result<()> {
        match severity {
            Severity::Normal => writeln!(self.out, "{}", text),
            Severity::Complete => writeln!(self.out, "{}", text.green()),
            Severity::Error => writeln!(self.out, "{}", text.red()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Terminal that keeps every frame in memory
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct RecordingTerminal {
    pub width: Option<usize>,
    pub frames: Vec<Vec<(String, Severity)>>,
}

#[cfg(test)]
impl RecordingTerminal {
    pub fn with_width(width: usize) -> Self {
        Self {
            width: Some(width),
            frames: Vec::new(),
        }
    }

    pub fn last_frame(&self) -> &[(String, Severity)] {
        self.frames.last().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn last_text(&self) -> Vec<&str> {
        self.last_frame().iter().map(|(text, _)| text.as_str()).collect()
    }
}

#[cfg(test)]
impl Terminal for RecordingTerminal {
    fn width(&self) -> Option<usize> {
        self.width
    }

    fn clear(&mut self) -> io::Result<()> {
        self.frames.push(Vec::new());
        Ok(())
    }

    fn write_line(&mut self, text: &str, severity: Severity) -> io::Result<()> {
        if self.frames.is_empty() {
            self.frames.push(Vec::new());
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.push((text.to_string(), severity));
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
