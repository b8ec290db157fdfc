//! Short status lines on stderr: connection steps, per-rule upload results,
//! warnings.
//!
//! Nothing is printed with `-v` since the tracing output says the same thing.

use colored::{ColoredString, Colorize};
use std::io::{self, IsTerminal, Write};

/// Colors unless `NO_COLOR` is set; `FORCE_COLOR` wins over a non-terminal stderr
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::env::var_os("FORCE_COLOR").is_some() || io::stderr().is_terminal()
}

pub struct Progress {
    writer: Box<dyn Write>,
    silent: bool,
    colors_enabled: bool,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Progress {
    /// Reporter writing to stderr, silent when `verbose`
    pub fn new(verbose: bool) -> Self {
        let colors_enabled = should_use_colors();
        if !colors_enabled {
            colored::control::set_override(false);
        }
        Self {
            writer: Box::new(io::stderr()),
            silent: verbose,
            colors_enabled,
        }
    }

    #[cfg(test)]
    pub fn with_writer(writer: Box<dyn Write>) -> Self {
        Self {
            writer,
            silent: false,
            colors_enabled: false,
        }
    }

    fn emit(&mut self, styled: impl FnOnce() -> ColoredString, plain: &str, newline: bool) {
        if self.silent {
            return;
        }
        let text = if self.colors_enabled {
            styled().to_string()
        } else {
            plain.to_string()
        };
        let _ = if newline {
            writeln!(self.writer, "{}", text)
        } else {
            write!(self.writer, "{}", text)
        };
        let _ = self.writer.flush();
    }

    /// Start a step; finish it with [`done`](Self::done) or [`failed`](Self::failed)
    pub fn step(&mut self, message: &str) {
        let text = format!("{}...", message);
        self.emit(|| text.as_str().dimmed(), &text, false);
    }

    pub fn done(&mut self) {
        self.emit(|| " done".green(), " done", true);
    }

    pub fn failed(&mut self) {
        self.emit(|| " failed".red(), " failed", true);
    }

    /// One rule of a batch, e.g. `[2/5] Frieren created`
    pub fn rule_progress(&mut self, current: usize, total: usize, name: &str, outcome: &str) {
        if self.silent {
            return;
        }
        let counter = format!("[{}/{}]", current, total);
        let line = if self.colors_enabled {
            format!("{} {} {}", counter.cyan(), name, outcome.dimmed())
        } else {
            format!("{} {} {}", counter, name, outcome)
        };
        let _ = writeln!(self.writer, "{}", line);
    }

    /// A problem that does not stop the command
    pub fn warn(&mut self, message: &str) {
        let plain = format!("Warning: {}", message);
        let styled = format!("! {}", message);
        self.emit(|| styled.as_str().yellow(), &plain, true);
    }

    pub fn note(&mut self, message: &str) {
        self.emit(|| message.dimmed(), message, true);
    }

    pub fn success(&mut self, message: &str) {
        let styled = format!("✓ {}", message);
        self.emit(|| styled.as_str().green(), message, true);
    }
}
