//! Combat event logger
//!
//! Messages are filtered by verbosity and either printed (as text or JSON
//! lines) or captured in memory for later inspection. Formatting goes
//! through a reusable bump arena.

use bumpalo::Bump;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::fmt::{self, Write as FmtWrite};
use std::ops::Deref;
use std::str::FromStr;

/// Verbosity level for combat output
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize,
)]
pub enum VerbosityLevel {
    /// Silent - no output
    Silent = 0,
    /// Minimal - only outcomes (search summary, combat result)
    Minimal = 1,
    /// Normal - combat steps and key events (default)
    #[default]
    Normal = 2,
    /// Verbose - every trigger, damage event and state-based action
    Verbose = 3,
}

impl FromStr for VerbosityLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "0" => Ok(VerbosityLevel::Silent),
            "minimal" | "1" => Ok(VerbosityLevel::Minimal),
            "normal" | "2" => Ok(VerbosityLevel::Normal),
            "verbose" | "3" => Ok(VerbosityLevel::Verbose),
            _ => Err(format!(
                "invalid verbosity level '{s}' (expected: silent/0, minimal/1, normal/2, verbose/3)"
            )),
        }
    }
}

/// How printed messages are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// Plain text, one message per line
    #[default]
    Text,
    /// One JSON `LogEntry` per line
    Json,
}

/// A captured log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: VerbosityLevel,
    pub message: String,
    /// Optional category (e.g., "trigger", "damage", "sba", "search")
    pub category: Option<String>,
}

/// Borrowed view of the captured entries
pub struct LogGuard<'a> {
    guard: Ref<'a, Vec<LogEntry>>,
}

impl<'a> LogGuard<'a> {
    pub fn iter(&self) -> std::slice::Iter<'_, LogEntry> {
        self.guard.iter()
    }

    pub fn len(&self) -> usize {
        self.guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }
}

impl<'a> Deref for LogGuard<'a> {
    type Target = [LogEntry];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Logger for combat resolution and search
///
/// A capturing logger keeps every message in memory and prints nothing.
pub struct CombatLogger {
    verbosity: VerbosityLevel,
    output_format: OutputFormat,
    capture: bool,
    format_bump: RefCell<Bump>,
    log_buffer: RefCell<Vec<LogEntry>>,
}

impl CombatLogger {
    /// Logger at Normal verbosity printing text to stdout
    pub fn new() -> Self {
        Self::with_verbosity(VerbosityLevel::default())
    }

    pub fn with_verbosity(verbosity: VerbosityLevel) -> Self {
        CombatLogger {
            verbosity,
            output_format: OutputFormat::default(),
            capture: false,
            format_bump: RefCell::new(Bump::new()),
            log_buffer: RefCell::new(Vec::new()),
        }
    }

    /// Logger that drops everything (used by nested simulations)
    pub fn silent() -> Self {
        Self::with_verbosity(VerbosityLevel::Silent)
    }

    /// Logger that records every message in memory and prints nothing
    pub fn capturing() -> Self {
        let mut logger = Self::with_verbosity(VerbosityLevel::Verbose);
        logger.capture = true;
        logger
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn is_capturing(&self) -> bool {
        self.capture
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    #[inline]
    pub fn is_enabled(&self, level: VerbosityLevel) -> bool {
        if level == VerbosityLevel::Silent {
            return false;
        }
        self.capture || level <= self.verbosity
    }

    pub fn logs(&self) -> LogGuard<'_> {
        LogGuard {
            guard: self.log_buffer.borrow(),
        }
    }

    /// Render one entry in the configured format
    fn render(&self, entry: &LogEntry) -> String {
        match self.output_format {
            OutputFormat::Text if entry.level <= VerbosityLevel::Minimal => entry.message.clone(),
            OutputFormat::Text => format!("  {}", entry.message),
            OutputFormat::Json => {
                serde_json::to_string(entry).unwrap_or_else(|_| entry.message.clone())
            }
        }
    }

    /// Log a formatted message
    ///
    /// Nothing is formatted when the level is disabled.
    pub fn log(&self, level: VerbosityLevel, category: Option<&str>, args: fmt::Arguments<'_>) {
        if !self.is_enabled(level) {
            return;
        }

        let message = {
            let bump = self.format_bump.borrow();
            let mut scratch = bumpalo::collections::String::new_in(&bump);
            let _ = scratch.write_fmt(args);
            scratch.as_str().to_owned()
        };
        self.format_bump.borrow_mut().reset();

        let entry = LogEntry {
            level,
            message,
            category: category.map(str::to_owned),
        };
        if self.capture {
            self.log_buffer.borrow_mut().push(entry);
        } else {
            println!("{}", self.render(&entry));
        }
    }

    #[inline]
    pub fn normal(&self, message: &str) {
        self.log(VerbosityLevel::Normal, None, format_args!("{message}"));
    }
}

impl Default for CombatLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CombatLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombatLogger")
            .field("verbosity", &self.verbosity)
            .field("output_format", &self.output_format)
            .field("capture", &self.capture)
            .field("log_count", &self.log_buffer.borrow().len())
            .finish()
    }
}
