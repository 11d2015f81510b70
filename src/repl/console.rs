use std::io::{self, BufRead, IsTerminal, Write};

use dialoguer::Input;
use serde_json::Value;

use crate::ui::prelude::*;

/// Where the session reads answers and writes messages.
pub trait Console {
    /// Ask for one line of input. `None` means the input is exhausted.
    fn read_line(&mut self, label: &str) -> io::Result<Option<String>>;

    fn emit(&mut self, level: Level, code: &str, message: &str, data: Option<Value>);

    fn menu(&mut self, title: &str, entries: &[String]) {
        self.emit(Level::Info, "menu.title", title, None);
        for entry in entries {
            self.emit(Level::Info, "menu.entry", entry, None);
        }
    }
}

/// Console on the process's stdin/stdout.
///
/// Uses dialoguer prompts on a terminal and plain line reads when stdin is a
/// pipe, so sessions can be scripted.
pub struct TerminalConsole {
    interactive: bool,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            interactive: io::stdin().is_terminal(),
        }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TerminalConsole {
    fn read_line(&mut self, label: &str) -> io::Result<Option<String>> {
        if self.interactive {
            let value = Input::<String>::new()
                .with_prompt(label)
                .allow_empty(true)
                .interact_text()
                .map_err(io::Error::other)?;
            return Ok(Some(value));
        }

        // Prompts are noise between JSON events
        if get_output_format() == OutputFormat::Text {
            let mut out = io::stdout();
            write!(out, "{}: ", label)?;
            out.flush()?;
        }

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn emit(&mut self, level: Level, code: &str, message: &str, data: Option<Value>) {
        emit(level, code, message, data);
    }

    fn menu(&mut self, title: &str, entries: &[String]) {
        separator();
        emit(Level::Info, "menu.title", title, None);
        for entry in entries {
            emit(Level::Info, "menu.entry", entry, None);
        }
    }
}
