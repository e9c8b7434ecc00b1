//! Prompt input backed by `rustyline`, with a persistent history file.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::commands::is_command;
use crate::core::config::{path_display, project_dirs};
use crate::ui::chat_loop::{Input, LineSource};

pub const HISTORY_FILE_NAME: &str = "history.txt";
const CONTINUATION_PROMPT: &str = "... ";

pub fn default_history_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(HISTORY_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(".azc-history.txt"))
}

pub struct LineEditor {
    editor: DefaultEditor,
    history: Option<PathBuf>,
    multiline: bool,
}

impl LineEditor {
    /// Opens an editor seeded from `history`. A missing history file is
    /// created on the first remembered line.
    pub fn open(history: Option<PathBuf>, multiline: bool) -> io::Result<Self> {
        let mut editor = DefaultEditor::new().map_err(readline_to_io)?;
        if let Some(path) = &history {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(err) = fs::create_dir_all(parent) {
                    warn!(path = %path_display(parent), error = %err, "cannot create history directory");
                }
            }
            match editor.load_history(path) {
                Ok(()) => debug!(path = %path_display(path), "history loaded"),
                Err(ReadlineError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(path = %path_display(path), error = %err, "ignoring unreadable history"),
            }
        }
        Ok(Self {
            editor,
            history,
            multiline,
        })
    }

    fn read_single(&mut self, prompt: &str) -> io::Result<Input> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Input::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
            Err(ReadlineError::Eof) => Ok(Input::Eof),
            Err(err) => Err(readline_to_io(err)),
        }
    }

    fn read_multiline(&mut self, prompt: &str) -> io::Result<Input> {
        let mut buffer = MultilineBuffer::default();
        let mut current = prompt;
        loop {
            match self.editor.readline(current) {
                Ok(line) => {
                    if let Some(text) = buffer.push(&line) {
                        return Ok(Input::Line(text));
                    }
                    current = CONTINUATION_PROMPT;
                }
                Err(ReadlineError::Interrupted) => return Ok(Input::Interrupted),
                Err(ReadlineError::Eof) => {
                    return Ok(match buffer.take() {
                        Some(text) => Input::Line(text),
                        None => Input::Eof,
                    })
                }
                Err(err) => return Err(readline_to_io(err)),
            }
        }
    }
}

impl LineSource for LineEditor {
    fn read_line(&mut self, prompt: &str) -> io::Result<Input> {
        if self.multiline {
            self.read_multiline(prompt)
        } else {
            self.read_single(prompt)
        }
    }

    fn read_answer(&mut self, prompt: &str) -> io::Result<Input> {
        self.read_single(prompt)
    }

    fn remember(&mut self, line: &str) {
        if let Err(err) = self.editor.add_history_entry(line) {
            warn!(error = %err, "cannot add history entry");
            return;
        }
        if let Some(path) = &self.history {
            if let Err(err) = self.editor.append_history(path) {
                warn!(path = %path_display(path), error = %err, "cannot write history");
            }
        }
    }
}

/// Collects lines until a blank line follows some text. A command word on
/// the first line is submitted at once.
#[derive(Debug, Default)]
struct MultilineBuffer {
    lines: Vec<String>,
}

impl MultilineBuffer {
    fn push(&mut self, line: &str) -> Option<String> {
        if self.lines.is_empty() {
            if line.trim().is_empty() || is_command(line) {
                return Some(line.to_string());
            }
        } else if line.trim().is_empty() {
            return self.take();
        }
        self.lines.push(line.to_string());
        None
    }

    fn take(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.lines).join("\n"))
    }
}

fn readline_to_io(err: ReadlineError) -> io::Error {
    match err {
        ReadlineError::Io(err) => err,
        other => io::Error::other(other.to_string()),
    }
}
