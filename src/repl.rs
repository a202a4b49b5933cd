//! Line editor for the interactive driver.
//!
//! Wraps rustyline with history persisted to the user's home directory.

use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RustylineResult};

const HISTORY_FILE: &str = ".lisp86_history";

/// What one prompt round produced.
pub enum Input {
    Line(String),
    /// EOF or interrupt; the driver should exit.
    End,
}

pub struct Repl {
    editor: DefaultEditor,
}

impl Repl {
    pub fn new() -> RustylineResult<Repl> {
        let mut editor = DefaultEditor::new()?;
        let _ = editor.load_history(&Self::history_path());
        Ok(Repl { editor })
    }

    fn history_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{}/{}", home, HISTORY_FILE),
            Err(_) => HISTORY_FILE.to_string(),
        }
    }

    /// Read one line, recording non-empty lines in the history.
    pub fn read_line(&mut self, prompt: &str) -> RustylineResult<Input> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(&line);
                }
                Ok(Input::Line(line))
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => Ok(Input::End),
            Err(err) => Err(err),
        }
    }

    /// Persist history; called once on exit.
    pub fn finalize(&mut self) {
        let _ = self.editor.save_history(&Self::history_path());
    }
}
