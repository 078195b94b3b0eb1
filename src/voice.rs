//! Utterance sources for the command loop.
//!
//! Speech capture lives outside this crate; anything that can hand over transcribed text
//! implements [`TranscriptSource`]. The terminal source reads typed lines.

use anyhow::Result;
use log::error;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::collections::VecDeque;

/// Result of one capture attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heard {
    Utterance(String),
    /// Capture failed or timed out; the loop should ask again.
    Nothing,
    /// The source is finished.
    Closed,
}

pub trait TranscriptSource {
    fn listen(&mut self) -> Heard;
}

pub struct TerminalSource {
    editor: DefaultEditor,
    prompt: String,
}

impl TerminalSource {
    pub fn new(prompt: impl Into<String>) -> Result<Self> {
        Ok(Self { editor: DefaultEditor::new()?, prompt: prompt.into() })
    }
}

impl TranscriptSource for TerminalSource {
    fn listen(&mut self) -> Heard {
        let heard = read_outcome(self.editor.readline(&self.prompt));
        if let Heard::Utterance(line) = &heard {
            let _ = self.editor.add_history_entry(line.as_str());
        }
        heard
    }
}

/// Map a readline result onto the loop's vocabulary. Read errors end the session.
fn read_outcome(result: Result<String, ReadlineError>) -> Heard {
    match result {
        Ok(line) if line.trim().is_empty() => Heard::Nothing,
        Ok(line) => Heard::Utterance(line.trim().to_string()),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Heard::Closed,
        Err(err) => {
            error!("Error reading input: {:?}", err);
            Heard::Closed
        }
    }
}

/// Fixed list of capture results, replayed in order. Used for scripted runs and tests.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    queue: VecDeque<Heard>,
}

impl ScriptedSource {
    pub fn new(items: impl IntoIterator<Item = Heard>) -> Self {
        Self { queue: items.into_iter().collect() }
    }
}

impl TranscriptSource for ScriptedSource {
    fn listen(&mut self) -> Heard {
        self.queue.pop_front().unwrap_or(Heard::Closed)
    }
}
