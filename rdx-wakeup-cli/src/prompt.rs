//! Terminal prompts backed by rustyline.

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::time::Duration;
use wakeup::alarm::ShutoffPrompt;
use wakeup::error::{Result, WakeError};
use wakeup::passphrase::Passphrase;

/// Appended to the displayed passphrase so copying the whole line pastes
/// something that no longer matches.
const ANTI_COPY_MARKER: &str = "  \u{200b}";

/// Closed input comes back instantly; pace the re-prompts.
const CLOSED_INPUT_BACKOFF: Duration = Duration::from_secs(1);

/// Colors the typed text green while it still matches the passphrase and red
/// from the first wrong character on.
#[derive(Completer, Helper, Hinter, Validator, Default)]
struct PhraseHighlighter {
    target: String,
}

impl Highlighter for PhraseHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut split = line
            .bytes()
            .zip(self.target.bytes())
            .take_while(|(typed, wanted)| typed == wanted)
            .count();
        while !line.is_char_boundary(split) {
            split -= 1;
        }
        let (good, bad) = line.split_at(split);
        Cow::Owned(format!("{}{}", good.green(), bad.red()))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

/// Reads shutoff attempts from the terminal.
///
/// Attempts are never added to the line history, so the up arrow cannot
/// bring back a previous (almost correct) attempt. Ctrl+C and Ctrl+D count
/// as an empty attempt: the only way out is the passphrase.
pub struct TerminalPrompt {
    editor: Editor<PhraseHighlighter, DefaultHistory>,
}

impl TerminalPrompt {
    pub fn new() -> anyhow::Result<Self> {
        let mut editor = Editor::new()?;
        editor.set_helper(Some(PhraseHighlighter::default()));
        Ok(Self { editor })
    }
}

impl ShutoffPrompt for TerminalPrompt {
    fn ask(&mut self, instructions: &str, passphrase: &Passphrase) -> Result<Option<String>> {
        if let Some(helper) = self.editor.helper_mut() {
            helper.target = passphrase.as_str().to_string();
        }
        println!("{}", instructions.bold());
        println!("{}{}", passphrase.as_str().cyan().bold(), ANTI_COPY_MARKER);
        let read = self.editor.readline("  ");
        if matches!(read, Err(ReadlineError::Eof)) {
            std::thread::sleep(CLOSED_INPUT_BACKOFF);
        }
        attempt(read)
    }

    fn reject(&mut self, message: &str) {
        println!("{}", message.red());
    }
}

/// Maps a readline result to a shutoff attempt. Ctrl+C and Ctrl+D are an
/// empty (wrong) attempt, never a way out of the challenge.
fn attempt(read: std::result::Result<String, ReadlineError>) -> Result<Option<String>> {
    match read {
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(Some(String::new())),
        Err(e) => Err(WakeError::Interrupted(e.to_string())),
    }
}

/// Asks for a wake time when none was given on the command line.
pub fn ask_wake_time() -> anyhow::Result<String> {
    let mut editor = DefaultEditor::new()?;
    let line = editor.readline(&format!("{}", "Enter wakeup time in the format: HH:MM ".cyan()))?;
    Ok(line.trim().to_string())
}
