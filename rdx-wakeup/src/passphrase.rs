//! Shutoff passphrase generation.
//!
//! A passphrase is a random number of words, each drawn uniformly from a word
//! list. The list is streamed once and never held in memory: every word
//! position keeps its own size-one reservoir, and the `i`-th selectable line
//! replaces a position's word with probability `1/i`.
//!
//! Lines are read as bytes. A line that is not valid UTF-8 (a Latin-1
//! dictionary, say) is skipped with a warning instead of failing the scan,
//! so a source that passes `WordSource::validate` before sleep cannot fail
//! to decode at wake time.

use crate::error::{Result, WakeError};
use rand::Rng;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An ordered sequence of words that must be retyped to silence the alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passphrase {
    words: Vec<String>,
    phrase: String,
}

impl Passphrase {
    /// Builds a passphrase from explicit words.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words.into_iter().map(Into::into).collect();
        let phrase = words.join(" ");
        Self { words, phrase }
    }

    /// Draws a passphrase from `source` in a single pass.
    ///
    /// The word count is picked uniformly from `word_count`. Line terminators
    /// are stripped and blank lines are skipped, so no word is ever empty.
    /// Fails with `Configuration` when the range is empty or starts at zero,
    /// or when the source holds no selectable line.
    pub fn sample<R, G>(source: R, word_count: RangeInclusive<usize>, rng: &mut G) -> Result<Self>
    where
        R: BufRead,
        G: Rng + ?Sized,
    {
        if word_count.is_empty() || *word_count.start() == 0 {
            return Err(WakeError::Configuration(format!(
                "invalid passphrase word range {}..={}",
                word_count.start(),
                word_count.end()
            )));
        }
        let n = rng.gen_range(word_count);
        let mut slots: Vec<Option<String>> = vec![None; n];

        let mut seen: u64 = 0;
        for_each_word(source, |word| {
            seen += 1;
            for slot in slots.iter_mut() {
                if rng.gen_range(0..seen) == 0 {
                    *slot = Some(word.to_string());
                }
            }
        })?;

        if seen == 0 {
            return Err(WakeError::Configuration("word source is empty".to_string()));
        }
        debug!(words = n, lines = seen, "sampled passphrase");

        // The first selectable line fills every slot with probability one.
        let words = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| WakeError::Configuration("word source is empty".to_string()))?;
        Ok(Self::from_words(words))
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The words joined by single spaces.
    pub fn as_str(&self) -> &str {
        &self.phrase
    }

    /// Byte-exact, case-sensitive comparison. Surrounding whitespace counts.
    pub fn matches(&self, input: &str) -> bool {
        input == self.phrase
    }

    /// Like `matches`, but reports a mismatch as `WakeError::ShutoffMismatch`.
    pub fn verify(&self, input: &str) -> Result<()> {
        if self.matches(input) {
            Ok(())
        } else {
            Err(WakeError::ShutoffMismatch)
        }
    }
}

/// Calls `f` with every selectable word of `source`: terminators stripped,
/// blank and undecodable lines skipped.
fn for_each_word<R, F>(mut source: R, mut f: F) -> std::io::Result<()>
where
    R: BufRead,
    F: FnMut(&str),
{
    let mut buf = Vec::new();
    let mut line_no: u64 = 0;
    let mut undecodable: u64 = 0;
    loop {
        buf.clear();
        if source.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let Ok(line) = std::str::from_utf8(&buf) else {
            undecodable += 1;
            debug!(line = line_no, "skipping word that is not valid UTF-8");
            continue;
        };
        let word = line.trim_end_matches(['\r', '\n']);
        if !word.is_empty() {
            f(word);
        }
    }
    if undecodable > 0 {
        warn!(lines = undecodable, "word source has lines that are not valid UTF-8");
    }
    Ok(())
}

impl fmt::Display for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.phrase)
    }
}

/// A newline-delimited word list on disk.
///
/// The file is opened for each scan and closed when the scan ends.
#[derive(Debug, Clone)]
pub struct WordSource {
    path: PathBuf,
}

impl WordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole source once and checks that it holds at least one
    /// selectable line. Returns the number of selectable lines.
    pub fn validate(&self) -> Result<u64> {
        let reader = self.open()?;
        let mut selectable: u64 = 0;
        for_each_word(reader, |_| selectable += 1).map_err(|e| self.unavailable(e))?;
        if selectable == 0 {
            return Err(WakeError::Configuration(format!(
                "word source {} is empty",
                self.path.display()
            )));
        }
        debug!(path = %self.path.display(), words = selectable, "word source validated");
        Ok(selectable)
    }

    /// Streams the file once and draws a passphrase from it.
    pub fn generate<G>(&self, word_count: RangeInclusive<usize>, rng: &mut G) -> Result<Passphrase>
    where
        G: Rng + ?Sized,
    {
        let reader = self.open()?;
        Passphrase::sample(reader, word_count, rng).map_err(|e| match e {
            WakeError::Io(source) => self.unavailable(source),
            other => other,
        })
    }

    fn open(&self) -> Result<BufReader<File>> {
        File::open(&self.path)
            .map(BufReader::new)
            .map_err(|e| self.unavailable(e))
    }

    fn unavailable(&self, source: std::io::Error) -> WakeError {
        WakeError::ResourceUnavailable {
            resource: "word source",
            path: self.path.clone(),
            source,
        }
    }
}
