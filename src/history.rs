//! Interactive-shell command history: file persistence and Up/Down navigation.

use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::Path;

const MAX_HISTORY_ENTRIES: usize = 5000;

/// Loads history entries from `path`, capped at the most recent 5000 lines.
/// A missing file yields an empty history, not an error.
pub fn load_history(path: &Path) -> io::Result<Vec<String>> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut entries = Vec::new();
    for line in io::BufReader::new(file).lines() {
        let trimmed = line?.trim().to_string();
        if trimmed.is_empty() {
            continue;
        }
        entries.push(trimmed);
        if entries.len() > MAX_HISTORY_ENTRIES {
            entries.remove(0);
        }
    }
    Ok(entries)
}

/// Appends `line` (trimmed) to the history file, creating it if necessary.
pub fn append_history(path: &Path, line: &str) -> io::Result<()> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{trimmed}")
}

/// In-memory Up/Down navigation state over a loaded history list.
#[derive(Debug)]
pub struct HistoryState {
    entries: Vec<String>,
    index: usize,
    draft: String,
}

impl HistoryState {
    /// Creates navigation state positioned past the end of `entries`.
    pub fn new(entries: Vec<String>) -> Self {
        let index = entries.len();
        Self { entries, index, draft: String::new() }
    }

    /// Moves one entry older; `current` is preserved as the draft to restore
    /// when navigating back down past the newest entry.
    pub fn up(&mut self, current: &str) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        if self.index == self.entries.len() {
            self.draft = current.to_string();
            self.index = self.entries.len() - 1;
            return Some(&self.entries[self.index]);
        }
        if self.index > 0 {
            self.index -= 1;
            return Some(&self.entries[self.index]);
        }
        None
    }

    /// Moves one entry newer, or restores the draft once past the newest entry.
    pub fn down(&mut self) -> Option<&str> {
        if self.entries.is_empty() || self.index == self.entries.len() {
            return None;
        }
        if self.index < self.entries.len() - 1 {
            self.index += 1;
            return Some(&self.entries[self.index]);
        }
        self.index = self.entries.len();
        Some(self.draft.as_str())
    }

    /// Appends a freshly submitted line and resets navigation to the end.
    pub fn push(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        self.entries.push(trimmed.to_string());
        self.index = self.entries.len();
        self.draft.clear();
    }
}
