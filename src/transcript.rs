use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{Result, TerpError};

/// One utterance result from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub original: String,
    pub translated: String,
    pub received_at: DateTime<Utc>,
}

/// In-memory transcript of the current run, in insertion order.
///
/// Cleared at session start, never while Listening or Processing.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, original: String, translated: String) {
        self.entries.push(TranscriptEntry {
            original,
            translated,
            received_at: Utc::now(),
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the export format. The header and per-entry layout are fixed;
    /// downstream tooling parses this shape.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("Live Translation Transcript\n============================\n\n");
        for entry in &self.entries {
            let _ = writeln!(out, "Original: {}", entry.original);
            let _ = writeln!(out, "Translated: {}", entry.translated);
            out.push('\n');
        }
        out
    }

    /// Write the rendered transcript to `path`, creating parent directories.
    pub fn export(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TerpError::Output(format!(
                    "failed to create output directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        fs::write(path, self.render())
            .map_err(|e| TerpError::Output(format!("failed to write {}: {e}", path.display())))?;

        tracing::info!("exported {} transcript entries to {}", self.len(), path.display());
        Ok(())
    }
}
