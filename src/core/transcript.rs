//! The transcript store: an append-only turn sequence with a JSON mirror
//! on disk.
//!
//! Memory is authoritative while the process runs; the mirror is rewritten
//! in full after every mutation. At startup the mirror wins and the
//! in-memory sequence is hydrated from it.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::core::message::Turn;

/// File the transcript is mirrored to when no override is given.
pub const TRANSCRIPT_FILE: &str = "historial_chat.json";

/// Errors from reading or mirroring the transcript.
#[derive(Debug)]
pub enum TranscriptError {
    /// The mirror file exists but could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The mirror file exists but does not hold a valid turn sequence.
    /// Surfaced rather than treated as empty history.
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Writing or replacing the mirror file failed.
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for TranscriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptError::Read { path, source } => {
                write!(f, "failed to read transcript at {}: {source}", path.display())
            }
            TranscriptError::Corrupt { path, source } => {
                write!(
                    f,
                    "transcript at {} is not valid JSON ({source}); refusing to discard it",
                    path.display()
                )
            }
            TranscriptError::Write { path, source } => {
                write!(f, "failed to persist transcript to {}: {source}", path.display())
            }
        }
    }
}

impl StdError for TranscriptError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TranscriptError::Read { source, .. } => Some(source),
            TranscriptError::Corrupt { source, .. } => Some(source),
            TranscriptError::Write { source, .. } => Some(source),
        }
    }
}

/// Owns the in-memory turn sequence and its on-disk mirror.
///
/// Single-writer: one store per transcript file. Concurrent sessions
/// pointed at the same path are unsupported.
pub struct TranscriptStore {
    path: PathBuf,
    turns: Vec<Turn>,
}

impl TranscriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TranscriptStore {
            path: path.into(),
            turns: Vec::new(),
        }
    }

    /// Hydrate the in-memory sequence from the mirror.
    ///
    /// A missing file is an empty transcript. A present-but-unparseable
    /// file is `TranscriptError::Corrupt` and leaves memory untouched.
    pub fn load(&mut self) -> Result<&[Turn], TranscriptError> {
        if !self.path.exists() {
            self.turns = Vec::new();
            return Ok(&self.turns);
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| TranscriptError::Read {
            path: self.path.clone(),
            source,
        })?;
        let turns: Vec<Turn> =
            serde_json::from_str(&contents).map_err(|source| TranscriptError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        debug!(turns = turns.len(), path = %self.path.display(), "hydrated transcript");
        self.turns = turns;
        Ok(&self.turns)
    }

    /// Append one turn and synchronously rewrite the mirror.
    pub fn append(&mut self, turn: Turn) -> Result<(), TranscriptError> {
        self.turns.push(turn);
        self.persist()
    }

    /// Drop all turns and delete the mirror. Deleting a mirror that does
    /// not exist is fine.
    pub fn clear(&mut self) -> Result<(), TranscriptError> {
        self.turns.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(TranscriptError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the mirror with the current sequence.
    ///
    /// Writes to a temp file in the target directory and renames it over
    /// the mirror, so a crash mid-write cannot leave a torn file behind.
    fn persist(&self) -> Result<(), TranscriptError> {
        let write_err = |source: std::io::Error| TranscriptError::Write {
            path: self.path.clone(),
            source,
        };

        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(parent).map_err(write_err)?;

        serde_json::to_writer(&mut temp_file, &self.turns)
            .map_err(|source| write_err(source.into()))?;
        temp_file.flush().map_err(write_err)?;
        temp_file.as_file().sync_all().map_err(write_err)?;

        temp_file
            .persist(&self.path)
            .map_err(|source| write_err(source.error))?;

        debug!(turns = self.turns.len(), path = %self.path.display(), "rewrote transcript mirror");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> TranscriptStore {
        TranscriptStore::new(dir.join(TRANSCRIPT_FILE))
    }

    #[test]
    fn missing_mirror_loads_as_empty() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn load_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.append(Turn::user("Hola")).unwrap();
        store.append(Turn::assistant("¡Hola!")).unwrap();

        let first = store.load().unwrap().to_vec();
        let second = store.load().unwrap().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn appends_survive_a_reload_in_order() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        for i in 0..5 {
            store.append(Turn::user(format!("mensaje {i}"))).unwrap();
        }

        let mut reloaded = store_in(dir.path());
        let turns = reloaded.load().unwrap();
        assert_eq!(turns.len(), 5);
        for (i, turn) in turns.iter().enumerate() {
            assert_eq!(turn.content, format!("mensaje {i}"));
        }
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let turn = Turn::assistant("¡Hola! ¿Cómo estás?");
        store.append(turn.clone()).unwrap();

        let mut reloaded = store_in(dir.path());
        assert_eq!(reloaded.load().unwrap(), &[turn]);
    }

    #[test]
    fn clear_empties_memory_and_removes_the_mirror() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.append(Turn::user("Hola")).unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(store.turns().is_empty());
        assert!(!store.path().exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn clearing_without_a_mirror_is_not_an_error() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_mirror_is_surfaced_not_discarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(TRANSCRIPT_FILE);
        fs::write(&path, "{not json").unwrap();

        let mut store = TranscriptStore::new(&path);
        match store.load() {
            Err(TranscriptError::Corrupt { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected corrupt-transcript error, got {other:?}"),
        }
        // The bad file is left in place for the operator.
        assert!(path.exists());
    }
}
