//! File-backed single-slot signal channel.
//!
//! One producer (the decision loop) overwrites a plain-text token file;
//! one consumer (the indicator) reads it and clears it. There is no
//! locking and no atomic rename: a reader polling mid-write can observe
//! a torn or stale token. That weak consistency is inherited from the
//! reference system and accepted for a two-color indicator — last write
//! wins, intermediate values may be missed.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::signal::Signal;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("signal file I/O: {0}")]
    Io(#[from] io::Error),
    #[error("unrecognized signal token {0:?}")]
    UnknownToken(String),
}

/// Handle to the shared signal file.
#[derive(Debug, Clone)]
pub struct SignalFile {
    path: PathBuf,
}

impl SignalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the slot with the given signal's token.
    pub fn set(&self, signal: Signal) -> Result<(), ChannelError> {
        std::fs::write(&self.path, signal.token())?;
        Ok(())
    }

    /// Read the current signal and reset the slot to idle.
    ///
    /// A missing file reads as [`Signal::Idle`] without creating it.
    /// Non-empty content is always cleared, even when the token is
    /// unrecognized — the error carries the offending content.
    pub fn consume(&self) -> Result<Signal, ChannelError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Signal::Idle),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Signal::Idle);
        }

        std::fs::write(&self.path, "")?;

        Signal::from_token(&content)
            .ok_or_else(|| ChannelError::UnknownToken(content.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (tempfile::TempDir, SignalFile) {
        let dir = tempfile::tempdir().expect("tempdir");
        let ch = SignalFile::new(dir.path().join("comando.txt"));
        (dir, ch)
    }

    #[test]
    fn test_consume_missing_file_is_idle() {
        let (_dir, ch) = channel();
        assert_eq!(ch.consume().unwrap(), Signal::Idle);
        // Reading must not create the file.
        assert!(!ch.path().exists());
    }

    #[test]
    fn test_set_then_consume_exactly_once() {
        let (_dir, ch) = channel();
        ch.set(Signal::Authorized).unwrap();
        assert_eq!(ch.consume().unwrap(), Signal::Authorized);
        // Slot is reset until the next set.
        assert_eq!(ch.consume().unwrap(), Signal::Idle);
        assert_eq!(ch.consume().unwrap(), Signal::Idle);
    }

    #[test]
    fn test_last_write_wins() {
        let (_dir, ch) = channel();
        ch.set(Signal::Authorized).unwrap();
        ch.set(Signal::Denied).unwrap();
        assert_eq!(ch.consume().unwrap(), Signal::Denied);
    }

    #[test]
    fn test_set_idle_reads_as_idle() {
        let (_dir, ch) = channel();
        ch.set(Signal::Denied).unwrap();
        ch.set(Signal::Idle).unwrap();
        assert_eq!(ch.consume().unwrap(), Signal::Idle);
    }

    #[test]
    fn test_unknown_token_is_error_and_cleared() {
        let (_dir, ch) = channel();
        std::fs::write(ch.path(), "amarelo").unwrap();
        match ch.consume() {
            Err(ChannelError::UnknownToken(t)) => assert_eq!(t, "amarelo"),
            other => panic!("expected UnknownToken, got {other:?}"),
        }
        // The garbage must not be re-read forever.
        assert_eq!(ch.consume().unwrap(), Signal::Idle);
    }

    #[test]
    fn test_trailing_newline_tolerated() {
        let (_dir, ch) = channel();
        std::fs::write(ch.path(), "verde\n").unwrap();
        assert_eq!(ch.consume().unwrap(), Signal::Authorized);
    }
}
