// ABOUTME: File-backed FIFO queue of pending outbound messages, one `destination|text` line each
// ABOUTME: Head removal rewrites the file via a temp file + rename, re-reading immediately before the rename so a concurrent append is carried forward rather than clobbered

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A single queued outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub destination: String,
    pub text: String,
}

/// The on-disk outbound queue.
///
/// Messages are appended one per line as `destination|text` and always
/// consumed from the head. A missing queue file is not an error: it reads
/// as empty, matching a gateway that has never been sent anything.
pub struct FileQueue {
    path: PathBuf,
}

impl FileQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileQueue { path: path.into() }
    }

    /// Appends a message to the end of the queue.
    pub fn push(&self, destination: &str, text: &str) -> Result<(), QueueError> {
        let line = format!("{destination}|{text}\n");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(QueueError::Io)?;
        file.write_all(line.as_bytes()).map_err(QueueError::Io)?;
        Ok(())
    }

    /// Returns the number of lines currently queued, including malformed
    /// ones awaiting discard.
    pub fn len(&self) -> Result<usize, QueueError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents.lines().filter(|l| !l.is_empty()).count()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(QueueError::Io(e)),
        }
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }

    /// Returns the head message without removing it, or `None` if the queue
    /// is empty. A malformed head line (no `|` separator) is reported as
    /// [`QueueError::MalformedLine`] so the caller can discard it via
    /// [`pop_head`](FileQueue::pop_head) without attempting to send it.
    pub fn peek_head(&self) -> Result<Option<QueuedMessage>, QueueError> {
        let lines = self.read_lines()?;
        match lines.first() {
            None => Ok(None),
            Some(line) => parse_line(line).map(Some),
        }
    }

    /// Removes the head line (valid or not) by rewriting the remainder to a
    /// temp file in the same directory and renaming it over the original.
    /// The rename is atomic on the same filesystem, so a crash between the
    /// write and the rename leaves the original file untouched rather than
    /// truncated.
    ///
    /// Producers only ever append, and the dispatcher is the sole remover, so
    /// a re-read taken immediately before the rename is guaranteed to start
    /// with exactly the lines already rewritten; any lines beyond that are
    /// appends that landed during the rewrite, carried forward into the new
    /// file instead of being clobbered by it.
    pub fn pop_head(&self) -> Result<(), QueueError> {
        let snapshot = self.read_lines()?;
        if snapshot.is_empty() {
            return Ok(());
        }
        self.rewrite_removing_head(&snapshot)
    }

    fn read_lines(&self) -> Result<Vec<String>, QueueError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents
                .lines()
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(QueueError::Io(e)),
        }
    }

    fn rewrite_removing_head(&self, snapshot: &[String]) -> Result<(), QueueError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(QueueError::Io)?;
        for line in &snapshot[1..] {
            writeln!(tmp, "{line}").map_err(QueueError::Io)?;
        }

        let latest = self.read_lines()?;
        if latest.len() > snapshot.len() {
            for line in &latest[snapshot.len()..] {
                writeln!(tmp, "{line}").map_err(QueueError::Io)?;
            }
        }

        tmp.flush().map_err(QueueError::Io)?;
        tmp.persist(&self.path)
            .map_err(|e| QueueError::Io(e.error))?;
        Ok(())
    }
}

fn parse_line(line: &str) -> Result<QueuedMessage, QueueError> {
    match line.split_once('|') {
        Some((destination, text)) => Ok(QueuedMessage {
            destination: destination.to_string(),
            text: text.to_string(),
        }),
        None => Err(QueueError::MalformedLine(line.to_string())),
    }
}

/// Errors reading or rewriting the queue file.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("malformed queue line, missing '|' separator: {0:?}")]
    MalformedLine(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let queue = FileQueue::new(dir.path().join("queue.txt"));
        assert_eq!(queue.len().unwrap(), 0);
        assert!(queue.peek_head().unwrap().is_none());
    }

    #[test]
    fn push_then_peek_returns_fifo_head() {
        let dir = tempdir().unwrap();
        let queue = FileQueue::new(dir.path().join("queue.txt"));
        queue.push("15551234567", "hello").unwrap();
        queue.push("15557654321", "world").unwrap();

        let head = queue.peek_head().unwrap().unwrap();
        assert_eq!(head.destination, "15551234567");
        assert_eq!(head.text, "hello");
        assert_eq!(queue.len().unwrap(), 2);
    }

    #[test]
    fn pop_head_removes_only_the_first_line() {
        let dir = tempdir().unwrap();
        let queue = FileQueue::new(dir.path().join("queue.txt"));
        queue.push("1", "a").unwrap();
        queue.push("2", "b").unwrap();

        queue.pop_head().unwrap();

        let head = queue.peek_head().unwrap().unwrap();
        assert_eq!(head.destination, "2");
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn malformed_line_is_reported_and_discardable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.txt");
        fs::write(&path, "no-separator-here\n").unwrap();
        let queue = FileQueue::new(&path);

        assert!(matches!(
            queue.peek_head(),
            Err(QueueError::MalformedLine(_))
        ));

        queue.pop_head().unwrap();
        assert_eq!(queue.len().unwrap(), 0);
    }

    #[test]
    fn append_landing_during_head_removal_is_carried_forward_not_lost() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.txt");
        let queue = FileQueue::new(&path);
        queue.push("1", "a").unwrap();
        queue.push("2", "b").unwrap();

        // Simulate a producer's append landing after pop_head's first read
        // but before its rename, by taking the same snapshot pop_head would
        // and then appending before calling the rewrite directly.
        let snapshot = queue.read_lines().unwrap();
        queue.push("3", "c").unwrap();
        queue.rewrite_removing_head(&snapshot).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "2|b\n3|c\n");
    }

    #[test]
    fn text_may_contain_pipe_characters() {
        let dir = tempdir().unwrap();
        let queue = FileQueue::new(dir.path().join("queue.txt"));
        queue.push("1", "a|b|c").unwrap();

        let head = queue.peek_head().unwrap().unwrap();
        assert_eq!(head.text, "a|b|c");
    }
}
