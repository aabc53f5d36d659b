//! Append-only request log.
//!
//! Every prompt/response exchange is recorded in a single shared file in
//! the same three-line plain-text format the service has always written.
//! All writes funnel through one writer task that owns the file handle, so
//! concurrent handlers never interleave entries and nothing depends on the
//! platform's append-mode atomicity. An append is acknowledged only after
//! the entry has been written and flushed.

use std::path::Path;

use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Entry separator line, kept byte-for-byte compatible with existing logs.
const SEPARATOR: &str = "---------------------";

/// Entries that may queue on the writer before senders are made to wait.
const ENTRY_QUEUE_DEPTH: usize = 64;

/// Errors from the request log.
#[derive(Error, Debug)]
pub enum RequestLogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log writer is gone")]
    WriterGone,
}

struct LogEntry {
    prompt: String,
    response: String,
    ack: oneshot::Sender<Result<(), std::io::Error>>,
}

/// Handle to the request log writer task. Cheap to clone; all clones feed
/// the same serialized writer.
#[derive(Clone)]
pub struct RequestLog {
    entry_tx: mpsc::Sender<LogEntry>,
}

impl RequestLog {
    /// Open the log file in append mode (creating it if missing) and spawn
    /// the writer task that owns it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RequestLogError> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path.as_ref())
            .await?;

        let (entry_tx, mut entry_rx) = mpsc::channel::<LogEntry>(ENTRY_QUEUE_DEPTH);

        tokio::spawn(async move {
            while let Some(entry) = entry_rx.recv().await {
                let result = write_entry(&mut file, &entry.prompt, &entry.response).await;
                let _ = entry.ack.send(result);
            }
            debug!("Request log writer exiting");
        });

        Ok(Self { entry_tx })
    }

    /// Append one exchange. Returns once the entry is on disk.
    pub async fn append(&self, prompt: &str, response: &str) -> Result<(), RequestLogError> {
        let (ack_tx, ack_rx) = oneshot::channel();

        self.entry_tx
            .send(LogEntry {
                prompt: prompt.to_string(),
                response: response.to_string(),
                ack: ack_tx,
            })
            .await
            .map_err(|_| RequestLogError::WriterGone)?;

        ack_rx.await.map_err(|_| RequestLogError::WriterGone)??;
        Ok(())
    }
}

/// Format one entry. Three lines: prompt, response, separator.
fn format_entry(prompt: &str, response: &str) -> String {
    format!("Prompt: {prompt}\nResponse: {response}\n{SEPARATOR}\n")
}

async fn write_entry(
    file: &mut File,
    prompt: &str,
    response: &str,
) -> Result<(), std::io::Error> {
    file.write_all(format_entry(prompt, response).as_bytes())
        .await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_format() {
        let entry = format_entry("dlaczego niebo jest niebieskie?", "rozpraszanie");
        assert_eq!(
            entry,
            "Prompt: dlaczego niebo jest niebieskie?\nResponse: rozpraszanie\n---------------------\n"
        );
        // The separator line has always been exactly 21 dashes.
        assert_eq!(SEPARATOR.len(), 21);
    }

    #[tokio::test]
    async fn test_append_writes_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.log");

        let log = RequestLog::open(&path).await.unwrap();
        log.append("ping", "pong").await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, format_entry("ping", "pong"));
    }

    #[tokio::test]
    async fn test_appends_are_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.log");

        let log = RequestLog::open(&path).await.unwrap();
        log.append("first", "1").await.unwrap();
        log.append("second", "2").await.unwrap();
        log.append("third", "3").await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let expected = format!(
            "{}{}{}",
            format_entry("first", "1"),
            format_entry("second", "2"),
            format_entry("third", "3")
        );
        assert_eq!(contents, expected);
    }

    #[tokio::test]
    async fn test_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.log");
        std::fs::write(&path, format_entry("old", "entry")).unwrap();

        let log = RequestLog::open(&path).await.unwrap();
        log.append("new", "entry").await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Prompt: old\n"));
        assert!(contents.ends_with(format_entry("new", "entry").as_str()));
    }

    #[tokio::test]
    async fn test_concurrent_appends_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.log");

        let log = RequestLog::open(&path).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.append(&format!("prompt {i}"), &format!("response {i}"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<&str> = contents
            .split("---------------------\n")
            .filter(|chunk| !chunk.is_empty())
            .collect();
        assert_eq!(entries.len(), 16);
        for entry in entries {
            let mut lines = entry.lines();
            assert!(lines.next().unwrap().starts_with("Prompt: prompt "));
            assert!(lines.next().unwrap().starts_with("Response: response "));
            assert_eq!(lines.next(), None);
        }
    }
}
