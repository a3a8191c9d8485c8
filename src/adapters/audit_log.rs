use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use eyre::{Context, Result};
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::{mpsc, oneshot},
};

use crate::ports::audit::{AuditSink, ErrorRecord, LogRecord};

/// Message consumed by a file writer task.
enum WriterMessage {
    Append(String),
    Flush(oneshot::Sender<()>),
}

/// Append-only audit trail backed by two per-day text files.
///
/// File names carry the day of process start (`{YYYYMMDD}_logs.txt` for
/// successes, `{YYYYMMDD}_error.txt` for failures) and are fixed once at
/// construction. This is a policy choice: a process running across midnight
/// keeps writing to its start-day files, and a restart rolls over to the new
/// day.
///
/// Each file is owned by a single writer task fed over an unbounded channel,
/// so records arriving from concurrent requests are appended whole and never
/// interleave. The writer opens, appends, and closes per record; a crash
/// mid-write loses at most that one record. Persistence failures are logged
/// and dropped, never surfaced to the request path.
pub struct AuditFileLogger {
    success_tx: mpsc::UnboundedSender<WriterMessage>,
    error_tx: mpsc::UnboundedSender<WriterMessage>,
    success_path: PathBuf,
    error_path: PathBuf,
}

impl AuditFileLogger {
    /// Create the log directory if needed and start the two writer tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let stamp = Local::now().format("%Y%m%d").to_string();
        let success_path = dir.join(format!("{stamp}_logs.txt"));
        let error_path = dir.join(format!("{stamp}_error.txt"));

        Ok(Self {
            success_tx: spawn_writer(success_path.clone()),
            error_tx: spawn_writer(error_path.clone()),
            success_path,
            error_path,
        })
    }

    /// Path of the success log file.
    pub fn success_path(&self) -> &Path {
        &self.success_path
    }

    /// Path of the error log file.
    pub fn error_path(&self) -> &Path {
        &self.error_path
    }

    /// Wait until both writers have drained everything queued so far.
    ///
    /// Used on shutdown and by tests. Records enqueued after this call starts
    /// are not covered by it.
    pub async fn flush(&self) {
        for tx in [&self.success_tx, &self.error_tx] {
            let (ack_tx, ack_rx) = oneshot::channel();
            if tx.send(WriterMessage::Flush(ack_tx)).is_ok() {
                let _ = ack_rx.await;
            }
        }
    }

    fn enqueue(tx: &mpsc::UnboundedSender<WriterMessage>, block: String, sink: &'static str) {
        if tx.send(WriterMessage::Append(block)).is_err() {
            tracing::warn!(sink, "Audit writer task is gone; dropping record");
        }
    }
}

impl AuditSink for AuditFileLogger {
    fn record_success(&self, record: LogRecord) {
        match serde_json::to_string_pretty(&record) {
            Ok(json) => Self::enqueue(&self.success_tx, format!("{json}\n\n"), "success"),
            Err(e) => tracing::warn!("Failed to serialize success record: {e}"),
        }
    }

    fn record_error(&self, record: ErrorRecord) {
        match serde_json::to_string_pretty(&record) {
            Ok(json) => {
                let stamp = format_timestamp(&record.timestamp);
                Self::enqueue(&self.error_tx, format!("{stamp}:\n{json}\n\n"), "error");
            }
            Err(e) => tracing::warn!("Failed to serialize error record: {e}"),
        }
    }
}

/// Render the error-record timestamp as it appears in the file, microsecond
/// precision.
fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn spawn_writer(path: PathBuf) -> mpsc::UnboundedSender<WriterMessage> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match message {
                WriterMessage::Append(block) => {
                    if let Err(e) = append_block(&path, &block).await {
                        tracing::warn!(
                            file = %path.display(),
                            "Failed to append audit record: {e}"
                        );
                    }
                }
                WriterMessage::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
    });

    tx
}

/// Open, append one whole block, close.
async fn append_block(path: &Path, block: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(block.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use indexmap::IndexMap;

    use super::*;

    fn sample_success(path: &str) -> LogRecord {
        LogRecord {
            path: path.to_string(),
            method: "GET".to_string(),
            headers: IndexMap::new(),
            body: None,
            response_status: 200,
            response_headers: IndexMap::new(),
            response_body: "ok".to_string(),
            duration: 0.01,
        }
    }

    fn sample_error() -> ErrorRecord {
        ErrorRecord {
            timestamp: Local::now(),
            error_message: "Upstream unreachable: connection refused".to_string(),
            target_url: "http://localhost:1234/x".to_string(),
            method: "GET".to_string(),
            headers: IndexMap::new(),
            body: None,
        }
    }

    fn parse_blocks(contents: &str) -> Vec<serde_json::Value> {
        contents
            .split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .map(|block| {
                serde_json::from_str(block)
                    .unwrap_or_else(|e| panic!("unparseable block: {e}\n{block}"))
            })
            .collect()
    }

    #[tokio::test]
    async fn files_are_named_for_the_process_start_day() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditFileLogger::new(dir.path()).unwrap();

        let stamp = Local::now().format("%Y%m%d").to_string();
        assert_eq!(
            logger.success_path().file_name().unwrap().to_str().unwrap(),
            format!("{stamp}_logs.txt")
        );
        assert_eq!(
            logger.error_path().file_name().unwrap().to_str().unwrap(),
            format!("{stamp}_error.txt")
        );
    }

    #[tokio::test]
    async fn missing_log_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let logger = AuditFileLogger::new(&nested).unwrap();

        logger.record_success(sample_success("x"));
        logger.flush().await;

        assert!(logger.success_path().exists());
    }

    #[tokio::test]
    async fn success_records_append_as_pretty_json_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditFileLogger::new(dir.path()).unwrap();

        logger.record_success(sample_success("first"));
        logger.record_success(sample_success("second"));
        logger.flush().await;

        let contents = tokio::fs::read_to_string(logger.success_path())
            .await
            .unwrap();
        // Pretty-printed, so fields sit on their own lines.
        assert!(contents.contains("  \"path\": \"first\""));

        let blocks = parse_blocks(&contents);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["path"], "first");
        assert_eq!(blocks[1]["path"], "second");
    }

    #[tokio::test]
    async fn error_records_carry_a_timestamp_prefix_line() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditFileLogger::new(dir.path()).unwrap();

        logger.record_error(sample_error());
        logger.flush().await;

        let contents = tokio::fs::read_to_string(logger.error_path()).await.unwrap();
        let (first_line, rest) = contents.split_once('\n').unwrap();
        assert!(first_line.ends_with(':'));
        // Prefix line looks like "2024-06-01 12:34:56.789012:".
        assert!(first_line.len() > 20);

        let record: serde_json::Value = serde_json::from_str(rest.trim()).unwrap();
        assert_eq!(record["method"], "GET");
        assert!(record["error_message"].as_str().unwrap().contains("unreachable"));
        assert!(record.get("timestamp").is_none());
    }

    #[tokio::test]
    async fn success_and_error_sinks_are_independent_files() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditFileLogger::new(dir.path()).unwrap();

        logger.record_success(sample_success("ok"));
        logger.record_error(sample_error());
        logger.flush().await;

        let successes = tokio::fs::read_to_string(logger.success_path())
            .await
            .unwrap();
        let errors = tokio::fs::read_to_string(logger.error_path()).await.unwrap();
        assert!(successes.contains("\"ok\""));
        assert!(!successes.contains("error_message"));
        assert!(errors.contains("error_message"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_records_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(AuditFileLogger::new(dir.path()).unwrap());

        let mut handles = Vec::new();
        for i in 0..100 {
            let logger = logger.clone();
            handles.push(tokio::spawn(async move {
                logger.record_success(sample_success(&format!("req-{i}")));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        logger.flush().await;

        let contents = tokio::fs::read_to_string(logger.success_path())
            .await
            .unwrap();
        let blocks = parse_blocks(&contents);
        assert_eq!(blocks.len(), 100);
    }
}
