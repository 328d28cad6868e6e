// message_log.rs — Optional append-only record of wire traffic.
//
// Each round trip the bridge completes (or fails) can be written as one JSON
// line: the raw wire message and the decision it produced. The log is purely
// diagnostic. The client ignores sink failures apart from a warning, so a
// full disk never changes a decision.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::Decision;
use crate::error::MessageLogError;

/// One logged round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub record_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Wire tag of the gated operation.
    pub operation: String,
    /// The encoded message, or `None` if encoding failed.
    pub message: Option<String>,
    pub decision: Decision,
    /// Value of the connection's sent-message counter after this call.
    pub sequence: u64,
    /// Classified failure, when the decision is `Error` for a transport reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageRecord {
    pub fn new(operation: impl Into<String>, decision: Decision, sequence: u64) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operation: operation.into(),
            message: None,
            decision,
            sequence,
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Somewhere the client can send MessageRecords.
pub trait MessageSink: Send {
    fn record(&mut self, record: &MessageRecord) -> Result<(), MessageLogError>;
}

/// JSONL file sink. Opened in append mode; flushed after every record.
pub struct MessageLog {
    writer: BufWriter<File>,
}

impl MessageLog {
    /// Open (or create) a message log at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MessageLogError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| MessageLogError::OpenFailed {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Read every record in a log file, oldest first. Blank lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<MessageRecord>, MessageLogError> {
        let file = File::open(path.as_ref()).map_err(|source| MessageLogError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

impl MessageSink for MessageLog {
    fn record(&mut self, record: &MessageRecord) -> Result<(), MessageLogError> {
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }
}
