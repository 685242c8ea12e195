//! Streaming CSV decoder
//!
//! The file is read on a blocking thread and handed to the async job one row
//! at a time through a bounded channel. Each `open` starts a fresh pass over
//! the file.

use std::path::Path;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::IngestError;
use crate::types::{CsvUplinkRecord, DecodedRow};

const CHANNEL_CAPACITY: usize = 256;

type DecodeItem = Result<DecodedRow, IngestError>;

pub struct RecordDecoder {
    rx: mpsc::Receiver<DecodeItem>,
    reader: Option<JoinHandle<()>>,
    last_line: u64,
}

impl RecordDecoder {
    /// Open `path` and start decoding. Missing or unreadable files are fatal.
    pub async fn open(path: &Path, delimiter: u8) -> Result<Self, IngestError> {
        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file.into_std().await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IngestError::SourceMissing(path.to_path_buf()));
            }
            Err(source) => {
                return Err(IngestError::SourceUnreadable {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let reader = tokio::task::spawn_blocking(move || read_records(file, delimiter, tx));

        Ok(Self {
            rx,
            reader: Some(reader),
            last_line: 0,
        })
    }

    /// Next decoded row, a fatal read error, or `None` at end of file.
    pub async fn next(&mut self) -> Option<DecodeItem> {
        if let Some(item) = self.rx.recv().await {
            if let Ok(row) = &item {
                self.last_line = row.line;
            }
            return Some(item);
        }

        // Channel closed: make sure the reader finished instead of panicking.
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                return Some(Err(IngestError::StreamRead {
                    line: self.last_line + 1,
                    message: format!("reader task failed: {}", e),
                }));
            }
        }
        None
    }
}

fn stream_error(line: u64, err: csv::Error) -> IngestError {
    IngestError::StreamRead {
        line,
        message: err.to_string(),
    }
}

fn read_records(file: std::fs::File, delimiter: u8, tx: mpsc::Sender<DecodeItem>) {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            let _ = tx.blocking_send(Err(stream_error(1, e)));
            return;
        }
    };
    debug!("CSV header has {} columns", headers.len());

    let mut record = csv::StringRecord::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                let item = record
                    .deserialize::<CsvUplinkRecord>(Some(&headers))
                    .map(|record| DecodedRow { line, record })
                    .map_err(|e| stream_error(line, e));
                let failed = item.is_err();

                // A closed channel means the job stopped listening.
                if tx.blocking_send(item).is_err() || failed {
                    return;
                }
            }
            Ok(false) => return,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                let _ = tx.blocking_send(Err(stream_error(line, e)));
                return;
            }
        }
    }
}
