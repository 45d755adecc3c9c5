//! Stream-file transport
//!
//! Topics map to append-only files `<dir>/<topic>.stream` holding
//! timestamped records:
//!
//! ```text
//! [8 bytes: timestamp ns, LE][4 bytes: payload length, LE][payload]
//! ```
//!
//! Used for offline recording and replay; a consumer tails the files by
//! byte offset, so a generator and a daemon can run as separate processes
//! against the same directory.

use super::{now_ns, BusMessage, MessageConsumer, MessageProducer};
use crate::error::BusError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, Instant};

const RECORD_HEADER_LEN: usize = 12;
const POLL_WAIT_STEP: Duration = Duration::from_millis(50);

fn topic_path(dir: &Path, topic: &str) -> PathBuf {
    dir.join(format!("{topic}.stream"))
}

/// Parse all complete records in `buf`, returning them with the count of
/// bytes consumed. A trailing partial record is left for the next read.
fn parse_records(buf: &[u8]) -> (Vec<(i64, Vec<u8>)>, usize) {
    let mut records = Vec::new();
    let mut pos = 0;
    while buf.len() - pos >= RECORD_HEADER_LEN {
        let ts = i64::from_le_bytes(buf[pos..pos + 8].try_into().expect("8-byte slice"));
        let len =
            u32::from_le_bytes(buf[pos + 8..pos + 12].try_into().expect("4-byte slice")) as usize;
        if buf.len() - pos - RECORD_HEADER_LEN < len {
            break;
        }
        let payload = buf[pos + RECORD_HEADER_LEN..pos + RECORD_HEADER_LEN + len].to_vec();
        records.push((ts, payload));
        pos += RECORD_HEADER_LEN + len;
    }
    (records, pos)
}

/// Producer appending records to stream files under one directory.
#[derive(Debug, Clone)]
pub struct FileProducer {
    dir: PathBuf,
}

impl FileProducer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl MessageProducer for FileProducer {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        fs::create_dir_all(&self.dir).await?;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(topic_path(&self.dir, topic))
            .await?;
        let mut record = Vec::with_capacity(RECORD_HEADER_LEN + payload.len());
        record.extend_from_slice(&now_ns().to_le_bytes());
        record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        record.extend_from_slice(payload);
        file.write_all(&record).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Consumer tailing stream files by byte offset.
#[derive(Debug)]
pub struct FileConsumer {
    dir: PathBuf,
    /// Byte offset and record index per topic.
    positions: HashMap<String, (u64, i64)>,
}

impl FileConsumer {
    pub fn new(dir: impl Into<PathBuf>, topics: &[String]) -> Self {
        let positions = topics.iter().map(|t| (t.clone(), (0, 0))).collect();
        Self {
            dir: dir.into(),
            positions,
        }
    }

    async fn drain(&mut self) -> Result<Vec<BusMessage>, BusError> {
        let mut batch = Vec::new();
        for (topic, (byte_offset, record_index)) in self.positions.iter_mut() {
            let path = topic_path(&self.dir, topic);
            let buf = match fs::read(&path).await {
                Ok(buf) => buf,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if (*byte_offset as usize) >= buf.len() {
                continue;
            }
            let (records, consumed) = parse_records(&buf[*byte_offset as usize..]);
            for (ts, payload) in records {
                batch.push(BusMessage {
                    payload,
                    timestamp_ns: ts,
                    partition: 0,
                    offset: *record_index,
                });
                *record_index += 1;
            }
            *byte_offset += consumed as u64;
        }
        Ok(batch)
    }
}

#[async_trait]
impl MessageConsumer for FileConsumer {
    async fn assign_latest(&mut self) -> Result<(), BusError> {
        for (topic, (byte_offset, record_index)) in self.positions.iter_mut() {
            let path = topic_path(&self.dir, topic);
            let buf = match fs::read(&path).await {
                Ok(buf) => buf,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    *byte_offset = 0;
                    *record_index = 0;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let (records, consumed) = parse_records(&buf);
            *byte_offset = consumed as u64;
            *record_index = records.len() as i64;
        }
        Ok(())
    }

    async fn seek_to_timestamp(&mut self, timestamp_ns: i64) -> Result<(), BusError> {
        for (topic, (byte_offset, record_index)) in self.positions.iter_mut() {
            let path = topic_path(&self.dir, topic);
            let buf = match fs::read(&path).await {
                Ok(buf) => buf,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    *byte_offset = 0;
                    *record_index = 0;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let (records, _) = parse_records(&buf);
            let mut offset = 0u64;
            let mut index = 0i64;
            for (ts, payload) in &records {
                if *ts >= timestamp_ns {
                    break;
                }
                offset += (RECORD_HEADER_LEN + payload.len()) as u64;
                index += 1;
            }
            *byte_offset = offset;
            *record_index = index;
        }
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Vec<BusMessage>, BusError> {
        let deadline = Instant::now() + timeout;
        loop {
            let batch = self.drain().await?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            sleep(POLL_WAIT_STEP.min(remaining)).await;
        }
    }
}
