//! LogBackend: durable append-only log backend
//!
//! Every `put`/`delete` appends one checksummed record to a single log file
//! and updates an ordered in-memory index. Opening the backend replays the
//! log into the index.
//!
//! # File Layout
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ Magic "DOCSLOG1" (8 bytes)   │
//! ├──────────────────────────────┤
//! │ Record 1                     │
//! ├──────────────────────────────┤
//! │ ...                          │
//! └──────────────────────────────┘
//! ```
//!
//! # Record Layout
//!
//! ```text
//! ┌─────────────────┬──────────────┬──────────────┬──────────────────────────┐
//! │ Length (4 bytes)│ CRC32 (4)    │ HeaderCRC (4)│ Payload (Length bytes)   │
//! └─────────────────┴──────────────┴──────────────┴──────────────────────────┘
//!
//! Payload:
//! ┌──────────┬──────────────┬───────────┬────────────────────┐
//! │ Kind (1) │ KeyLen (4)   │ Key       │ Value (rest)       │
//! └──────────┴──────────────┴───────────┴────────────────────┘
//! ```
//!
//! All integers are little-endian. The first CRC covers the payload; the
//! header CRC covers the length and payload CRC fields.
//!
//! # Recovery
//!
//! A record that is cut short or fails its payload checksum at the very end
//! of the file is the remains of an interrupted write: it is discarded and
//! the file truncated. A cut-short record only counts as torn when its header
//! checks out, so a damaged length can never discard committed records. A
//! header that fails its checksum is corruption unless everything from it to
//! the end of the file is zero. A bad record followed by more data is
//! corruption and fails the open.
//!
//! A failed append is rolled back by truncating the file to its last good
//! length. If that also fails the writer refuses further appends until the
//! log is reopened.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use docstore_core::{Error, Result};

use crate::backend::{Backend, ScanIter};

/// Magic bytes at the start of every log file
pub const LOG_MAGIC: [u8; 8] = *b"DOCSLOG1";

/// Bytes before each record's payload
pub const RECORD_HEADER_SIZE: usize = 12;
const KIND_PUT: u8 = 1;
const KIND_DELETE: u8 = 2;

/// When appended records reach stable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// fsync after every record; an acknowledged write survives power loss
    #[default]
    Always,
    /// Flush to the OS after every record; survives process crash only
    Standard,
}

#[derive(Debug)]
struct LogWriter {
    file: File,
    /// Bytes in the file
    len: u64,
    /// Set when a failed append could not be rolled back
    broken: bool,
}

/// Durable backend over an append-only log file
#[derive(Debug)]
pub struct LogBackend {
    path: PathBuf,
    sync_mode: SyncMode,
    /// Serializes appends; held while the index is updated so the index
    /// order matches the log order
    writer: Mutex<LogWriter>,
    index: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl LogBackend {
    /// Open (or create) the log at `path` and replay it
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, has a foreign header, or
    /// contains a corrupt record before its tail.
    pub fn open(path: impl AsRef<Path>, sync_mode: SyncMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let (index, valid_len) = if bytes.is_empty() {
            file.write_all(&LOG_MAGIC)?;
            file.sync_all()?;
            (BTreeMap::new(), LOG_MAGIC.len() as u64)
        } else {
            replay(&path, &bytes)?
        };

        if valid_len < bytes.len() as u64 {
            warn!(
                path = %path.display(),
                discarded = bytes.len() as u64 - valid_len,
                "Discarding torn record at end of log"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        info!(path = %path.display(), keys = index.len(), "Opened document log");

        Ok(LogBackend {
            path,
            sync_mode,
            writer: Mutex::new(LogWriter {
                file,
                len: valid_len,
                broken: false,
            }),
            index: RwLock::new(index),
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the log file in bytes
    pub fn log_size(&self) -> u64 {
        self.writer.lock().len
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// True if no key is live
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Rewrite the log with one record per live key
    ///
    /// Writes a fresh file next to the log and renames it over the original,
    /// so a crash during compaction leaves the old log intact. The new file
    /// is opened for appending before the rename; once the rename succeeds
    /// every later append lands in it.
    pub fn compact(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        let index = self.index.read();
        let before = writer.len;

        let tmp_path = self.path.with_extension("compact");
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut len = LOG_MAGIC.len() as u64;
        tmp.write_all(&LOG_MAGIC)?;
        for (key, value) in index.iter() {
            let record = encode_record(KIND_PUT, key, value)?;
            tmp.write_all(&record)?;
            len += record.len() as u64;
        }
        tmp.sync_all()?;
        drop(tmp);

        let file = OpenOptions::new().read(true).append(true).open(&tmp_path)?;
        fs::rename(&tmp_path, &self.path)?;
        *writer = LogWriter {
            file,
            len,
            broken: false,
        };

        info!(
            path = %self.path.display(),
            before_bytes = before,
            after_bytes = len,
            "Compacted document log"
        );
        Ok(())
    }

    fn append(&self, writer: &mut LogWriter, record: &[u8]) -> Result<()> {
        if writer.broken {
            return Err(Error::Storage(format!(
                "'{}' has an unrecovered partial record, reopen the log",
                self.path.display()
            )));
        }
        if let Err(e) = write_record(&mut writer.file, record, self.sync_mode) {
            warn!(path = %self.path.display(), error = %e, "Append failed");
            self.roll_back(writer);
            return Err(e.into());
        }
        writer.len += record.len() as u64;
        Ok(())
    }

    /// Drop any bytes past the last complete record
    fn roll_back(&self, writer: &mut LogWriter) {
        if let Err(e) = writer.file.set_len(writer.len) {
            error!(
                path = %self.path.display(),
                error = %e,
                "Failed to roll back partial record"
            );
            writer.broken = true;
        }
    }
}

fn write_record(file: &mut File, record: &[u8], sync_mode: SyncMode) -> std::io::Result<()> {
    file.write_all(record)?;
    match sync_mode {
        SyncMode::Always => file.sync_data(),
        SyncMode::Standard => file.flush(),
    }
}

impl Backend for LogBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.index.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let record = encode_record(KIND_PUT, key, &value)?;
        let mut writer = self.writer.lock();
        self.append(&mut writer, &record)?;
        self.index.write().insert(key.to_string(), value);
        debug!(key, bytes = record.len(), "Appended put record");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut writer = self.writer.lock();
        if !self.index.read().contains_key(key) {
            return Ok(false);
        }
        let record = encode_record(KIND_DELETE, key, &[])?;
        self.append(&mut writer, &record)?;
        self.index.write().remove(key);
        Ok(true)
    }

    fn scan(&self) -> Result<ScanIter> {
        let snapshot = self.index.read().clone();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }
}

fn encode_record(kind: u8, key: &str, value: &[u8]) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(1 + 4 + key.len() + value.len());
    payload.write_u8(kind)?;
    payload.write_u32::<LittleEndian>(key.len() as u32)?;
    payload.extend_from_slice(key.as_bytes());
    payload.extend_from_slice(value);

    let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len());
    record.write_u32::<LittleEndian>(payload.len() as u32)?;
    record.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
    let header_crc = crc32fast::hash(&record);
    record.write_u32::<LittleEndian>(header_crc)?;
    record.extend_from_slice(&payload);
    Ok(record)
}

/// Replay log bytes into an index
///
/// Returns the index and the length of the valid prefix of `bytes`.
fn replay(path: &Path, bytes: &[u8]) -> Result<(BTreeMap<String, Vec<u8>>, u64)> {
    if bytes.len() < LOG_MAGIC.len() || bytes[..LOG_MAGIC.len()] != LOG_MAGIC {
        return Err(Error::Corruption(format!(
            "'{}' is not a document log (bad magic)",
            path.display()
        )));
    }

    let mut index = BTreeMap::new();
    let mut offset = LOG_MAGIC.len();

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < RECORD_HEADER_SIZE {
            break;
        }
        let mut header = Cursor::new(&rest[..RECORD_HEADER_SIZE]);
        let payload_len = header.read_u32::<LittleEndian>()? as usize;
        let crc = header.read_u32::<LittleEndian>()?;
        let header_crc = header.read_u32::<LittleEndian>()?;

        if crc32fast::hash(&rest[..RECORD_HEADER_SIZE - 4]) != header_crc {
            // Zero fill past the last record is space the file system
            // allocated for a write that never landed
            if rest.iter().all(|&b| b == 0) {
                break;
            }
            return Err(Error::Corruption(format!(
                "record header checksum mismatch in '{}' at offset {}",
                path.display(),
                offset
            )));
        }

        let end = RECORD_HEADER_SIZE + payload_len;
        if rest.len() < end {
            break;
        }
        let payload = &rest[RECORD_HEADER_SIZE..end];
        if crc32fast::hash(payload) != crc {
            if offset + end == bytes.len() {
                break;
            }
            return Err(Error::Corruption(format!(
                "checksum mismatch in '{}' at offset {}",
                path.display(),
                offset
            )));
        }

        let (kind, key, value) = decode_payload(payload).ok_or_else(|| {
            Error::Corruption(format!(
                "malformed record in '{}' at offset {}",
                path.display(),
                offset
            ))
        })?;
        match kind {
            KIND_PUT => {
                index.insert(key, value.to_vec());
            }
            KIND_DELETE => {
                index.remove(&key);
            }
            other => {
                return Err(Error::Corruption(format!(
                    "unknown record kind {} in '{}' at offset {}",
                    other,
                    path.display(),
                    offset
                )))
            }
        }
        offset += end;
    }

    Ok((index, offset as u64))
}

fn decode_payload(payload: &[u8]) -> Option<(u8, String, &[u8])> {
    let mut cursor = Cursor::new(payload);
    let kind = cursor.read_u8().ok()?;
    let key_len = cursor.read_u32::<LittleEndian>().ok()? as usize;
    let key_start = cursor.position() as usize;
    let key_end = key_start.checked_add(key_len)?;
    let key = std::str::from_utf8(payload.get(key_start..key_end)?).ok()?;
    Some((kind, key.to_string(), &payload[key_end..]))
}
