//! Memory-mapped write-ahead log.
//!
//! [`WriteAheadLog`] persists [`WalRecord`]s to a single pre-allocated,
//! memory-mapped file. Appending is a memory write on the consumer thread;
//! durability is batched — an explicit [`force`](WriteAheadLog::force) at
//! batch boundaries or on shutdown flushes the dirty range. A crash loses at
//! most the last unflushed batch, which is also in flight on the outbound
//! event stream.
//!
//! # On-Disk Record Format (little-endian)
//!
//! ```text
//! [4 bytes: record_length][8 bytes: sequence][8 bytes: timestamp_ns]
//! [N bytes: JSON payload][4 bytes: CRC32]
//! ```
//!
//! - `record_length` — total bytes after itself (sequence + timestamp +
//!   payload + CRC = 20 + N).
//! - CRC32 covers: sequence ‖ timestamp_ns ‖ payload (not `record_length`).
//!
//! There is exactly one file per shard and no rotation; appending past
//! capacity reports [`WalError::Saturated`] and the pipeline continues.

use super::error::WalError;
use super::types::WalRecord;
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Size of the fixed-size record header in bytes.
///
/// Layout: `[4 bytes record_length][8 bytes sequence][8 bytes timestamp_ns]`
pub const RECORD_HEADER_SIZE: usize = 4 + 8 + 8;

/// Size of the CRC32 trailer appended to each record in bytes.
pub const RECORD_CRC_SIZE: usize = 4;

/// Total overhead per record (header + CRC trailer) in bytes.
pub const RECORD_OVERHEAD: usize = RECORD_HEADER_SIZE + RECORD_CRC_SIZE;

/// A single record as read back from the log.
#[derive(Debug, Clone)]
pub struct WalEntry {
    /// The deserialized record.
    pub record: WalRecord,

    /// The CRC32 checksum that was stored alongside the record.
    pub stored_crc: u32,
}

/// A memory-mapped, append-only event log with batched durability.
///
/// Single-writer by design: the shard's consumer thread owns the log
/// exclusively, so no internal locking exists. Readers open their own
/// read-only mapping of the file via [`read_from`](WriteAheadLog::read_from).
pub struct WriteAheadLog {
    mmap: MmapMut,
    /// Current append position (end of written data).
    write_pos: usize,
    /// Everything before this offset has been flushed to disk.
    flushed_pos: usize,
    capacity: usize,
    path: PathBuf,
    last_seq: Option<u64>,
}

impl WriteAheadLog {
    /// Create a new log file pre-allocated to `capacity` bytes, replacing
    /// any existing file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Io`] if the file cannot be created or mapped.
    pub fn create<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| WalError::Io {
                message: e.to_string(),
                path: Some(path.clone()),
            })?;

        file.set_len(capacity as u64).map_err(|e| WalError::Io {
            message: e.to_string(),
            path: Some(path.clone()),
        })?;

        // SAFETY: The file is exclusively owned by this process and will not
        // be truncated or modified externally while the mmap is active.
        let mmap = unsafe {
            MmapMut::map_mut(&file).map_err(|e| WalError::Io {
                message: e.to_string(),
                path: Some(path.clone()),
            })?
        };

        Ok(Self {
            mmap,
            write_pos: 0,
            flushed_pos: 0,
            capacity,
            path,
            last_seq: None,
        })
    }

    /// Open an existing log file for appending.
    ///
    /// Scans the written records to find the append position and the last
    /// sequence number, then resumes.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Io`] if the file cannot be opened or mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| WalError::Io {
                message: e.to_string(),
                path: Some(path.clone()),
            })?;

        let capacity = file
            .metadata()
            .map_err(|e| WalError::Io {
                message: e.to_string(),
                path: Some(path.clone()),
            })?
            .len() as usize;

        // SAFETY: The file is exclusively owned by this process and will not
        // be truncated or modified externally while the mmap is active.
        let mmap = unsafe {
            MmapMut::map_mut(&file).map_err(|e| WalError::Io {
                message: e.to_string(),
                path: Some(path.clone()),
            })?
        };

        let (write_pos, last_seq) = scan_written(&mmap);

        Ok(Self {
            mmap,
            write_pos,
            flushed_pos: write_pos,
            capacity,
            path,
            last_seq,
        })
    }

    /// Open the log at `path` if it exists, otherwise create it with
    /// `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Io`] on filesystem failures.
    pub fn open_or_create<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self, WalError> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path, capacity)
        }
    }

    /// The configured capacity in bytes.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes left before saturation.
    #[must_use]
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.write_pos)
    }

    /// The sequence number of the last appended record, if any.
    #[must_use]
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_seq
    }

    /// Append a record to the log. This is a memory write only; call
    /// [`force`](WriteAheadLog::force) to make the batch durable.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Saturated`] when the record does not fit in the
    /// remaining capacity (the write position is unchanged), or
    /// [`WalError::SerializationError`] when the payload cannot be encoded.
    pub fn append(&mut self, record: &WalRecord) -> Result<(), WalError> {
        let bytes = encode_record(record)?;

        if bytes.len() > self.remaining() {
            return Err(WalError::Saturated {
                needed: bytes.len(),
                remaining: self.remaining(),
            });
        }

        let end = self.write_pos + bytes.len();
        self.mmap[self.write_pos..end].copy_from_slice(&bytes);
        self.write_pos = end;
        self.last_seq = Some(record.sequence);
        Ok(())
    }

    /// Flush every appended-but-unflushed byte to disk (msync).
    ///
    /// Called at batch boundaries and on shutdown. A no-op when nothing is
    /// dirty.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Io`] when the flush fails.
    pub fn force(&mut self) -> Result<(), WalError> {
        if self.flushed_pos == self.write_pos {
            return Ok(());
        }
        let dirty = self.write_pos - self.flushed_pos;
        self.mmap
            .flush_range(self.flushed_pos, dirty)
            .map_err(|e| WalError::Io {
                message: e.to_string(),
                path: Some(self.path.clone()),
            })?;
        self.flushed_pos = self.write_pos;
        Ok(())
    }

    /// Read records starting from the given sequence number (inclusive).
    ///
    /// The iterator yields records in file order; corrupt or undecodable
    /// records surface as `Err` items. Reading opens an independent
    /// read-only mapping, so it is safe alongside the single writer.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Io`] if the file cannot be re-opened for reading.
    pub fn read_from(&self, sequence: u64) -> Result<WalReadIter, WalError> {
        WalReadIter::open(&self.path, sequence)
    }

    /// Verify every written record's CRC32 checksum.
    ///
    /// # Errors
    ///
    /// Returns the first [`WalError::CorruptEntry`] or
    /// [`WalError::InvalidEntryHeader`] encountered.
    pub fn verify_integrity(&self) -> Result<(), WalError> {
        let data = &self.mmap[..self.write_pos.min(self.mmap.len())];
        let mut offset = 0usize;
        loop {
            match scan_record(data, offset) {
                Scan::End => return Ok(()),
                Scan::Truncated { offset } => {
                    return Err(WalError::InvalidEntryHeader {
                        offset,
                        message: "truncated record (extends beyond written data)".to_string(),
                    });
                }
                Scan::Record {
                    end,
                    sequence,
                    stored_crc,
                    computed_crc,
                    ..
                } => {
                    if stored_crc != computed_crc {
                        return Err(WalError::CorruptEntry {
                            sequence,
                            expected_crc: stored_crc,
                            actual_crc: computed_crc,
                        });
                    }
                    offset = end;
                }
            }
        }
    }
}

impl std::fmt::Debug for WriteAheadLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteAheadLog")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("write_pos", &self.write_pos)
            .field("last_seq", &self.last_seq)
            .finish()
    }
}

/// Serialize and encode a single record into the on-disk binary format.
fn encode_record(record: &WalRecord) -> Result<Vec<u8>, WalError> {
    let payload = serde_json::to_vec(record).map_err(|e| WalError::SerializationError {
        message: e.to_string(),
    })?;

    // record_length = 8 (seq) + 8 (ts) + payload + 4 (crc)
    let record_length = 8u32
        .checked_add(8)
        .and_then(|v| v.checked_add(payload.len() as u32))
        .and_then(|v| v.checked_add(4))
        .ok_or(WalError::SerializationError {
            message: "record size overflow".to_string(),
        })?;

    let mut buf = Vec::with_capacity(record_length as usize + 4);
    let io_err = |e: std::io::Error| WalError::SerializationError {
        message: e.to_string(),
    };

    buf.write_all(&record_length.to_le_bytes()).map_err(io_err)?;
    buf.write_all(&record.sequence.to_le_bytes()).map_err(io_err)?;
    buf.write_all(&record.timestamp_ns.to_le_bytes())
        .map_err(io_err)?;
    buf.write_all(&payload).map_err(io_err)?;

    // CRC32 over (sequence ‖ timestamp_ns ‖ payload), i.e. everything after
    // record_length.
    let crc = crc32fast::hash(&buf[4..]);
    buf.write_all(&crc.to_le_bytes()).map_err(io_err)?;

    Ok(buf)
}

/// One step of a raw scan over the record stream.
enum Scan<'a> {
    /// End of written data (zero record_length in the zero-filled region).
    End,
    /// A record header points beyond the data; written region ends here.
    Truncated { offset: usize },
    /// A structurally valid record.
    Record {
        end: usize,
        sequence: u64,
        stored_crc: u32,
        computed_crc: u32,
        payload: &'a [u8],
    },
}

/// Decode the record at `offset` without deserializing the payload.
fn scan_record(data: &[u8], offset: usize) -> Scan<'_> {
    let Some(len_bytes) = data.get(offset..offset + 4) else {
        return Scan::End;
    };
    let record_length =
        u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    if record_length == 0 {
        return Scan::End;
    }
    if record_length < RECORD_HEADER_SIZE - 4 + RECORD_CRC_SIZE {
        return Scan::Truncated { offset };
    }

    let body_start = offset + 4;
    let end = match body_start.checked_add(record_length) {
        Some(end) if end <= data.len() => end,
        _ => return Scan::Truncated { offset },
    };

    let crc_start = end - RECORD_CRC_SIZE;
    let sequence = read_u64_le(data, body_start);
    let stored_crc = u32::from_le_bytes([
        data[crc_start],
        data[crc_start + 1],
        data[crc_start + 2],
        data[crc_start + 3],
    ]);
    let computed_crc = crc32fast::hash(&data[body_start..crc_start]);
    let payload = &data[body_start + 16..crc_start];

    Scan::Record {
        end,
        sequence,
        stored_crc,
        computed_crc,
        payload,
    }
}

#[inline]
fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Scan written records to find the append position and last sequence.
fn scan_written(data: &[u8]) -> (usize, Option<u64>) {
    let mut offset = 0usize;
    let mut last_seq = None;
    loop {
        match scan_record(data, offset) {
            Scan::Record { end, sequence, .. } => {
                last_seq = Some(sequence);
                offset = end;
            }
            Scan::End | Scan::Truncated { .. } => return (offset, last_seq),
        }
    }
}

/// An iterator over log records from an independent read-only mapping.
pub struct WalReadIter {
    mmap: memmap2::Mmap,
    offset: usize,
    start_sequence: u64,
}

impl WalReadIter {
    fn open(path: &Path, start_sequence: u64) -> Result<Self, WalError> {
        let file = File::open(path).map_err(|e| WalError::Io {
            message: e.to_string(),
            path: Some(path.to_path_buf()),
        })?;

        // SAFETY: Read-only mapping; the single-writer pattern means the
        // written region is only ever appended to, never rewritten.
        let mmap = unsafe {
            memmap2::Mmap::map(&file).map_err(|e| WalError::Io {
                message: e.to_string(),
                path: Some(path.to_path_buf()),
            })?
        };

        Ok(Self {
            mmap,
            offset: 0,
            start_sequence,
        })
    }
}

impl Iterator for WalReadIter {
    type Item = Result<WalEntry, WalError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match scan_record(&self.mmap, self.offset) {
                Scan::End | Scan::Truncated { .. } => return None,
                Scan::Record {
                    end,
                    sequence,
                    stored_crc,
                    computed_crc,
                    payload,
                } => {
                    self.offset = end;
                    if stored_crc != computed_crc {
                        return Some(Err(WalError::CorruptEntry {
                            sequence,
                            expected_crc: stored_crc,
                            actual_crc: computed_crc,
                        }));
                    }
                    if sequence < self.start_sequence {
                        continue;
                    }
                    let record: WalRecord = match serde_json::from_slice(payload) {
                        Ok(r) => r,
                        Err(e) => {
                            return Some(Err(WalError::DeserializationError {
                                sequence,
                                message: e.to_string(),
                            }));
                        }
                    };
                    return Some(Ok(WalEntry { record, stored_crc }));
                }
            }
        }
    }
}
