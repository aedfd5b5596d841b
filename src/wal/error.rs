//! Error types for the write-ahead log.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur within the write-ahead log.
#[derive(Debug)]
#[non_exhaustive]
pub enum WalError {
    /// An I/O error occurred while creating, mapping, or flushing the file.
    Io {
        /// The underlying I/O error message.
        message: String,
        /// The file path involved, if known.
        path: Option<PathBuf>,
    },

    /// The record payload could not be serialized.
    SerializationError {
        /// The underlying serialization error message.
        message: String,
    },

    /// The record payload could not be deserialized on read-back.
    DeserializationError {
        /// The sequence number of the record that failed to deserialize.
        sequence: u64,
        /// The underlying deserialization error message.
        message: String,
    },

    /// The log has no room for the record being appended. The write position
    /// stays where it was; matching continues but durability is compromised.
    /// This is a deployment-sizing failure, not a data error.
    Saturated {
        /// Bytes the encoded record needs.
        needed: usize,
        /// Bytes left before capacity.
        remaining: usize,
    },

    /// A record failed CRC32 integrity verification.
    CorruptEntry {
        /// The sequence number of the corrupt record.
        sequence: u64,
        /// The expected CRC32 checksum.
        expected_crc: u32,
        /// The actual CRC32 checksum computed from the record bytes.
        actual_crc: u32,
    },

    /// A record has an invalid header (truncated or malformed).
    InvalidEntryHeader {
        /// Byte offset within the file where the error occurred.
        offset: usize,
        /// Description of the header problem.
        message: String,
    },
}

impl fmt::Display for WalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalError::Io { message, path } => {
                if let Some(p) = path {
                    write!(f, "wal I/O error at {}: {message}", p.display())
                } else {
                    write!(f, "wal I/O error: {message}")
                }
            }
            WalError::SerializationError { message } => {
                write!(f, "wal serialization error: {message}")
            }
            WalError::DeserializationError { sequence, message } => {
                write!(f, "wal deserialization error at sequence {sequence}: {message}")
            }
            WalError::Saturated { needed, remaining } => {
                write!(
                    f,
                    "wal saturated: record needs {needed} bytes, {remaining} remaining"
                )
            }
            WalError::CorruptEntry {
                sequence,
                expected_crc,
                actual_crc,
            } => {
                write!(
                    f,
                    "corrupt wal record at sequence {sequence}: \
                     expected CRC {expected_crc:#010x}, got {actual_crc:#010x}"
                )
            }
            WalError::InvalidEntryHeader { offset, message } => {
                write!(f, "invalid wal record header at offset {offset}: {message}")
            }
        }
    }
}

impl std::error::Error for WalError {}

impl From<std::io::Error> for WalError {
    #[cold]
    fn from(err: std::io::Error) -> Self {
        WalError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}
