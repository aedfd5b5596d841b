//! Durable append-only record of domain events.

mod error;
mod log;
mod types;

pub use error::WalError;
pub use log::{RECORD_CRC_SIZE, RECORD_HEADER_SIZE, RECORD_OVERHEAD, WalEntry, WalReadIter, WriteAheadLog};
pub use types::{DomainEvent, WalRecord};
