//! Validation taxonomy for incoming orders.
//!
//! Book and matcher operations themselves cannot fail at runtime: precondition
//! violations are bugs and use fail-fast assertions. [`RejectReason`] covers
//! the recoverable class — orders that are well-formed transport but invalid
//! domain input. It is surfaced as a 400 at HTTP ingress or, for events that
//! already cleared the ring buffer, as a synthetic rejection record.

use std::fmt;

/// Why an incoming order was rejected by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RejectReason {
    /// The symbol is not in this shard's allowed set.
    UnknownSymbol,

    /// The side string was not `BUY` or `SELL`.
    InvalidSide,

    /// The order type is not supported (only `LIMIT`).
    UnsupportedOrderType,

    /// The limit price was zero or negative.
    NonPositivePrice,

    /// The quantity was zero.
    NonPositiveQuantity,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnknownSymbol => write!(f, "symbol not owned by this shard"),
            RejectReason::InvalidSide => write!(f, "side must be BUY or SELL"),
            RejectReason::UnsupportedOrderType => write!(f, "order type must be LIMIT"),
            RejectReason::NonPositivePrice => write!(f, "price must be positive"),
            RejectReason::NonPositiveQuantity => write!(f, "quantity must be positive"),
        }
    }
}

impl std::error::Error for RejectReason {}
