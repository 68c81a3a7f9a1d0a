//! Crate-wide error and result types.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core. See `§7 ERROR HANDLING DESIGN`.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// An outbound enqueue primitive (HCI event queue, L2CAP send, USB async
    /// transfer start) could not accept the packet right now. Never
    /// propagated past the tick loop: the caller retries on the next tick.
    #[error("transport busy")]
    Busy,

    /// A connection-level failure (non-success `CONNECT_RSP`, host
    /// disconnect/reject) that tears the session down.
    #[error("protocol fatal: {0}")]
    ProtocolFatal(&'static str),

    /// A memory-space operation failed; delivered in-band in the
    /// corresponding reply/ACK report rather than returned to the driver.
    #[error(transparent)]
    MemorySpace(#[from] MemoryError),

    /// An inbound packet could not be parsed. Fatal to the session that
    /// produced it, never to the process.
    #[error("malformed packet: {context}")]
    Malformed {
        /// Human-readable description of what failed to parse.
        context: &'static str,
    },

    /// The session table has no free slot for a new USB device.
    #[error("no free session slot")]
    NoFreeSession,

    /// No driver is registered for the USB device's (VID, PID) pair.
    #[error("no driver for vid={vid:#06x} pid={pid:#06x}")]
    NoDriver {
        /// USB vendor ID.
        vid: u16,
        /// USB product ID.
        pid: u16,
    },
}

/// Errors from the extension/EEPROM memory model (`§4.2`), delivered in-band
/// in `READ_DATA_REPLY` or `WRITE_DATA` ACK reports.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum MemoryError {
    /// Address space, slave address, or offset is not addressable.
    #[error("invalid address")]
    InvalidAddress,
    /// The address space identifier itself is unrecognised.
    #[error("invalid space")]
    InvalidSpace,
    /// The I2C slave did not acknowledge the transfer.
    #[error("nack")]
    Nack,
}

impl MemoryError {
    /// Returns the wire error code used in `READ_DATA_REPLY`/ACK reports.
    #[inline]
    #[must_use]
    pub const fn wire_code(self) -> u8 {
        match self {
            Self::InvalidAddress => 0x08,
            Self::InvalidSpace => 0x06,
            Self::Nack => 0x07,
        }
    }
}
