//! Core error type for the APDU channel stack
//!
//! Every fallible operation in this crate returns [`Error`]. Variants carry
//! structured fields (lengths, status words, class bytes) instead of
//! formatted messages so callers can match on them.

use crate::transport::TransportError;

/// Result type used throughout the crate
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ErrorKind {
    /// Malformed command or response bytes
    #[display("format")]
    Format,
    /// Caller misconfiguration (missing transport, bad logical channel)
    #[display("channel configuration")]
    ChannelConfig,
    /// Failure of the underlying transport
    #[display("transport")]
    Transport,
    /// Status word or data length assertion requested by the caller
    #[display("status")]
    Status,
}

/// Error type for all APDU channel operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    //
    // Format errors
    //
    /// Fewer than the 4 header bytes were supplied
    #[error("Command too short: {length} bytes, at least 4 required")]
    CommandTooShort {
        /// Number of bytes supplied
        length: usize,
    },

    /// Byte count matches no short or extended case layout
    #[error("Inconsistent command length: {length} bytes match no APDU case")]
    InconsistentLength {
        /// Number of bytes supplied
        length: usize,
    },

    /// Command data exceeds the extended Lc range
    #[error("Command data too long: {length} bytes (max 65535)")]
    DataTooLong {
        /// Offending data length
        length: usize,
    },

    /// Expected length outside 0..=65536
    #[error("Invalid expected length: {le} (max 65536)")]
    InvalidLe {
        /// Offending Le value
        le: u32,
    },

    /// Hex input could not be decoded
    #[error("Invalid hex input: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    //
    // Channel configuration errors
    //
    /// No transport has been attached to the channel engine
    #[error("No card channel configured")]
    NoChannel,

    /// Logical channel number outside 0..=19
    #[error("Invalid logical channel: {channel} (max 19)")]
    InvalidLogicalChannel {
        /// Requested channel number
        channel: u8,
    },

    /// Class byte cannot encode the requested logical channel
    #[error("Class byte {cla:#04x} cannot address logical channel {channel}")]
    InvalidClassForChannel {
        /// Class byte of the command
        cla: u8,
        /// Requested channel number
        channel: u8,
    },

    //
    // Transport errors
    //
    /// Underlying transport failure; the channel has been disconnected
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The card kept requesting continuations past the configured limit
    #[error("Continuation limit of {limit} round trips exceeded")]
    ContinuationLimit {
        /// Configured limit
        limit: usize,
    },

    //
    // Status assertions
    //
    /// Response status word differs from the expected one
    #[error("Status word mismatch: expected {expected:04X}, got {actual:04X}")]
    StatusMismatch {
        /// Expected status word
        expected: u16,
        /// Status word returned by the card
        actual: u16,
    },

    /// Response data length differs from the expected one
    #[error("Response data length mismatch: expected {expected}, got {actual}")]
    DataLengthMismatch {
        /// Expected data length
        expected: usize,
        /// Data length returned by the card
        actual: usize,
    },
}

impl Error {
    /// Classify this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CommandTooShort { .. }
            | Self::InconsistentLength { .. }
            | Self::DataTooLong { .. }
            | Self::InvalidLe { .. }
            | Self::InvalidHex(_) => ErrorKind::Format,
            Self::NoChannel
            | Self::InvalidLogicalChannel { .. }
            | Self::InvalidClassForChannel { .. } => ErrorKind::ChannelConfig,
            Self::Transport(_) | Self::ContinuationLimit { .. } => ErrorKind::Transport,
            Self::StatusMismatch { .. } | Self::DataLengthMismatch { .. } => ErrorKind::Status,
        }
    }

    /// Status word returned by the card, if this is a status mismatch
    pub const fn status_word(&self) -> Option<u16> {
        match self {
            Self::StatusMismatch { actual, .. } => Some(*actual),
            _ => None,
        }
    }
}
