//! APDU response definitions
//!
//! A response is the raw payload returned by the card: response data
//! followed by exactly two status bytes.

pub mod status;

use std::fmt;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::{Error, Result};
use status::StatusWord;

/// APDU response
///
/// The payload always holds at least the two status bytes; shorter input is
/// right-padded with zeros on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// Response data followed by SW1 SW2
    payload: Bytes,
    /// Time spent on the wire producing this response
    execution_time: Duration,
}

impl ApduResponse {
    /// Create a response from raw bytes (including status word)
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self::with_execution_time(payload, Duration::ZERO)
    }

    /// Create a response from raw bytes with a measured execution time
    pub fn with_execution_time(payload: impl Into<Bytes>, execution_time: Duration) -> Self {
        let payload = payload.into();
        let payload = if payload.len() < 2 {
            let mut padded = BytesMut::with_capacity(2);
            padded.put_slice(&payload);
            padded.put_bytes(0x00, 2 - payload.len());
            padded.freeze()
        } else {
            payload
        };

        Self {
            payload,
            execution_time,
        }
    }

    /// Create a response from data and a status word
    pub fn from_parts(data: &[u8], status: impl Into<StatusWord>) -> Self {
        let status = status.into();
        let mut buf = BytesMut::with_capacity(data.len() + 2);
        buf.put_slice(data);
        buf.put_u8(status.sw1);
        buf.put_u8(status.sw2);
        Self::new(buf.freeze())
    }

    /// Parse a response from a hex string, ignoring whitespace
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let compact: String = hex_str.split_whitespace().collect();
        Ok(Self::new(hex::decode(compact)?))
    }

    /// Full payload including the status word
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Full payload including the status word
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Response data without the status word
    pub fn data(&self) -> &[u8] {
        &self.payload[..self.payload.len() - 2]
    }

    /// Length of the response data without the status word
    pub fn data_len(&self) -> usize {
        self.payload.len() - 2
    }

    /// First status byte
    pub fn sw1(&self) -> u8 {
        self.payload[self.payload.len() - 2]
    }

    /// Second status byte
    pub fn sw2(&self) -> u8 {
        self.payload[self.payload.len() - 1]
    }

    /// Status word as a 16-bit value
    pub fn sw(&self) -> u16 {
        self.status().to_u16()
    }

    /// Status word
    pub fn status(&self) -> StatusWord {
        StatusWord::new(self.sw1(), self.sw2())
    }

    /// Check if the response indicates success (90 00)
    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }

    /// Accumulated execution time
    pub const fn execution_time(&self) -> Duration {
        self.execution_time
    }

    /// Fail unless the status word equals `expected`
    pub fn check_sw(&self, expected: u16) -> Result<&Self> {
        let actual = self.sw();
        if actual != expected {
            return Err(Error::StatusMismatch { expected, actual });
        }
        Ok(self)
    }

    /// Fail unless the status word is one of `accepted`
    ///
    /// The reported expectation is the first accepted status word.
    pub fn check_status(&self, accepted: &[u16]) -> Result<&Self> {
        let actual = self.sw();
        if accepted.contains(&actual) {
            return Ok(self);
        }
        Err(Error::StatusMismatch {
            expected: accepted.first().copied().unwrap_or(0x9000),
            actual,
        })
    }

    /// Fail unless the response data is exactly `expected` bytes long
    pub fn check_data_length(&self, expected: usize) -> Result<&Self> {
        let actual = self.data_len();
        if actual != expected {
            return Err(Error::DataLengthMismatch { expected, actual });
        }
        Ok(self)
    }

    /// Append a continuation fragment
    ///
    /// The trailing status word of `self` is dropped, the whole payload of
    /// `next` (data and status) is appended, and execution times are summed.
    pub fn append_response(&mut self, next: &Self) {
        let mut buf = BytesMut::with_capacity(self.data_len() + next.payload.len());
        buf.put_slice(self.data());
        buf.put_slice(&next.payload);
        self.payload = buf.freeze();
        self.execution_time += next.execution_time;

        trace!(
            total_data_len = self.data_len(),
            sw = %self.status(),
            "Appended response fragment"
        );
    }
}

impl From<ApduResponse> for Bytes {
    fn from(response: ApduResponse) -> Self {
        response.payload
    }
}

impl From<&[u8]> for ApduResponse {
    fn from(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }
}

impl fmt::Display for ApduResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.payload))
    }
}
