//! APDU command definitions
//!
//! This module provides the [`ApduCommand`] type and its bit-exact short and
//! extended wire encodings according to ISO/IEC 7816-4.

pub mod logical_channel;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::constants::{EXTENDED_MAX_LC, EXTENDED_MAX_LE, SHORT_MAX_LC, SHORT_MAX_LE};
use crate::{Error, Result};

/// The four ISO/IEC 7816-4 command cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ApduCase {
    /// No command data, no response data expected
    #[display("case 1")]
    Case1,
    /// No command data, response data expected
    #[display("case 2")]
    Case2,
    /// Command data, no response data expected
    #[display("case 3")]
    Case3,
    /// Command data, response data expected
    #[display("case 4")]
    Case4,
}

impl ApduCase {
    /// Classify from data presence and expected length
    pub const fn classify(has_data: bool, le: u32) -> Self {
        match (has_data, le > 0) {
            (false, false) => Self::Case1,
            (false, true) => Self::Case2,
            (true, false) => Self::Case3,
            (true, true) => Self::Case4,
        }
    }

    /// Whether the case carries an Lc field and data
    pub const fn has_data(self) -> bool {
        matches!(self, Self::Case3 | Self::Case4)
    }

    /// Whether the case carries an Le field
    pub const fn has_le(self) -> bool {
        matches!(self, Self::Case2 | Self::Case4)
    }
}

/// APDU command
///
/// `le` is the expected response length: 0 means absent, 1..=256 fits the
/// short form, up to 65536 needs the extended form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApduCommand {
    /// CLA, INS, P1, P2
    header: [u8; 4],
    /// Command data, possibly empty
    data: Bytes,
    /// Expected response length
    le: u32,
    /// Encode in extended form even when not required
    force_extended: bool,
}

impl ApduCommand {
    /// Create a new case 1 command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            header: [cla, ins, p1, p2],
            data: Bytes::new(),
            le: 0,
            force_extended: false,
        }
    }

    /// Create a new command with expected response length (Le)
    pub fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: u32) -> Result<Self> {
        Self::new(cla, ins, p1, p2).with_le(le)
    }

    /// Create a new command with data payload
    pub fn new_with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: impl Into<Bytes>) -> Result<Self> {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Create a new command with both data and expected length
    pub fn new_with_data_and_le(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: impl Into<Bytes>,
        le: u32,
    ) -> Result<Self> {
        Self::new(cla, ins, p1, p2).with_data(data)?.with_le(le)
    }

    /// Set the data field
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Result<Self> {
        self.set_data(data)?;
        Ok(self)
    }

    /// Set the expected length field
    pub fn with_le(mut self, le: u32) -> Result<Self> {
        self.set_le(le)?;
        Ok(self)
    }

    /// Request the extended encoding; see [`set_extended`](Self::set_extended)
    pub fn with_extended(mut self, extended: bool) -> Self {
        self.set_extended(extended);
        self
    }

    /// Replace the class byte
    pub const fn with_class(mut self, cla: u8) -> Self {
        self.header[0] = cla;
        self
    }

    /// Replace the data field in place
    pub fn set_data(&mut self, data: impl Into<Bytes>) -> Result<&mut Self> {
        let data = data.into();
        if data.len() > EXTENDED_MAX_LC {
            return Err(Error::DataTooLong { length: data.len() });
        }
        self.data = data;
        self.drop_forced_format();
        Ok(self)
    }

    /// Replace the expected length in place
    pub fn set_le(&mut self, le: u32) -> Result<&mut Self> {
        if le > EXTENDED_MAX_LE {
            return Err(Error::InvalidLe { le });
        }
        self.le = le;
        self.drop_forced_format();
        Ok(self)
    }

    /// Force or release the extended encoding
    ///
    /// The format can only be widened: forcing extended on a case 1 command
    /// and forcing short on a naturally extended command are both ignored.
    /// Returns whether the request took effect.
    pub fn set_extended(&mut self, extended: bool) -> bool {
        if extended && self.case() == ApduCase::Case1 {
            trace!("Ignoring extended format request on case 1 command");
            return false;
        }
        if !extended && self.is_naturally_extended() {
            trace!("Ignoring short format request on naturally extended command");
            return false;
        }
        self.force_extended = extended;
        true
    }

    /// Replace the class byte in place
    pub const fn set_class(&mut self, cla: u8) -> &mut Self {
        self.header[0] = cla;
        self
    }

    fn drop_forced_format(&mut self) {
        if !self.is_naturally_extended() {
            self.force_extended = false;
        }
    }

    /// Command class (CLA)
    pub const fn class(&self) -> u8 {
        self.header[0]
    }

    /// Instruction code (INS)
    pub const fn instruction(&self) -> u8 {
        self.header[1]
    }

    /// First parameter (P1)
    pub const fn p1(&self) -> u8 {
        self.header[2]
    }

    /// Second parameter (P2)
    pub const fn p2(&self) -> u8 {
        self.header[3]
    }

    /// Header bytes CLA, INS, P1, P2
    pub const fn header(&self) -> [u8; 4] {
        self.header
    }

    /// Command data, empty if absent
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Expected response length, 0 if absent
    pub const fn le(&self) -> u32 {
        self.le
    }

    /// Whether the extended encoding has been forced
    pub const fn is_forced_extended(&self) -> bool {
        self.force_extended
    }

    /// Command case
    pub fn case(&self) -> ApduCase {
        ApduCase::classify(!self.data.is_empty(), self.le)
    }

    /// Whether the command cannot be expressed in short form
    pub fn is_naturally_extended(&self) -> bool {
        self.data.len() > SHORT_MAX_LC || self.le > SHORT_MAX_LE
    }

    /// Whether the command is encoded in extended form
    pub fn is_extended(&self) -> bool {
        self.is_naturally_extended() || self.force_extended
    }

    /// Calculate length of serialized command
    pub fn encoded_len(&self) -> usize {
        let lc = self.data.len();
        match (self.case(), self.is_extended()) {
            (ApduCase::Case1, _) => 4,
            (ApduCase::Case2, false) => 5,
            (ApduCase::Case3, false) => 5 + lc,
            (ApduCase::Case4, false) => 6 + lc,
            (ApduCase::Case2, true) => 7,
            (ApduCase::Case3, true) => 7 + lc,
            (ApduCase::Case4, true) => 9 + lc,
        }
    }

    /// Convert to raw APDU bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.encoded_len());
        buffer.put_slice(&self.header);

        let case = self.case();
        if case == ApduCase::Case1 {
            return buffer.freeze();
        }

        if self.is_extended() {
            buffer.put_u8(0x00);
            if case.has_data() {
                buffer.put_u16(self.data.len() as u16);
                buffer.put_slice(&self.data);
            }
            if case.has_le() {
                // 65536 wraps to 0x0000
                buffer.put_u16(self.le as u16);
            }
        } else {
            if case.has_data() {
                buffer.put_u8(self.data.len() as u8);
                buffer.put_slice(&self.data);
            }
            if case.has_le() {
                // 256 wraps to 0x00
                buffer.put_u8(self.le as u8);
            }
        }

        buffer.freeze()
    }

    /// Parse a command from raw bytes
    ///
    /// A command decoded from the extended form keeps that form when
    /// re-encoded.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let length = raw.len();
        if length < 4 {
            return Err(Error::CommandTooShort { length });
        }

        let mut command = Self::new(raw[0], raw[1], raw[2], raw[3]);
        if length == 4 {
            return Ok(command);
        }

        let b4 = raw[4] as usize;

        // A lone fifth byte is always a short Le, even when it is 0x00
        if length == 5 {
            command.le = short_le(raw[4]);
            return Ok(command);
        }

        if b4 != 0 {
            if length == 5 + b4 {
                command.data = Bytes::copy_from_slice(&raw[5..]);
                return Ok(command);
            }
            if length == 6 + b4 {
                command.data = Bytes::copy_from_slice(&raw[5..5 + b4]);
                command.le = short_le(raw[5 + b4]);
                return Ok(command);
            }
            return Err(Error::InconsistentLength { length });
        }

        if length < 7 {
            return Err(Error::InconsistentLength { length });
        }

        let value = u16::from_be_bytes([raw[5], raw[6]]);
        if length == 7 {
            command.le = extended_le(value);
        } else {
            let lc = value as usize;
            if lc == 0 {
                return Err(Error::InconsistentLength { length });
            }
            if length == 7 + lc {
                command.data = Bytes::copy_from_slice(&raw[7..]);
            } else if length == 9 + lc {
                command.data = Bytes::copy_from_slice(&raw[7..7 + lc]);
                command.le = extended_le(u16::from_be_bytes([raw[7 + lc], raw[8 + lc]]));
            } else {
                return Err(Error::InconsistentLength { length });
            }
        }
        command.force_extended = true;

        Ok(command)
    }

    /// Parse a command from a hex string, ignoring whitespace
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let compact: String = hex_str.split_whitespace().collect();
        Self::from_bytes(&hex::decode(compact)?)
    }
}

const fn short_le(byte: u8) -> u32 {
    if byte == 0 { SHORT_MAX_LE } else { byte as u32 }
}

const fn extended_le(value: u16) -> u32 {
    if value == 0 {
        EXTENDED_MAX_LE
    } else {
        value as u32
    }
}

impl TryFrom<&[u8]> for ApduCommand {
    type Error = Error;

    fn try_from(raw: &[u8]) -> Result<Self> {
        Self::from_bytes(raw)
    }
}

impl From<&ApduCommand> for Bytes {
    fn from(command: &ApduCommand) -> Self {
        command.to_bytes()
    }
}

impl fmt::Display for ApduCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.to_bytes()))
    }
}
