//! Constants from ISO/IEC 7816-4 used by the channel stack

/// Command classes
pub mod cla {
    /// Interindustry class, basic logical channel
    pub const ISO7816: u8 = 0x00;
    /// Bit forced on for logical channels 4 to 19
    pub const FURTHER_INTERINDUSTRY: u8 = 0x40;
}

/// Instruction codes
pub mod ins {
    /// MANAGE CHANNEL command
    pub const MANAGE_CHANNEL: u8 = 0x70;
    /// SELECT command
    pub const SELECT: u8 = 0xA4;
    /// GET RESPONSE command
    pub const GET_RESPONSE: u8 = 0xC0;
}

/// Parameter values for SELECT command
pub mod select {
    /// P1: select by DF name
    pub const BY_NAME: u8 = 0x04;
    /// P2: first or only occurrence
    pub const FIRST_OCCURRENCE: u8 = 0x00;
    /// P2: next occurrence
    pub const NEXT_OCCURRENCE: u8 = 0x02;
}

/// Parameter values for MANAGE CHANNEL command
pub mod manage_channel {
    /// P1: open a logical channel
    pub const OPEN: u8 = 0x00;
    /// P1: close a logical channel
    pub const CLOSE: u8 = 0x80;
}

/// Status word first bytes that drive the send loop and event heuristics
pub mod sw1 {
    /// Normal processing, SW2 bytes still available
    pub const MORE_DATA: u8 = 0x61;
    /// Warning, non-volatile memory unchanged
    pub const WARNING_UNCHANGED: u8 = 0x62;
    /// Warning, non-volatile memory changed
    pub const WARNING_CHANGED: u8 = 0x63;
    /// Wrong Le field, SW2 holds the exact length
    pub const WRONG_LE: u8 = 0x6C;
    /// Normal processing
    pub const SUCCESS: u8 = 0x90;
}

/// Largest expected length in short form
pub const SHORT_MAX_LE: u32 = 256;
/// Largest data length in short form
pub const SHORT_MAX_LC: usize = 255;
/// Largest expected length in extended form
pub const EXTENDED_MAX_LE: u32 = 65_536;
/// Largest data length in extended form
pub const EXTENDED_MAX_LC: usize = 65_535;
/// Highest addressable logical channel
pub const MAX_LOGICAL_CHANNEL: u8 = 19;
/// Length of a registered application provider identifier
pub const RID_LENGTH: usize = 5;
