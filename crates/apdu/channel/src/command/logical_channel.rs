//! Logical channel encoding in the class byte
//!
//! Channels 0-3 use the first interindustry class layout (channel number in
//! bits 1-2), channels 4-19 the further interindustry layout (bit 7 set,
//! channel number minus four in the low nibble).

use crate::constants::{MAX_LOGICAL_CHANNEL, cla};
use crate::{Error, Result};

use super::ApduCommand;

/// Whether a class high nibble may carry a basic channel number (0-3)
const fn is_first_interindustry(nibble: u8) -> bool {
    matches!(nibble, 0x0 | 0x1 | 0x8 | 0x9 | 0xA | 0xB)
}

/// Whether a class high nibble may carry an extended channel number (4-19)
const fn is_further_interindustry(nibble: u8) -> bool {
    matches!(nibble, 0x4 | 0x5 | 0x6 | 0x7 | 0xC | 0xD | 0xE | 0xF)
}

/// Encode `channel` into `class`
///
/// Returns the new class byte, leaving the caller's value untouched on error.
pub fn encode_class(class: u8, channel: u8) -> Result<u8> {
    if channel > MAX_LOGICAL_CHANNEL {
        return Err(Error::InvalidLogicalChannel { channel });
    }

    if channel < 4 {
        if !is_first_interindustry(class >> 4) {
            return Err(Error::InvalidClassForChannel { cla: class, channel });
        }
        return Ok((class & !0x03) | channel);
    }

    let widened = class | cla::FURTHER_INTERINDUSTRY;
    if !is_further_interindustry(widened >> 4) {
        return Err(Error::InvalidClassForChannel { cla: class, channel });
    }
    Ok((widened & 0xF0) | (channel - 4))
}

/// Extract the logical channel number carried by `class`
///
/// Classes outside both interindustry layouts report channel 0.
pub const fn decode_class(class: u8) -> u8 {
    let nibble = class >> 4;
    if is_first_interindustry(nibble) {
        class & 0x03
    } else if is_further_interindustry(nibble) {
        (class & 0x0F) + 4
    } else {
        0
    }
}

impl ApduCommand {
    /// Logical channel encoded in the class byte
    pub const fn logical_channel(&self) -> u8 {
        decode_class(self.class())
    }

    /// Encode a logical channel number into the class byte
    pub fn set_logical_channel(&mut self, channel: u8) -> Result<&mut Self> {
        let class = encode_class(self.class(), channel)?;
        self.set_class(class);
        Ok(self)
    }

    /// Builder form of [`set_logical_channel`](Self::set_logical_channel)
    pub fn with_logical_channel(mut self, channel: u8) -> Result<Self> {
        self.set_logical_channel(channel)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_channels() {
        let mut cmd = ApduCommand::new(0x00, 0xA4, 0x04, 0x00);
        cmd.set_logical_channel(3).unwrap();
        assert_eq!(cmd.class(), 0x03);
        assert_eq!(cmd.logical_channel(), 3);

        cmd.set_logical_channel(1).unwrap();
        assert_eq!(cmd.class(), 0x01);

        let cmd = ApduCommand::new(0x80, 0xCA, 0x00, 0x00)
            .with_logical_channel(2)
            .unwrap();
        assert_eq!(cmd.class(), 0x82);
    }

    #[test]
    fn test_further_channels() {
        let cmd = ApduCommand::new(0x00, 0xB0, 0x00, 0x00)
            .with_logical_channel(4)
            .unwrap();
        assert_eq!(cmd.class(), 0x40);
        assert_eq!(cmd.logical_channel(), 4);

        let cmd = ApduCommand::new(0x00, 0xB0, 0x00, 0x00)
            .with_logical_channel(19)
            .unwrap();
        assert_eq!(cmd.class(), 0x4F);
        assert_eq!(cmd.logical_channel(), 19);

        // Proprietary class keeps its high bit
        let cmd = ApduCommand::new(0x80, 0xCA, 0x00, 0x00)
            .with_logical_channel(7)
            .unwrap();
        assert_eq!(cmd.class(), 0xC3);
    }

    #[test]
    fn test_channel_round_trip() {
        for class in [0x00, 0x10, 0x80, 0x90, 0xA0, 0xB0] {
            for channel in 0..=MAX_LOGICAL_CHANNEL {
                let cmd = ApduCommand::new(class, 0xA4, 0x04, 0x00)
                    .with_logical_channel(channel)
                    .unwrap();
                assert_eq!(cmd.logical_channel(), channel, "class {class:02X}");
            }
        }
    }

    #[test]
    fn test_basic_channel_rejects_foreign_nibbles() {
        for nibble in [0x2, 0x3, 0x4, 0x5, 0x6, 0x7, 0xC, 0xD, 0xE, 0xF] {
            let class = (nibble << 4) | 0x05;
            for channel in 0..4 {
                let mut cmd = ApduCommand::new(class, 0xA4, 0x04, 0x00);
                let err = cmd.set_logical_channel(channel).unwrap_err();
                assert!(
                    matches!(err, Error::InvalidClassForChannel { cla, channel: c } if cla == class && c == channel),
                    "class {class:02X} channel {channel}"
                );
                assert_eq!(cmd.class(), class);
            }
        }
    }

    #[test]
    fn test_further_channel_widens_class() {
        // Bit 7 is forced, so 0x3_ and 0x2_ land in the further layout
        let cmd = ApduCommand::new(0x30, 0xA4, 0x04, 0x00)
            .with_logical_channel(4)
            .unwrap();
        assert_eq!(cmd.class(), 0x70);

        let cmd = ApduCommand::new(0x25, 0xA4, 0x04, 0x00)
            .with_logical_channel(10)
            .unwrap();
        assert_eq!(cmd.class(), 0x66);
        assert_eq!(cmd.logical_channel(), 10);
    }

    #[test]
    fn test_invalid_channel_leaves_class() {
        let mut cmd = ApduCommand::new(0x00, 0xA4, 0x04, 0x00);
        assert!(matches!(
            cmd.set_logical_channel(20),
            Err(Error::InvalidLogicalChannel { channel: 20 })
        ));
        assert_eq!(cmd.class(), 0x00);

        // 0x20 carries neither layout
        let mut cmd = ApduCommand::new(0x20, 0xA4, 0x04, 0x00);
        assert!(matches!(
            cmd.set_logical_channel(1),
            Err(Error::InvalidClassForChannel { channel: 1, .. })
        ));
        assert_eq!(cmd.class(), 0x20);

        // Further interindustry class cannot carry channels 0-3
        let mut cmd = ApduCommand::new(0x45, 0xA4, 0x04, 0x00);
        assert!(cmd.set_logical_channel(2).is_err());
        assert_eq!(cmd.class(), 0x45);
    }

    #[test]
    fn test_decode_unknown_layout() {
        assert_eq!(decode_class(0x20), 0);
        assert_eq!(decode_class(0x31), 0);
        assert_eq!(decode_class(0xE2), 6);
    }
}
