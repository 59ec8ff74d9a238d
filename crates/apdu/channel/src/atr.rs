//! Answer-to-reset

use std::fmt;

use bytes::Bytes;

/// Answer To Reset returned by the card on connect or reset
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Deref)]
pub struct Atr(Bytes);

impl Atr {
    /// Wrap raw ATR bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Raw ATR bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Atr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atr_display() {
        let atr = Atr::new(vec![0x3B, 0x8F, 0x80, 0x01]);
        assert_eq!(atr.to_string(), "3B8F8001");
        assert_eq!(atr.as_bytes(), &[0x3B, 0x8F, 0x80, 0x01]);
    }
}
