//! Configuration options for the channel engine

use std::time::Duration;

use crate::command::logical_channel::{decode_class, encode_class};
use crate::constants::cla;

/// Default debounce delay before the idle notification fires
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(200);

/// Class byte used for GET RESPONSE continuation commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GetResponseClass {
    /// Always `0x00`
    #[default]
    Iso,
    /// `0x00` carrying the logical channel of the original command
    LogicalChannel,
    /// The class byte of the original command, unchanged
    Original,
}

impl GetResponseClass {
    /// Class byte to use for a GET RESPONSE following a command sent with `original`
    pub fn class_for(self, original: u8) -> u8 {
        match self {
            Self::Iso => cla::ISO7816,
            Self::LogicalChannel => {
                encode_class(cla::ISO7816, decode_class(original)).unwrap_or(cla::ISO7816)
            }
            Self::Original => original,
        }
    }
}

/// Configuration options for an [`ApduChannel`](super::ApduChannel)
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Request exclusive access when the engine opens the transport
    pub exclusive: bool,

    /// Quiet period after a send before the idle notification fires
    pub idle_delay: Duration,

    /// Class byte policy for GET RESPONSE
    pub get_response_class: GetResponseClass,

    /// Maximum number of GET RESPONSE / Le correction round trips per send
    pub max_continuations: Option<usize>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            exclusive: false,
            idle_delay: DEFAULT_IDLE_DELAY,
            get_response_class: GetResponseClass::Iso,
            max_continuations: None,
        }
    }
}

impl ChannelConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to open the transport exclusively
    pub const fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Set the idle debounce delay
    pub const fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Set the GET RESPONSE class policy
    pub const fn with_get_response_class(mut self, policy: GetResponseClass) -> Self {
        self.get_response_class = policy;
        self
    }

    /// Cap the number of continuation round trips
    pub const fn with_max_continuations(mut self, limit: Option<usize>) -> Self {
        self.max_continuations = limit;
        self
    }
}
