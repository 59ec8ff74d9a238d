//! Logical channel stamping service

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::trace;

use super::{ApduService, ServiceType};
use crate::command::ApduCommand;
use crate::response::ApduResponse;
use crate::Result;

/// Encodes the owning command set's logical channel into every command
///
/// The channel number is shared with the command set, so changing it there
/// takes effect on the next command.
#[derive(Debug, Clone)]
pub struct LogicalChannelService {
    channel: Arc<AtomicU8>,
}

impl LogicalChannelService {
    /// Create a service stamping the channel held in `channel`
    pub const fn new(channel: Arc<AtomicU8>) -> Self {
        Self { channel }
    }

    /// Channel currently stamped into commands
    pub fn logical_channel(&self) -> u8 {
        self.channel.load(Ordering::Acquire)
    }
}

impl ApduService for LogicalChannelService {
    fn service_type(&self) -> ServiceType {
        ServiceType::LOGICAL_CHANNEL
    }

    fn process_command(&self, mut command: ApduCommand) -> Result<ApduCommand> {
        let channel = self.logical_channel();
        command.set_logical_channel(channel)?;
        trace!(channel, class = command.class(), "Stamped logical channel");
        Ok(command)
    }

    fn process_response(&self, response: ApduResponse) -> Result<ApduResponse> {
        Ok(response)
    }
}
