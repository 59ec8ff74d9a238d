//! Events emitted by the channel engine

use crate::atr::Atr;
use crate::command::ApduCommand;
use crate::response::ApduResponse;

/// Kind of command that produced an [`ApduEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ApduEventKind {
    /// A SELECT command completed
    #[display("select")]
    Select,
    /// A MANAGE CHANNEL command completed
    #[display("manage channel")]
    ManageChannel,
}

/// A state-relevant command together with its final response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduEvent {
    kind: ApduEventKind,
    command: ApduCommand,
    response: ApduResponse,
}

impl ApduEvent {
    /// Create a new event
    pub const fn new(kind: ApduEventKind, command: ApduCommand, response: ApduResponse) -> Self {
        Self {
            kind,
            command,
            response,
        }
    }

    /// Event kind
    pub const fn kind(&self) -> ApduEventKind {
        self.kind
    }

    /// Command as originally sent
    pub const fn command(&self) -> &ApduCommand {
        &self.command
    }

    /// Final response after continuations were resolved
    pub const fn response(&self) -> &ApduResponse {
        &self.response
    }

    /// Logical channel the command was addressed to
    pub const fn logical_channel(&self) -> u8 {
        self.command.logical_channel()
    }
}

/// Lifecycle and state events delivered to listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The card answered to a connect or reset
    Connected {
        /// Answer-to-reset
        atr: Atr,
    },
    /// The card was disconnected
    Disconnected,
    /// A send started while the channel was idle
    Busy,
    /// No send happened during the idle delay
    Idle,
    /// A SELECT or MANAGE CHANNEL command completed
    Apdu(ApduEvent),
}

impl ChannelEvent {
    /// Command event payload, if any
    pub const fn as_apdu(&self) -> Option<&ApduEvent> {
        match self {
            Self::Apdu(event) => Some(event),
            _ => None,
        }
    }
}
