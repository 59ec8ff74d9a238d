//! Transport contract for card communication
//!
//! A [`CardChannel`] is the raw, half-duplex byte pipe to a secure element.
//! It has no knowledge of APDU structure, continuation procedures or
//! logical channels; the [`ApduChannel`](crate::channel::ApduChannel) engine
//! layers all of that on top.

pub mod error;
pub mod mock;

use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace};

pub use error::TransportError;

/// Reset flavour requested from the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum ResetMode {
    /// Warm reset, the card keeps power
    #[default]
    #[display("warm")]
    Warm,
    /// Cold reset, the card is power cycled
    #[display("cold")]
    Cold,
}

/// Trait for raw card transports
///
/// Implementations own the physical link. Exactly one command may be
/// outstanding at a time.
pub trait CardChannel: Send + fmt::Debug {
    /// Open the underlying link
    fn open(&mut self, exclusive: bool) -> Result<(), TransportError>;

    /// Whether the link is open
    fn is_open(&self) -> bool;

    /// Connect to the card and return its answer-to-reset
    fn connect(&mut self, params: Option<&[u8]>) -> Result<Bytes, TransportError>;

    /// Reset the card and return the new answer-to-reset
    fn reset(&mut self, mode: ResetMode) -> Result<Bytes, TransportError>;

    /// Disconnect from the card
    fn disconnect(&mut self, params: Option<&[u8]>) -> Result<(), TransportError>;

    /// Close the underlying link
    fn close(&mut self) -> Result<(), TransportError>;

    /// Whether a card is connected
    fn is_connected(&self) -> bool;

    /// Send raw APDU bytes and return the raw response bytes
    fn transmit(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;
}

/// Transmit through a transport with trace logging of both directions
pub(crate) fn transmit_logged(
    transport: &mut dyn CardChannel,
    command: &[u8],
) -> Result<Bytes, TransportError> {
    trace!(command = %hex::encode(command), "Transmitting raw command");
    let result = transport.transmit(command);
    match &result {
        Ok(response) => {
            trace!(response = %hex::encode(response), "Received raw response");
        }
        Err(e) => {
            debug!(error = ?e, "Transport error during transmission");
        }
    }
    result
}
