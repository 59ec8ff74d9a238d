//! Channel engine
//!
//! [`ApduChannel`] drives a [`CardChannel`] transport: it encodes commands,
//! resolves T=0 continuation procedures (GET RESPONSE chaining and Le
//! correction), tracks connection state and publishes [`ChannelEvent`]s to
//! weakly held listeners.

pub mod config;
pub mod event;
pub mod idle;
pub mod listener;

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, instrument, trace, warn};

use crate::atr::Atr;
use crate::command::ApduCommand;
use crate::constants::{ins, sw1};
use crate::response::ApduResponse;
use crate::transport::{CardChannel, ResetMode, transmit_logged};
use crate::{Error, Result};

pub use config::{ChannelConfig, GetResponseClass};
pub use event::{ApduEvent, ApduEventKind, ChannelEvent};
pub use idle::IdleScheduler;
pub use listener::{ListenerRegistry, StateListener};

/// Channel engine shared between command sets
pub type SharedChannel = Arc<Mutex<ApduChannel>>;

/// APDU channel engine over a raw card transport
#[derive(Debug)]
pub struct ApduChannel {
    transport: Option<Box<dyn CardChannel>>,
    config: ChannelConfig,
    atr: Option<Atr>,
    /// Whether this engine opened the transport and must close it
    opened: bool,
    busy: bool,
    listeners: Arc<ListenerRegistry>,
    idle: IdleScheduler,
}

impl ApduChannel {
    /// Create an engine over `transport` with the default configuration
    pub fn new(transport: impl CardChannel + 'static) -> Self {
        Self::with_config(transport, ChannelConfig::default())
    }

    /// Create an engine over `transport` with a custom configuration
    pub fn with_config(transport: impl CardChannel + 'static, config: ChannelConfig) -> Self {
        let mut channel = Self::detached(config);
        channel.transport = Some(Box::new(transport));
        channel
    }

    /// Create an engine without a transport
    ///
    /// Every transport operation fails with [`Error::NoChannel`] until one is
    /// attached.
    pub fn detached(config: ChannelConfig) -> Self {
        Self {
            transport: None,
            config,
            atr: None,
            opened: false,
            busy: false,
            listeners: Arc::new(ListenerRegistry::new()),
            idle: IdleScheduler::new(),
        }
    }

    /// Wrap the engine for sharing between command sets
    pub fn into_shared(self) -> SharedChannel {
        Arc::new(Mutex::new(self))
    }

    /// Attach a transport, returning the previous one
    pub fn attach(&mut self, transport: impl CardChannel + 'static) -> Option<Box<dyn CardChannel>> {
        let previous = self.detach();
        self.transport = Some(Box::new(transport));
        previous
    }

    /// Detach the transport without closing it
    pub fn detach(&mut self) -> Option<Box<dyn CardChannel>> {
        self.atr = None;
        self.opened = false;
        self.transport.take()
    }

    /// Engine configuration
    pub const fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Answer-to-reset of the connected card
    pub const fn atr(&self) -> Option<&Atr> {
        self.atr.as_ref()
    }

    /// Whether a send is in progress
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Whether the transport reports a connected card
    pub fn is_connected(&self) -> bool {
        self.transport
            .as_deref()
            .is_some_and(|transport| transport.is_connected())
    }

    /// Register a listener; the engine holds it weakly
    pub fn add_state_listener<L: StateListener + 'static>(&self, listener: &Arc<L>) {
        self.listeners.add(listener::downgrade(listener));
    }

    /// Unregister a listener; returns whether it was registered
    pub fn remove_state_listener<L: StateListener + 'static>(&self, listener: &Arc<L>) -> bool {
        self.listeners.remove(&listener::downgrade(listener))
    }

    /// Connect to the card, opening the transport first if needed
    #[instrument(level = "debug", skip_all, err)]
    pub fn connect(&mut self, params: Option<&[u8]>) -> Result<Atr> {
        let exclusive = self.config.exclusive;
        let transport = self.transport.as_deref_mut().ok_or(Error::NoChannel)?;

        if !transport.is_open() {
            debug!(exclusive, "Opening transport");
            transport.open(exclusive)?;
            self.opened = true;
        }

        let atr = Atr::new(transport.connect(params)?);
        debug!(atr = %atr, "Card connected");

        self.atr = Some(atr.clone());
        self.listeners
            .notify(&ChannelEvent::Connected { atr: atr.clone() });
        Ok(atr)
    }

    /// Disconnect from the card
    ///
    /// The transport is closed only if this engine opened it. `Disconnected`
    /// is emitted even when the transport reports an error.
    #[instrument(level = "debug", skip_all, err)]
    pub fn disconnect(&mut self, params: Option<&[u8]>) -> Result<()> {
        let transport = self.transport.as_deref_mut().ok_or(Error::NoChannel)?;

        let mut result = Ok(());
        if transport.is_open() {
            result = transport.disconnect(params);

            if self.opened {
                match transport.close() {
                    Ok(()) => self.opened = false,
                    Err(e) if result.is_err() => {
                        trace!(error = %e, "Ignoring close failure after failed disconnect");
                    }
                    Err(e) => result = Err(e),
                }
            }
        }

        self.atr = None;
        debug!("Card disconnected");
        self.listeners.notify(&ChannelEvent::Disconnected);
        result.map_err(Error::from)
    }

    /// Reset the card
    #[instrument(level = "debug", skip(self), err)]
    pub fn reset(&mut self, mode: ResetMode) -> Result<Atr> {
        let transport = self.transport.as_deref_mut().ok_or(Error::NoChannel)?;

        let atr = Atr::new(transport.reset(mode)?);
        debug!(atr = %atr, "Card reset");

        self.atr = Some(atr.clone());
        self.listeners
            .notify(&ChannelEvent::Connected { atr: atr.clone() });
        Ok(atr)
    }

    /// Send a command and return the final response
    ///
    /// `61 XX` responses are followed by GET RESPONSE and the fragments
    /// concatenated; `6C XX` responses cause the command to be resent with
    /// the corrected Le. A transport failure disconnects the channel.
    #[instrument(level = "debug", skip_all, fields(command = %command), err)]
    pub fn send(&mut self, command: &ApduCommand) -> Result<ApduResponse> {
        if self.transport.is_none() {
            return Err(Error::NoChannel);
        }

        if !self.idle.cancel() {
            self.listeners.notify(&ChannelEvent::Busy);
        }
        self.busy = true;

        let result = self.exchange(command);

        if let Ok(response) = &result {
            if let Some(kind) = command_event_kind(command, response) {
                trace!(%kind, "Publishing command event");
                self.listeners.notify(&ChannelEvent::Apdu(ApduEvent::new(
                    kind,
                    command.clone(),
                    response.clone(),
                )));
            }
        }

        self.busy = false;
        self.idle
            .schedule(self.config.idle_delay, Arc::clone(&self.listeners));

        result
    }

    fn exchange(&mut self, command: &ApduCommand) -> Result<ApduResponse> {
        let mut response = self.transmit(command)?;
        let mut current = command.clone();
        let mut continuations = 0;

        while let Some(le) = response.status().announced_length() {
            if let Some(limit) = self.config.max_continuations {
                if continuations >= limit {
                    warn!(limit, sw = %response.status(), "Continuation limit reached");
                    return Err(Error::ContinuationLimit { limit });
                }
            }
            continuations += 1;

            current = if response.status().is_more_data_available() {
                let class = self.config.get_response_class.class_for(command.class());
                trace!(le, class, "Fetching remaining response data");
                ApduCommand::new(class, ins::GET_RESPONSE, 0x00, 0x00).with_le(le)?
            } else {
                trace!(le, "Resending with corrected Le");
                current.with_le(le)?
            };

            let fragment = self.transmit(&current)?;
            response.append_response(&fragment);
        }

        Ok(response)
    }

    fn transmit(&mut self, command: &ApduCommand) -> Result<ApduResponse> {
        let transport = self.transport.as_deref_mut().ok_or(Error::NoChannel)?;

        let started = Instant::now();
        match transmit_logged(transport, &command.to_bytes()) {
            Ok(raw) => Ok(ApduResponse::with_execution_time(raw, started.elapsed())),
            Err(e) => {
                warn!(error = %e, "Transport failure, disconnecting");
                if let Err(disconnect_error) = self.disconnect(None) {
                    debug!(error = %disconnect_error, "Disconnect after transport failure failed");
                }
                Err(e.into())
            }
        }
    }
}

/// Event kind for a completed command, if the command changes card state
fn command_event_kind(command: &ApduCommand, response: &ApduResponse) -> Option<ApduEventKind> {
    let status = response.sw1();
    match command.instruction() {
        ins::MANAGE_CHANNEL if matches!(status, sw1::WRONG_LE | sw1::SUCCESS) => {
            Some(ApduEventKind::ManageChannel)
        }
        ins::SELECT
            if matches!(
                status,
                sw1::MORE_DATA
                    | sw1::WARNING_UNCHANGED
                    | sw1::WARNING_CHANGED
                    | sw1::WRONG_LE
                    | sw1::SUCCESS
            ) =>
        {
            Some(ApduEventKind::Select)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockChannel;
    use hex_literal::hex;

    #[test]
    fn test_command_event_kind() {
        let select = ApduCommand::new(0x00, ins::SELECT, 0x04, 0x00);
        let manage = ApduCommand::new(0x00, ins::MANAGE_CHANNEL, 0x00, 0x00);
        let read = ApduCommand::new(0x00, 0xB0, 0x00, 0x00);

        let ok = ApduResponse::new(hex!("9000").to_vec());
        let warning = ApduResponse::new(hex!("6283").to_vec());
        let not_found = ApduResponse::new(hex!("6A82").to_vec());

        assert_eq!(
            command_event_kind(&select, &ok),
            Some(ApduEventKind::Select)
        );
        assert_eq!(
            command_event_kind(&select, &warning),
            Some(ApduEventKind::Select)
        );
        assert_eq!(command_event_kind(&select, &not_found), None);
        assert_eq!(
            command_event_kind(&manage, &ok),
            Some(ApduEventKind::ManageChannel)
        );
        assert_eq!(command_event_kind(&manage, &warning), None);
        assert_eq!(command_event_kind(&read, &ok), None);
    }

    #[test]
    fn test_no_transport() {
        let mut channel = ApduChannel::detached(ChannelConfig::default());
        let cmd = ApduCommand::new(0x00, 0xB0, 0x00, 0x00);

        assert!(matches!(channel.send(&cmd), Err(Error::NoChannel)));
        assert!(matches!(channel.connect(None), Err(Error::NoChannel)));
        assert!(matches!(channel.disconnect(None), Err(Error::NoChannel)));
        assert!(matches!(
            channel.reset(ResetMode::Warm),
            Err(Error::NoChannel)
        ));
        assert!(!channel.idle.is_pending());
    }

    #[test]
    fn test_get_response_class_policy() {
        let mock = MockChannel::with_responses([hex!("6102").to_vec(), hex!("01029000").to_vec()]);
        let config =
            ChannelConfig::default().with_get_response_class(GetResponseClass::LogicalChannel);
        let mut channel = ApduChannel::with_config(mock.clone(), config);

        let cmd = ApduCommand::new_with_le(0x82, 0xCA, 0x00, 0x00, 256).unwrap();
        let response = channel.send(&cmd).unwrap();

        assert_eq!(response.as_bytes(), &hex!("01029000"));
        assert_eq!(mock.sent()[1].as_ref(), &hex!("02C0000002"));
    }

    #[test]
    fn test_continuation_limit() {
        let mock = MockChannel::with_responses([
            hex!("6101").to_vec(),
            hex!("016101").to_vec(),
            hex!("029000").to_vec(),
        ]);
        let config = ChannelConfig::default().with_max_continuations(Some(1));
        let mut channel = ApduChannel::with_config(mock.clone(), config);

        let cmd = ApduCommand::new_with_le(0x00, 0xB0, 0x00, 0x00, 256).unwrap();
        assert!(matches!(
            channel.send(&cmd),
            Err(Error::ContinuationLimit { limit: 1 })
        ));
        assert_eq!(mock.sent().len(), 2);
        assert!(!channel.is_busy());
    }
}
