//! Command-set dispatcher
//!
//! A [`CommandSet`] talks to one application on the card. It routes commands
//! through its service pipeline, sends them over a shared channel engine
//! and tracks whether its application is currently selected on its logical
//! channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tracing::{debug, instrument, trace};

use crate::aid::Aid;
use crate::channel::{ApduEventKind, ChannelEvent, SharedChannel, StateListener};
use crate::command::ApduCommand;
use crate::constants::{MAX_LOGICAL_CHANNEL, cla, ins, manage_channel, select};
use crate::response::ApduResponse;
use crate::service::{ApduService, LogicalChannelService, ServicePipeline, ServiceType};
use crate::{Error, Result};

/// Tracks whether an application is selected on a logical channel
///
/// Subscribed to the channel engine by its [`CommandSet`].
#[derive(Debug)]
pub struct SelectionTracker {
    aid: Aid,
    logical_channel: Arc<AtomicU8>,
    selected: AtomicBool,
}

impl SelectionTracker {
    fn new(aid: Aid, logical_channel: Arc<AtomicU8>) -> Self {
        Self {
            aid,
            logical_channel,
            selected: AtomicBool::new(false),
        }
    }

    /// Whether the application is selected
    pub fn is_selected(&self) -> bool {
        self.selected.load(Ordering::Acquire)
    }

    fn set_selected(&self, selected: bool) {
        let previous = self.selected.swap(selected, Ordering::AcqRel);
        if previous != selected {
            trace!(aid = %self.aid, selected, "Selection state changed");
        }
    }

    /// Whether `command` selects this application by name
    fn selects_own_aid(&self, command: &ApduCommand) -> bool {
        command.p1() == select::BY_NAME
            && command.p2() & 0xF0 == 0
            && self.aid.is_prefix_of(command.data())
    }
}

impl StateListener for SelectionTracker {
    fn notify(&self, event: &ChannelEvent) {
        match event {
            ChannelEvent::Connected { .. } | ChannelEvent::Disconnected => {
                self.set_selected(false);
            }
            ChannelEvent::Apdu(apdu)
                if apdu.logical_channel() == self.logical_channel.load(Ordering::Acquire) =>
            {
                match apdu.kind() {
                    ApduEventKind::ManageChannel => self.set_selected(false),
                    ApduEventKind::Select => {
                        self.set_selected(self.selects_own_aid(apdu.command()));
                    }
                }
            }
            _ => {}
        }
    }
}

/// Dispatcher for commands addressed to one application
#[derive(Debug)]
pub struct CommandSet {
    aid: Aid,
    channel: SharedChannel,
    logical_channel: Arc<AtomicU8>,
    services: ServicePipeline,
    tracker: Arc<SelectionTracker>,
}

impl CommandSet {
    /// Create a dispatcher for `aid` on the basic logical channel
    pub fn new(aid: impl Into<Aid>, channel: SharedChannel) -> Self {
        let aid = aid.into();
        let logical_channel = Arc::new(AtomicU8::new(0));
        let tracker = Arc::new(SelectionTracker::new(
            aid.clone(),
            Arc::clone(&logical_channel),
        ));
        channel.lock().add_state_listener(&tracker);

        let mut services = ServicePipeline::new();
        services.add_service(Box::new(LogicalChannelService::new(Arc::clone(
            &logical_channel,
        ))));

        Self {
            aid,
            channel,
            logical_channel,
            services,
            tracker,
        }
    }

    /// Application identifier
    pub const fn aid(&self) -> &Aid {
        &self.aid
    }

    /// Channel engine this dispatcher sends through
    pub const fn channel(&self) -> &SharedChannel {
        &self.channel
    }

    /// Logical channel commands are stamped with
    pub fn logical_channel(&self) -> u8 {
        self.logical_channel.load(Ordering::Acquire)
    }

    /// Change the logical channel used for subsequent commands
    pub fn set_logical_channel(&self, channel: u8) -> Result<()> {
        if channel > MAX_LOGICAL_CHANNEL {
            return Err(Error::InvalidLogicalChannel { channel });
        }
        self.logical_channel.store(channel, Ordering::Release);
        Ok(())
    }

    /// Whether this application is selected on its logical channel
    pub fn is_selected(&self) -> bool {
        self.tracker.is_selected()
    }

    /// Register an additional service
    ///
    /// Later services see commands first and responses last.
    pub fn add_service(&mut self, service: impl ApduService + 'static) -> &mut Self {
        self.services.add_service(Box::new(service));
        self
    }

    /// Send through every registered service
    pub fn send(&self, command: ApduCommand) -> Result<ApduResponse> {
        self.send_with(ServiceType::ALL, command)
    }

    /// Send through logging services only, leaving the command untouched
    pub fn send_as_is(&self, command: ApduCommand) -> Result<ApduResponse> {
        self.send_with(ServiceType::LOGGING, command)
    }

    /// Send through the services whose type is included in `mask`
    #[instrument(level = "debug", skip(self, command), fields(aid = %self.aid))]
    pub fn send_with(&self, mask: ServiceType, command: ApduCommand) -> Result<ApduResponse> {
        let command = self.services.process_command(mask, command)?;
        let response = self.channel.lock().send(&command)?;
        self.services.process_response(mask, response)
    }

    /// Select an application by name
    ///
    /// The status word is not inspected.
    pub fn select_by_aid(&self, aid: &Aid, next: bool) -> Result<ApduResponse> {
        let occurrence = if next {
            select::NEXT_OCCURRENCE
        } else {
            select::FIRST_OCCURRENCE
        };
        let command = ApduCommand::new_with_data_and_le(
            cla::ISO7816,
            ins::SELECT,
            select::BY_NAME,
            occurrence,
            aid.clone(),
            256,
        )?;

        debug!(target_aid = %aid, next, "Selecting application");
        self.send(command)
    }

    /// Select this command set's own application
    pub fn select(&self) -> Result<ApduResponse> {
        self.select_by_aid(&self.aid, false)
    }

    /// Open a new logical channel and return its number
    pub fn open_logical_channel(&self) -> Result<u8> {
        let command = ApduCommand::new_with_le(
            cla::ISO7816,
            ins::MANAGE_CHANNEL,
            manage_channel::OPEN,
            0x00,
            1,
        )?;

        let response = self.send(command)?;
        response.check_sw(0x9000)?.check_data_length(1)?;
        let channel = response.data()[0];

        debug!(channel, "Opened logical channel");
        Ok(channel)
    }

    /// Close this command set's logical channel
    ///
    /// The status word is not inspected.
    pub fn close_logical_channel(&self) -> Result<ApduResponse> {
        let channel = self.logical_channel();
        let command = ApduCommand::new(
            cla::ISO7816,
            ins::MANAGE_CHANNEL,
            manage_channel::CLOSE,
            channel,
        );

        debug!(channel, "Closing logical channel");
        self.send(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ApduChannel, ApduEvent};
    use crate::transport::mock::MockChannel;
    use hex_literal::hex;

    fn ndef_aid() -> Aid {
        Aid::new(hex!("D2760000850101").to_vec())
    }

    fn select_event(channel: u8, p2: u8, data: &[u8]) -> ChannelEvent {
        let command = ApduCommand::new_with_data_and_le(0x00, 0xA4, 0x04, p2, data.to_vec(), 256)
            .unwrap()
            .with_logical_channel(channel)
            .unwrap();
        ChannelEvent::Apdu(ApduEvent::new(
            ApduEventKind::Select,
            command,
            ApduResponse::new(vec![0x90, 0x00]),
        ))
    }

    #[test]
    fn test_tracker_select_rules() {
        let tracker = SelectionTracker::new(ndef_aid(), Arc::new(AtomicU8::new(0)));

        tracker.notify(&select_event(0, 0x00, &hex!("D2760000850101")));
        assert!(tracker.is_selected());

        tracker.notify(&ChannelEvent::Disconnected);
        assert!(!tracker.is_selected());

        // Data extending the AID still selects it
        tracker.notify(&select_event(0, 0x0C, &hex!("D276000085010100")));
        assert!(tracker.is_selected());

        // Next occurrence keeps the high nibble clear
        tracker.notify(&select_event(0, 0x02, &hex!("D2760000850101")));
        assert!(tracker.is_selected());

        // Truncated AID
        tracker.notify(&select_event(0, 0x00, &hex!("D27600008501")));
        assert!(!tracker.is_selected());
    }

    #[test]
    fn test_tracker_ignores_other_channels() {
        let tracker = SelectionTracker::new(ndef_aid(), Arc::new(AtomicU8::new(0)));
        tracker.notify(&select_event(0, 0x00, &hex!("D2760000850101")));

        tracker.notify(&select_event(2, 0x00, &hex!("A000000003")));
        assert!(tracker.is_selected());

        let close = ChannelEvent::Apdu(ApduEvent::new(
            ApduEventKind::ManageChannel,
            ApduCommand::new(0x00, 0x70, 0x80, 0x01),
            ApduResponse::new(vec![0x90, 0x00]),
        ));
        tracker.notify(&close);
        assert!(!tracker.is_selected());
    }

    #[test]
    fn test_set_logical_channel_bounds() {
        let channel = ApduChannel::new(MockChannel::new()).into_shared();
        let set = CommandSet::new(ndef_aid(), channel);

        set.set_logical_channel(19).unwrap();
        assert_eq!(set.logical_channel(), 19);
        assert!(matches!(
            set.set_logical_channel(20),
            Err(Error::InvalidLogicalChannel { channel: 20 })
        ));
        assert_eq!(set.logical_channel(), 19);
    }

    #[test]
    fn test_open_logical_channel() {
        let mock = MockChannel::with_responses([hex!("029000").to_vec(), hex!("6A81").to_vec()]);
        let channel = ApduChannel::new(mock.clone()).into_shared();
        let set = CommandSet::new(ndef_aid(), channel);

        assert_eq!(set.open_logical_channel().unwrap(), 2);
        assert_eq!(mock.sent()[0].as_ref(), &hex!("0070000001"));

        assert!(matches!(
            set.open_logical_channel(),
            Err(Error::StatusMismatch {
                expected: 0x9000,
                actual: 0x6A81
            })
        ));
    }
}
