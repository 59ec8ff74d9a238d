//! Command-set dispatch, service ordering and selection tracking

use std::sync::Arc;

use hex_literal::hex;
use nexum_apdu_channel::prelude::*;
use nexum_apdu_channel::transport::mock::MockChannel;
use nexum_apdu_channel::LoggingService;
use parking_lot::Mutex;

fn ndef_aid() -> Aid {
    Aid::new(hex!("D2760000850101").to_vec())
}

fn shared(mock: &MockChannel) -> SharedChannel {
    ApduChannel::new(mock.clone()).into_shared()
}

/// Appends a marker byte to command data and prepends one to response data
#[derive(Debug)]
struct Tagger {
    tag: u8,
    kind: ServiceType,
    seen: Arc<Mutex<Vec<String>>>,
}

impl ApduService for Tagger {
    fn service_type(&self) -> ServiceType {
        self.kind
    }

    fn process_command(&self, command: ApduCommand) -> Result<ApduCommand> {
        self.seen.lock().push(format!("cmd {:02X}", self.tag));
        let mut data = command.data().to_vec();
        data.push(self.tag);
        command.with_data(data)
    }

    fn process_response(&self, response: ApduResponse) -> Result<ApduResponse> {
        self.seen.lock().push(format!("rsp {:02X}", self.tag));
        let mut data = vec![self.tag];
        data.extend_from_slice(response.data());
        Ok(ApduResponse::from_parts(&data, response.status()))
    }
}

#[test]
fn select_encodes_and_tracks_selection() {
    let mock = MockChannel::with_responses([hex!("9000").to_vec()]);
    let channel = shared(&mock);
    let set = CommandSet::new(ndef_aid(), channel.clone());
    assert!(!set.is_selected());

    let response = set.select().unwrap();
    assert!(response.is_success());
    assert_eq!(mock.sent()[0].as_ref(), &hex!("00A4040007D276000085010100"));
    assert!(set.is_selected());

    channel.lock().disconnect(None).unwrap();
    assert!(!set.is_selected());
}

#[test]
fn select_next_occurrence_and_foreign_aid() {
    let mock = MockChannel::with_responses([hex!("9000").to_vec(), hex!("9000").to_vec()]);
    let channel = shared(&mock);
    let set = CommandSet::new(ndef_aid(), channel);

    set.select_by_aid(&ndef_aid(), true).unwrap();
    assert_eq!(mock.sent()[0][3], 0x02);
    assert!(set.is_selected());

    let other = Aid::from_hex("A000000151000000").unwrap();
    set.select_by_aid(&other, false).unwrap();
    assert!(!set.is_selected());
}

#[test]
fn failed_select_keeps_previous_state() {
    let mock = MockChannel::with_responses([hex!("9000").to_vec(), hex!("6A82").to_vec()]);
    let set = CommandSet::new(ndef_aid(), shared(&mock));

    set.select().unwrap();
    let response = set.select().unwrap();
    assert_eq!(response.sw(), 0x6A82);
    assert!(set.is_selected());
}

#[test]
fn selection_is_per_logical_channel() {
    let mock = MockChannel::with_responses([hex!("9000").to_vec(), hex!("9000").to_vec()]);
    let channel = shared(&mock);
    let basic = CommandSet::new(ndef_aid(), channel.clone());
    let second = CommandSet::new(ndef_aid(), channel);
    second.set_logical_channel(1).unwrap();

    second.select().unwrap();
    assert_eq!(mock.sent()[0][0], 0x01);
    assert!(second.is_selected());
    assert!(!basic.is_selected());

    second.close_logical_channel().unwrap();
    assert_eq!(mock.sent()[1].as_ref(), &hex!("01708001"));
    assert!(!second.is_selected());
}

#[test]
fn services_run_in_reverse_then_forward_order() {
    let mock = MockChannel::with_responses([hex!("55669000").to_vec()]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut set = CommandSet::new(ndef_aid(), shared(&mock));
    set.add_service(Tagger {
        tag: 0xA1,
        kind: ServiceType::SECURE_MESSAGING,
        seen: seen.clone(),
    });
    set.add_service(Tagger {
        tag: 0xB2,
        kind: ServiceType::SECURE_MESSAGING,
        seen: seen.clone(),
    });

    let command = ApduCommand::new_with_data(0x00, 0xD6, 0x00, 0x00, vec![0x00]).unwrap();
    let response = set.send(command).unwrap();

    // Last registered wraps first, so its tag sits innermost
    assert_eq!(mock.sent()[0].as_ref(), &hex!("00D6000003 00B2A1"));
    assert_eq!(response.data(), &hex!("B2A15566"));
    assert_eq!(
        *seen.lock(),
        vec!["cmd B2", "cmd A1", "rsp A1", "rsp B2"]
    );
}

#[test]
fn send_as_is_skips_non_logging_services() {
    let mock = MockChannel::with_responses([hex!("9000").to_vec(), hex!("9000").to_vec()]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut set = CommandSet::new(ndef_aid(), shared(&mock));
    set.add_service(LoggingService::new());
    set.add_service(Tagger {
        tag: 0xEE,
        kind: ServiceType::SECURE_MESSAGING,
        seen: seen.clone(),
    });
    set.set_logical_channel(2).unwrap();

    let command = ApduCommand::new(0x00, 0xB0, 0x00, 0x00);
    set.send_as_is(command.clone()).unwrap();
    assert_eq!(mock.sent()[0].as_ref(), &hex!("00B00000"));
    assert!(seen.lock().is_empty());

    set.send_with(ServiceType::LOGICAL_CHANNEL | ServiceType::LOGGING, command)
        .unwrap();
    assert_eq!(mock.sent()[1].as_ref(), &hex!("02B00000"));
    assert!(seen.lock().is_empty());
}

#[test]
fn service_errors_abort_the_send() {
    let mock = MockChannel::new();
    let set = CommandSet::new(ndef_aid(), shared(&mock));
    set.set_logical_channel(1).unwrap();

    // 0x20 cannot carry a logical channel
    let command = ApduCommand::new(0x20, 0xB0, 0x00, 0x00);
    assert!(matches!(
        set.send(command),
        Err(Error::InvalidClassForChannel { .. })
    ));
    assert!(mock.sent().is_empty());
}

#[test]
fn dropped_command_set_is_pruned() {
    let mock = MockChannel::with_responses([hex!("9000").to_vec()]);
    let channel = shared(&mock);
    let set = CommandSet::new(ndef_aid(), channel.clone());
    drop(set);

    let survivor = CommandSet::new(ndef_aid(), channel);
    survivor.select().unwrap();
    assert!(survivor.is_selected());
}
