#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use snmp_dispatch::ber::Decoder;
use snmp_dispatch::message::{CommunityMessage, Message, V3Message};
use snmp_dispatch::pdu::AnyPdu;
use snmp_dispatch::v3::UsmSecurityParams;

fuzz_target!(|data: &[u8]| {
    let bytes = Bytes::copy_from_slice(data);

    let _ = Message::decode(bytes.clone());
    let _ = CommunityMessage::decode(bytes.clone());
    let _ = V3Message::decode(bytes.clone());
    let _ = UsmSecurityParams::decode(bytes.clone());

    let mut decoder = Decoder::new(bytes);
    let _ = AnyPdu::decode(&mut decoder);
});
