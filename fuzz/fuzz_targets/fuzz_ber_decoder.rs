#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use snmp_dispatch::ber::Decoder;
use snmp_dispatch::value::Value;
use snmp_dispatch::varbind::{VarBind, decode_varbind_list};

fuzz_target!(|data: &[u8]| {
    let bytes = Bytes::copy_from_slice(data);

    let mut decoder = Decoder::new(bytes.clone());
    let _ = decoder.read_integer();

    let mut decoder = Decoder::new(bytes.clone());
    let _ = decoder.read_octet_string();

    let mut decoder = Decoder::new(bytes.clone());
    let _ = decoder.read_oid();

    // walk nested TLVs until something fails
    let mut decoder = Decoder::new(bytes.clone());
    while let Ok((_, mut inner)) = decoder.read_tlv() {
        let _ = inner.skip_tlv();
    }

    let mut decoder = Decoder::new(bytes.clone());
    let _ = Value::decode(&mut decoder);

    let mut decoder = Decoder::new(bytes.clone());
    let _ = VarBind::decode(&mut decoder);

    let mut decoder = Decoder::new(bytes);
    let _ = decode_varbind_list(&mut decoder);
});
