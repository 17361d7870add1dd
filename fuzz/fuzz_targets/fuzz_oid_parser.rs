#![no_main]

use libfuzzer_sys::fuzz_target;

use snmp_dispatch::oid::Oid;

fuzz_target!(|data: &[u8]| {
    if let Ok(oid) = Oid::from_ber(data) {
        // anything that decodes must survive the text form
        let _ = Oid::parse(&oid.to_string());
    }

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = Oid::parse(s);
    }
});
