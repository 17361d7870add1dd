#![no_main]

use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use snmp_dispatch::mp::MessageProcessor;
use snmp_dispatch::v3::{AuthProtocol, EngineCache, LocalEngine, PrivProtocol, UserTable, UsmUser};

static PROCESSOR: LazyLock<MessageProcessor> = LazyLock::new(|| {
    let users = UserTable::new();
    users.add(
        UsmUser::builder("security")
            .auth(AuthProtocol::Sha512, "password12#$")
            .privacy(PrivProtocol::Aes256, "password12#$%")
            .build(),
    );
    MessageProcessor::new(
        LocalEngine::new(&b"\x80\x00\x13\x70\x05fuzz"[..], 0),
        Arc::new(users),
        Arc::new(EngineCache::new()),
    )
    .with_communities(vec![Bytes::from_static(b"security")])
});

fuzz_target!(|data: &[u8]| {
    let source = SocketAddr::from(([127, 0, 0, 1], 40000));
    let _ = PROCESSOR.prepare_data_elements(Bytes::copy_from_slice(data), source);
});
