//! Message processing benchmarks.
//!
//! Inbound processing runs once per received datagram, so decode plus the
//! USM checks bound listener throughput.

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use snmp_dispatch::message::{CommunityMessage, Message, SecurityLevel};
use snmp_dispatch::mp::MessageProcessor;
use snmp_dispatch::v3::{AuthProtocol, EngineCache, EngineState, LocalEngine, PrivProtocol, UserTable, UsmUser};
use snmp_dispatch::{Pdu, Target, UserTarget, Value, VarBind, Version, notification, oid};
use std::hint::black_box;
use std::net::SocketAddr;
use std::sync::Arc;

const AGENT_ENGINE: &[u8] = b"\x80\x00\x13\x70\x05\x01\x02\x03\x04\x05\x06\x07\x08";

fn users() -> Arc<UserTable> {
    let table = UserTable::new();
    table.add(
        UsmUser::builder("security")
            .auth(AuthProtocol::Sha512, "password12#$")
            .privacy(PrivProtocol::Aes256, "password12#$%")
            .build(),
    );
    table.add(
        UsmUser::builder("auth-only")
            .auth(AuthProtocol::Sha512, "password12#$")
            .build(),
    );
    Arc::new(table)
}

fn trap_payload(count: usize) -> Vec<VarBind> {
    (0..count)
        .map(|i| VarBind::new(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 8).child(i as u32 + 1), Value::Integer(2)))
        .collect()
}

/// Decoding community notifications of increasing size.
fn bench_community_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("community_decode");
    for count in [1, 10, 50] {
        let trap = notification::trap_v2(1, 100, oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 3), trap_payload(count));
        let data = CommunityMessage::new(Version::V2c, Bytes::from_static(b"security"), trap)
            .unwrap()
            .encode();
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &data, |b, data| {
            b.iter(|| black_box(Message::decode(data.clone())))
        });
    }
    group.finish();
}

/// Full inbound processing of an authPriv request (decode, HMAC verify,
/// time window, AES decrypt).
fn bench_usm_inbound(c: &mut Criterion) {
    let agent_addr: SocketAddr = "127.0.0.1:161".parse().unwrap();
    let manager_addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
    let agent = MessageProcessor::new(LocalEngine::new(AGENT_ENGINE, 0), users(), Arc::new(EngineCache::new()));
    let manager = MessageProcessor::new(
        LocalEngine::new(&b"manager"[..], 0),
        users(),
        Arc::new(EngineCache::new()),
    );
    manager
        .engines()
        .insert(Some(agent_addr), EngineState::new(AGENT_ENGINE, 0, agent.local_engine().engine_time()));

    let mut group = c.benchmark_group("usm_inbound");
    for (user, level) in [
        (&b"auth-only"[..], SecurityLevel::AuthNoPriv),
        (&b"security"[..], SecurityLevel::AuthPriv),
    ] {
        let target: Target = UserTarget::new(agent_addr, user, level).into();
        let request = Pdu::get_request(1, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let data = manager.prepare_outgoing_message(&target, request.into(), 1).unwrap();
        // first call localizes the keys
        agent.prepare_data_elements(data.clone(), manager_addr).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(level), &data, |b, data| {
            b.iter(|| black_box(agent.prepare_data_elements(data.clone(), manager_addr).is_ok()))
        });
    }
    group.finish();
}

/// Outbound authPriv notification: encrypt then sign.
fn bench_usm_outbound(c: &mut Criterion) {
    let sender = MessageProcessor::new(LocalEngine::new(AGENT_ENGINE, 0), users(), Arc::new(EngineCache::new()));
    let target: Target = UserTarget::new("127.0.0.1:162".parse().unwrap(), &b"security"[..], SecurityLevel::AuthPriv).into();
    let trap = notification::trap_v2(1, 100, oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 3), trap_payload(10));
    let _ = sender.prepare_outgoing_message(&target, trap.clone().into(), 1);

    c.bench_function("usm_outbound_auth_priv_trap", |b| {
        b.iter(|| black_box(sender.prepare_outgoing_message(&target, trap.clone().into(), 1)))
    });
}

criterion_group!(benches, bench_community_decode, bench_usm_inbound, bench_usm_outbound);
criterion_main!(benches);
