//! Listener behaviour over loopback UDP: binding, community notifications,
//! malformed input and community requests.

mod common;

use std::time::Duration;

use bytes::Bytes;
use common::*;
use snmp_dispatch::message::CommunityMessage;
use snmp_dispatch::notification;
use snmp_dispatch::{
    CommunityTarget, ErrorStatus, Error, Pdu, PduType, Response, TrapV1Pdu, Value, VarBind, Version,
};
use tokio::net::UdpSocket;

async fn raw_socket() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

#[tokio::test]
async fn listener_binds_configured_address() {
    let dispatcher = demo_builder().build().await.unwrap();
    let addr = dispatcher.local_addr();
    assert!(addr.ip().is_loopback());
    assert_ne!(addr.port(), 0);
    assert_eq!(dispatcher.engine_boots(), 0);
}

#[tokio::test]
async fn v2c_trap_calls_back_once_per_varbind() {
    let (responder, mut recorder) = recorder(Response::None);
    let (receiver, receiver_task) = start_with(responder).await;
    let (sender, sender_task) = start(demo_builder()).await;

    let trap = notification::trap_v2(
        0,
        1234,
        link_down(),
        vec![
            VarBind::new(if_index_1(), Value::Integer(1)),
            VarBind::new(sys_name(), "edge-1"),
        ],
    );
    let target = sender.community_target(receiver.local_addr(), COMMUNITY);
    sender.send_trap(target, trap).await.unwrap();

    let event = recorder.next().await;
    assert_eq!(event.pdu_type, PduType::TrapV2);
    assert_eq!(event.version, Version::V2c);
    assert_eq!(event.security_name.as_ref(), COMMUNITY);
    assert_eq!(event.source, sender.local_addr());
    assert_eq!(event.varbinds.len(), 4);
    assert_eq!(event.varbinds[1].value, Value::ObjectIdentifier(link_down()));
    assert_eq!(recorder.varbind_visits(), 4);
    assert!(recorder.idle_for(Duration::from_millis(100)).await);

    receiver.shutdown();
    sender.shutdown();
    receiver_task.await.unwrap().unwrap();
    sender_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn v1_trap_is_delivered_with_original_pdu() {
    let (responder, mut recorder) = recorder(Response::None);
    let (receiver, task) = start_with(responder).await;

    let trap = TrapV1Pdu {
        enterprise: snmp_dispatch::oid!(1, 3, 6, 1, 4, 1, 4976),
        agent_addr: [127, 0, 0, 1],
        generic_trap: 2,
        specific_trap: 0,
        time_stamp: 99,
        varbinds: vec![VarBind::new(if_index_1(), Value::Integer(1))],
    };
    let data = CommunityMessage::new(Version::V1, Bytes::from_static(COMMUNITY), trap)
        .unwrap()
        .encode();
    raw_socket()
        .await
        .send_to(&data, receiver.local_addr())
        .await
        .unwrap();

    let event = recorder.next().await;
    assert_eq!(event.pdu_type, PduType::TrapV1);
    assert_eq!(event.request_id, 0);
    let original = event.trap_v1.unwrap();
    assert_eq!(original.time_stamp, 99);
    assert_eq!(original.v2_trap_oid(), link_down());
    assert_eq!(recorder.varbind_visits(), 1);

    receiver.shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_datagram_is_counted_and_loop_continues() {
    let (responder, mut recorder) = recorder(Response::None);
    let (receiver, task) = start_with(responder).await;
    let socket = raw_socket().await;

    socket
        .send_to(b"\x30\x10\x02\x01\x01\x04\x08sec", receiver.local_addr())
        .await
        .unwrap();
    let trap = notification::trap_v2(5, 1, link_down(), Vec::new());
    let valid = CommunityMessage::new(Version::V2c, Bytes::from_static(COMMUNITY), trap)
        .unwrap()
        .encode();
    socket.send_to(&valid, receiver.local_addr()).await.unwrap();

    let event = recorder.next().await;
    assert_eq!(event.request_id, 5);
    assert!(recorder.idle_for(Duration::from_millis(100)).await);

    let counters = receiver.counters();
    assert_eq!(counters.snmp_in_pkts, 2);
    assert_eq!(counters.snmp_in_asn_parse_errs, 1);

    receiver.shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn wrong_community_never_reaches_responder() {
    let (responder, mut recorder) = recorder(Response::None);
    let (receiver, task) = start_with(responder).await;
    let (sender, sender_task) = start(demo_builder()).await;

    let target = sender.community_target(receiver.local_addr(), &b"public"[..]);
    sender
        .send_trap(target, notification::trap_v2(0, 1, link_down(), Vec::new()))
        .await
        .unwrap();

    assert!(recorder.idle_for(Duration::from_millis(200)).await);
    assert_eq!(receiver.counters().snmp_in_bad_community_names, 1);

    receiver.shutdown();
    sender.shutdown();
    task.await.unwrap().unwrap();
    sender_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn community_get_round_trip() {
    let reply = Response::VarBinds(vec![VarBind::new(sys_descr(), "router")]);
    let (responder, mut recorder) = recorder(reply);
    let (agent, agent_task) = start_with(responder).await;
    let (manager, manager_task) = start(demo_builder()).await;

    let target = manager.community_target(agent.local_addr(), COMMUNITY);
    let response = manager
        .send_request(target, Pdu::get_request(0, &[sys_descr()]))
        .await
        .unwrap();
    assert_eq!(response.pdu_type, PduType::Response);
    assert_eq!(response.varbinds[0].value, Value::OctetString(Bytes::from_static(b"router")));

    let event = recorder.next().await;
    assert_eq!(event.pdu_type, PduType::GetRequest);
    assert_eq!(event.request_id, response.request_id);

    agent.shutdown();
    manager.shutdown();
    agent_task.await.unwrap().unwrap();
    manager_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn responder_error_becomes_error_status() {
    let (responder, _recorder) = recorder(Response::error(ErrorStatus::NoAccess, 1));
    let (agent, agent_task) = start_with(responder).await;
    let (manager, manager_task) = start(demo_builder()).await;

    let target = CommunityTarget::new(agent.local_addr(), COMMUNITY).version(Version::V1);
    let set = Pdu::set_request(0, vec![VarBind::new(sys_name(), "x")]);
    let response = manager.send_request(target, set).await.unwrap();
    assert_eq!(response.error_status_enum(), ErrorStatus::NoAccess);
    assert_eq!(response.error_index, 1);

    agent.shutdown();
    manager.shutdown();
    agent_task.await.unwrap().unwrap();
    manager_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn concurrent_requests_are_correlated() {
    let reply = Response::VarBinds(vec![VarBind::new(sys_uptime(), Value::TimeTicks(1))]);
    let (responder, _recorder) = recorder(reply);
    let (agent, agent_task) = start_with(responder).await;
    let (manager, manager_task) = start(demo_builder()).await;

    let requests = (0..16).map(|_| {
        let target = manager.community_target(agent.local_addr(), COMMUNITY);
        manager.send_request(target, Pdu::get_request(0, &[sys_uptime()]))
    });
    let responses = futures::future::join_all(requests).await;

    let mut ids: Vec<i32> = responses.into_iter().map(|r| r.unwrap().request_id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 16);

    agent.shutdown();
    manager.shutdown();
    agent_task.await.unwrap().unwrap();
    manager_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn silent_peer_times_out_after_retries() {
    let silent = raw_socket().await;
    let (manager, task) = start(demo_builder()).await;

    let target = CommunityTarget::new(silent.local_addr().unwrap(), COMMUNITY)
        .timeout(Duration::from_millis(50))
        .retries(2);
    let err = manager
        .send_request(target, Pdu::get_request(0, &[sys_descr()]))
        .await
        .unwrap_err();
    match err {
        Error::Timeout { retries, elapsed, .. } => {
            assert_eq!(retries, 2);
            assert!(elapsed >= Duration::from_millis(150));
        }
        other => panic!("expected timeout, got {other:?}"),
    }

    // three copies of the same request
    let mut buf = [0u8; 1500];
    let mut ids = Vec::new();
    for _ in 0..3 {
        let (len, _) = silent.recv_from(&mut buf).await.unwrap();
        ids.push(buf[..len].to_vec());
    }
    assert!(ids.windows(2).all(|w| w[0] == w[1]));

    manager.shutdown();
    task.await.unwrap().unwrap();
}
