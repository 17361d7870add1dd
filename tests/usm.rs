//! SNMPv3 USM between two dispatchers over loopback UDP.

mod common;

use std::time::Duration;

use bytes::Bytes;
use common::*;
use snmp_dispatch::error::UsmErrorKind;
use snmp_dispatch::message::V3Message;
use snmp_dispatch::notification;
use snmp_dispatch::v3::{AuthProtocol, PrivProtocol, UsmUser, report_kind};
use snmp_dispatch::{Error, Pdu, PduType, Response, SecurityLevel, SecurityModel, Value, VarBind, Version};
use tokio::net::UdpSocket;

#[tokio::test]
async fn auth_priv_trap_reaches_responder() {
    let (responder, mut recorder) = recorder(Response::None);
    let (receiver, receiver_task) = start_with(responder).await;
    let (sender, sender_task) = start(demo_builder()).await;

    let trap = notification::trap_v2(
        0,
        42,
        link_down(),
        vec![VarBind::new(if_index_1(), Value::Integer(3))],
    );
    let target = sender.user_target(receiver.local_addr(), SECURITY_NAME, SecurityLevel::AuthPriv);
    sender.send_trap(target, trap).await.unwrap();

    let event = recorder.next().await;
    assert_eq!(event.version, Version::V3);
    assert_eq!(event.security_model, SecurityModel::Usm);
    assert_eq!(event.security_level, SecurityLevel::AuthPriv);
    assert_eq!(event.security_name.as_ref(), SECURITY_NAME.as_bytes());
    assert_eq!(event.context_engine_id, sender.local_engine_id());
    assert_eq!(event.pdu_type, PduType::TrapV2);
    assert_eq!(recorder.varbind_visits(), 3);

    // the receiver learned the sender's engine from the notification
    assert!(receiver.engines().get(sender.local_engine_id()).is_some());

    receiver.shutdown();
    sender.shutdown();
    receiver_task.await.unwrap().unwrap();
    sender_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn no_auth_trap_for_auth_priv_user_is_dropped() {
    let (responder, mut recorder) = recorder(Response::None);
    let (receiver, receiver_task) = start_with(responder).await;
    let (sender, sender_task) = start(demo_builder()).await;

    let trap = notification::trap_v2(0, 42, link_down(), Vec::new());
    let target = sender.user_target(receiver.local_addr(), SECURITY_NAME, SecurityLevel::NoAuthNoPriv);
    sender.send_trap(target, trap).await.unwrap();

    assert!(recorder.idle_for(Duration::from_millis(200)).await);
    assert_eq!(receiver.counters().usm_stats_unsupported_sec_levels, 1);
    assert!(receiver.engines().is_empty());

    receiver.shutdown();
    sender.shutdown();
    receiver_task.await.unwrap().unwrap();
    sender_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn auth_priv_get_discovers_then_answers() {
    let reply = Response::VarBinds(vec![VarBind::new(sys_descr(), "router")]);
    let (responder, mut recorder) = recorder(reply);
    let (agent, agent_task) = start_with(responder).await;
    let (manager, manager_task) = start(demo_builder()).await;

    let target = manager.user_target(agent.local_addr(), SECURITY_NAME, SecurityLevel::AuthPriv);
    let response = manager
        .send_request(target.clone(), Pdu::get_request(0, &[sys_descr()]))
        .await
        .unwrap();
    assert_eq!(response.pdu_type, PduType::Response);
    assert_eq!(response.varbinds[0].value, Value::OctetString(Bytes::from_static(b"router")));

    let engine = manager.engines().get_by_addr(agent.local_addr()).unwrap();
    assert_eq!(&engine.engine_id, agent.local_engine_id());
    assert_eq!(engine.engine_boots, 0);

    let event = recorder.next().await;
    assert_eq!(event.security_level, SecurityLevel::AuthPriv);
    assert_eq!(&event.context_engine_id, agent.local_engine_id());

    // one discovery probe was answered with a report
    assert_eq!(agent.counters().usm_stats_unknown_engine_ids, 1);

    // a second request reuses the cached engine
    manager
        .send_request(target, Pdu::get_next_request(0, &[sys_descr()]))
        .await
        .unwrap();
    assert_eq!(agent.counters().usm_stats_unknown_engine_ids, 1);

    agent.shutdown();
    manager.shutdown();
    agent_task.await.unwrap().unwrap();
    manager_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn inform_is_acknowledged_before_callback() {
    let (responder, mut recorder) = recorder(Response::None);
    let (receiver, receiver_task) = start_with(responder).await;
    let (sender, sender_task) = start(demo_builder()).await;

    let target = sender.user_target(receiver.local_addr(), SECURITY_NAME, SecurityLevel::AuthPriv);
    let inform = notification::inform(0, 7, link_down(), Vec::new());
    let ack = sender.send_request(target, inform).await.unwrap();
    assert_eq!(ack.pdu_type, PduType::Response);
    assert_eq!(ack.varbinds.len(), 2);

    let event = recorder.next().await;
    assert_eq!(event.pdu_type, PduType::InformRequest);
    assert_eq!(event.request_id, ack.request_id);

    receiver.shutdown();
    sender.shutdown();
    receiver_task.await.unwrap().unwrap();
    sender_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn wrong_auth_password_is_reported() {
    let (responder, mut recorder) = recorder(Response::None);
    let (agent, agent_task) = start_with(responder).await;
    let impostor = UsmUser::builder(SECURITY_NAME)
        .auth(AuthProtocol::Sha512, "not-the-password")
        .privacy(PrivProtocol::Aes256, PRIV_PASSWORD)
        .build();
    let (manager, manager_task) = start(
        snmp_dispatch::Dispatcher::builder()
            .bind("127.0.0.1:0")
            .user(impostor),
    )
    .await;

    let target = manager
        .user_target(agent.local_addr(), SECURITY_NAME, SecurityLevel::AuthPriv)
        .timeout(Duration::from_millis(500))
        .retries(0);
    let err = manager
        .send_request(target, Pdu::get_request(0, &[sys_descr()]))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            Error::Usm {
                kind: UsmErrorKind::WrongDigest,
                ..
            }
        ),
        "unexpected error: {err:?}"
    );
    assert_eq!(agent.counters().usm_stats_wrong_digests, 1);
    assert!(recorder.idle_for(Duration::from_millis(100)).await);

    agent.shutdown();
    manager.shutdown();
    agent_task.await.unwrap().unwrap();
    manager_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_user_is_reported() {
    let (responder, _recorder) = recorder(Response::None);
    let (agent, agent_task) = start_with(responder).await;
    let stranger = UsmUser::builder("stranger")
        .auth(AuthProtocol::Sha256, AUTH_PASSWORD)
        .build();
    let (manager, manager_task) = start(
        snmp_dispatch::Dispatcher::builder()
            .bind("127.0.0.1:0")
            .user(stranger),
    )
    .await;

    let target = manager
        .user_target(agent.local_addr(), &b"stranger"[..], SecurityLevel::AuthNoPriv)
        .timeout(Duration::from_millis(500))
        .retries(0);
    let err = manager
        .send_request(target, Pdu::get_request(0, &[sys_descr()]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Usm {
            kind: UsmErrorKind::UnknownUserName,
            ..
        }
    ));
    assert_eq!(agent.counters().usm_stats_unknown_user_names, 1);

    agent.shutdown();
    manager.shutdown();
    agent_task.await.unwrap().unwrap();
    manager_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn raw_discovery_probe_gets_report() {
    let (agent, task) = start(demo_builder().engine_id(&b"\x80\x00\x13\x70\x05demo"[..])).await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let probe = V3Message::discovery_request(1001, 2002, 65507).encode();
    socket.send_to(&probe, agent.local_addr()).await.unwrap();

    let mut buf = vec![0u8; 65535];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let report = V3Message::decode(Bytes::copy_from_slice(&buf[..len])).unwrap();
    assert_eq!(report.msg_id(), 1001);
    let pdu = report.pdu().unwrap();
    assert_eq!(pdu.pdu_type, PduType::Report);
    assert_eq!(pdu.request_id, 2002);
    assert_eq!(report_kind(pdu), Some(UsmErrorKind::UnknownEngineId));
    assert_eq!(
        report.scoped_pdu().unwrap().context_engine_id.as_ref(),
        b"\x80\x00\x13\x70\x05demo"
    );

    agent.shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn discovery_against_silent_peer_times_out() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let (manager, task) = start(demo_builder()).await;

    let target = manager
        .user_target(silent.local_addr().unwrap(), SECURITY_NAME, SecurityLevel::AuthPriv)
        .timeout(Duration::from_millis(50))
        .retries(1);
    let err = manager
        .send_request(target, Pdu::get_request(0, &[sys_descr()]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { retries: 1, .. }));
    assert!(manager.engines().is_empty());

    manager.shutdown();
    task.await.unwrap().unwrap();
}
