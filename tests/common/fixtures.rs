//! Common test fixtures and constants.

use std::time::Duration;

use snmp_dispatch::v3::{AuthProtocol, PrivProtocol, UsmUser};
use snmp_dispatch::{CommandResponder, Dispatcher, DispatcherBuilder, Oid, oid};

// =============================================================================
// Standard system MIB OIDs (1.3.6.1.2.1.1.*)
// =============================================================================

pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}
pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}
pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}

/// linkDown (1.3.6.1.6.3.1.1.5.3)
pub fn link_down() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 3)
}
/// ifIndex.1
pub fn if_index_1() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 1)
}

// =============================================================================
// Demo credentials
// =============================================================================

pub const COMMUNITY: &[u8] = b"security";
pub const SECURITY_NAME: &str = "security";
pub const AUTH_PASSWORD: &str = "password12#$";
pub const PRIV_PASSWORD: &str = "password12#$%";
pub const TIMEOUT: Duration = Duration::from_millis(2000);
pub const RETRIES: u32 = 3;

/// SHA-512 / AES-256 user with the demo passwords.
pub fn demo_user() -> UsmUser {
    UsmUser::builder(SECURITY_NAME)
        .auth(AuthProtocol::Sha512, AUTH_PASSWORD)
        .privacy(PrivProtocol::Aes256, PRIV_PASSWORD)
        .build()
}

/// Builder bound to an ephemeral loopback port with the demo community,
/// user and target defaults.
pub fn demo_builder() -> DispatcherBuilder {
    Dispatcher::builder()
        .bind("127.0.0.1:0")
        .community(COMMUNITY)
        .user(demo_user())
        .engine_boots(0)
        .timeout(TIMEOUT)
        .retries(RETRIES)
}

/// Build and start a dispatcher; the returned handle resolves when it stops.
pub async fn start(
    builder: DispatcherBuilder,
) -> (Dispatcher, tokio::task::JoinHandle<snmp_dispatch::Result<()>>) {
    let dispatcher = builder.build().await.expect("bind loopback dispatcher");
    let runner = dispatcher.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    (dispatcher, handle)
}

/// Start a dispatcher with a responder.
pub async fn start_with(
    responder: impl CommandResponder,
) -> (Dispatcher, tokio::task::JoinHandle<snmp_dispatch::Result<()>>) {
    start(demo_builder().responder(responder)).await
}
