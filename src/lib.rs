//! # snmp-dispatch
//!
//! Async SNMP message dispatcher with SNMPv1, SNMPv2c and SNMPv3 (USM)
//! processing models.
//!
//! A [`Dispatcher`] binds one UDP endpoint and:
//!
//! - decodes every inbound datagram, checks its community or runs the USM
//!   inbound checks (engine ID, user, security level, digest, time window,
//!   decryption), and answers failures with Report PDUs
//! - completes outstanding requests when their Response or Report arrives
//! - hands traps, informs and requests to a [`CommandResponder`](handler::CommandResponder)
//! - sends requests with timeout and retransmission, discovering SNMPv3
//!   engines on first use, and fire-and-forget notifications
//!
//! # Listening for notifications
//!
//! ```rust,no_run
//! use snmp_dispatch::Dispatcher;
//! use snmp_dispatch::handler::{Response, responder_fn};
//! use snmp_dispatch::v3::{AuthProtocol, PrivProtocol, UsmUser};
//!
//! # async fn example() -> snmp_dispatch::Result<()> {
//! let dispatcher = Dispatcher::builder()
//!     .bind("127.0.0.1:161")
//!     .community(b"security")
//!     .user(
//!         UsmUser::builder("security")
//!             .auth(AuthProtocol::Sha512, "password12#$")
//!             .privacy(PrivProtocol::Aes256, "password12#$%")
//!             .build(),
//!     )
//!     .responder(responder_fn(|event| async move {
//!         for vb in &event.varbinds {
//!             println!("{} = {}", vb.oid, vb.value);
//!         }
//!         Response::None
//!     }))
//!     .build()
//!     .await?;
//!
//! dispatcher.run().await
//! # }
//! ```
//!
//! # Feature flags
//!
//! - `serde`: `Serialize`/`Deserialize` for protocol enums and targets
//! - `testing`: exposes [`transport::MockTransport`] to downstream tests
//! - `demo`: builds the `snmp-listen` binary
//!
//! # Logging
//!
//! All diagnostics go through [`tracing`] under `snmp_dispatch::*` targets
//! (`dispatcher`, `usm`, `transport`, `ber`). Install a subscriber to see them.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod ber;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod message;
pub mod mp;
pub mod notification;
pub mod oid;
pub mod pdu;
pub mod prelude;
pub mod target;
pub mod transport;
pub mod util;
pub mod v3;
pub mod value;
pub mod varbind;
pub mod version;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{Error, ErrorStatus, Result};
pub use handler::{CommandResponder, ResponderEvent, Response, responder_fn};
pub use message::{SecurityLevel, SecurityModel};
pub use oid::Oid;
pub use pdu::{AnyPdu, GenericTrap, Pdu, PduType, TrapV1Pdu};
pub use target::{CommunityTarget, Target, UserTarget};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
