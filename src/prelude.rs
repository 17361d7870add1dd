//! Commonly used types.
//!
//! ```rust,no_run
//! use snmp_dispatch::prelude::*;
//! ```
//!
//! This imports:
//! - Dispatcher and responder types: [`Dispatcher`], [`CommandResponder`],
//!   [`ResponderEvent`], [`Response`], [`responder_fn`]
//! - Targets: [`CommunityTarget`], [`UserTarget`], [`SecurityLevel`]
//! - Data types: [`Oid`], [`Value`], [`VarBind`], [`Pdu`], [`Version`]
//! - USM: [`UsmUser`], [`AuthProtocol`], [`PrivProtocol`]
//! - Error handling: [`Error`], [`Result`]
//! - The [`oid!`] macro

pub use crate::dispatcher::Dispatcher;
pub use crate::error::{Error, Result};
pub use crate::handler::{CommandResponder, ResponderEvent, Response, responder_fn};
pub use crate::message::SecurityLevel;
pub use crate::oid::Oid;
pub use crate::pdu::Pdu;
pub use crate::target::{CommunityTarget, UserTarget};
pub use crate::v3::{AuthProtocol, PrivProtocol, UsmUser};
pub use crate::value::Value;
pub use crate::varbind::VarBind;
pub use crate::version::Version;

#[doc(no_inline)]
pub use crate::oid;
