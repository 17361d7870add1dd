//! Command/event responder interface.
//!
//! - [`CommandResponder`] - trait called for every inbound PDU that is not
//!   an answer to one of the dispatcher's own requests
//! - [`ResponderEvent`] - decoded PDU plus its security context
//! - [`Response`] - what to send back for confirmed requests
//! - [`responder_fn`] - adapter for async closures
//!
//! # Example
//!
//! ```rust,no_run
//! use snmp_dispatch::Dispatcher;
//! use snmp_dispatch::handler::{Response, responder_fn};
//!
//! # async fn example() -> snmp_dispatch::Result<()> {
//! let dispatcher = Dispatcher::builder()
//!     .bind("0.0.0.0:162")
//!     .community(b"public")
//!     .responder(responder_fn(|event| async move {
//!         for vb in &event.varbinds {
//!             println!("{vb}");
//!         }
//!         Response::None
//!     }))
//!     .build()
//!     .await?;
//! dispatcher.run().await
//! # }
//! ```

mod context;
mod traits;

pub use context::{ResponderEvent, Response};
pub use traits::{BoxFuture, CommandResponder, FnResponder, responder_fn};
