//! CommandResponder trait and closure adapter.

use std::future::Future;
use std::pin::Pin;

use super::{ResponderEvent, Response};

/// Type alias for boxed async return type (dyn-compatible).
///
/// Responders are stored as `Arc<dyn CommandResponder>`, so the trait
/// method returns a boxed future rather than using `async fn`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Receives every PDU that is not a Response or Report to one of the
/// dispatcher's own requests.
///
/// The dispatcher calls [`process_pdu`](Self::process_pdu) once per PDU,
/// on its own task, after decoding and USM checks succeed. Malformed
/// datagrams never reach it, nor do v3 messages below the security level
/// configured for their user.
///
/// # Example
///
/// ```rust
/// use snmp_dispatch::handler::{BoxFuture, CommandResponder, ResponderEvent, Response};
///
/// struct Printer;
///
/// impl CommandResponder for Printer {
///     fn process_pdu<'a>(&'a self, event: &'a ResponderEvent) -> BoxFuture<'a, Response> {
///         Box::pin(async move {
///             for vb in &event.varbinds {
///                 println!("{vb}");
///             }
///             Response::None
///         })
///     }
/// }
/// ```
pub trait CommandResponder: Send + Sync + 'static {
    fn process_pdu<'a>(&'a self, event: &'a ResponderEvent) -> BoxFuture<'a, Response>;
}

/// Adapter returned by [`responder_fn`].
#[derive(Clone)]
pub struct FnResponder<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnResponder<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnResponder").finish_non_exhaustive()
    }
}

/// Wrap an async closure as a [`CommandResponder`].
///
/// The closure receives an owned copy of the event.
///
/// ```rust
/// use snmp_dispatch::handler::{Response, responder_fn};
///
/// let responder = responder_fn(|event| async move {
///     println!("{} varbinds from {}", event.varbinds.len(), event.source);
///     Response::None
/// });
/// # let _ = responder;
/// ```
pub fn responder_fn<F, Fut>(f: F) -> FnResponder<F>
where
    F: Fn(ResponderEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FnResponder { f }
}

impl<F, Fut> CommandResponder for FnResponder<F>
where
    F: Fn(ResponderEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn process_pdu<'a>(&'a self, event: &'a ResponderEvent) -> BoxFuture<'a, Response> {
        Box::pin((self.f)(event.clone()))
    }
}
