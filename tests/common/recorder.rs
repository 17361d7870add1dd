//! Responder that records every event it sees.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use snmp_dispatch::handler::{BoxFuture, CommandResponder, ResponderEvent, Response};
use tokio::sync::mpsc;

/// Test side of a [`recorder`] responder.
pub struct Recorder {
    events: mpsc::UnboundedReceiver<ResponderEvent>,
    varbinds: Arc<AtomicUsize>,
}

pub struct RecordingResponder {
    events: mpsc::UnboundedSender<ResponderEvent>,
    varbinds: Arc<AtomicUsize>,
    reply: Response,
}

/// A responder that forwards each event to the returned [`Recorder`],
/// counts one visit per varbind, and answers requests with `reply`.
pub fn recorder(reply: Response) -> (RecordingResponder, Recorder) {
    let (tx, rx) = mpsc::unbounded_channel();
    let varbinds = Arc::new(AtomicUsize::new(0));
    (
        RecordingResponder {
            events: tx,
            varbinds: varbinds.clone(),
            reply,
        },
        Recorder {
            events: rx,
            varbinds,
        },
    )
}

impl CommandResponder for RecordingResponder {
    fn process_pdu<'a>(&'a self, event: &'a ResponderEvent) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            for _ in &event.varbinds {
                self.varbinds.fetch_add(1, Ordering::SeqCst);
            }
            let _ = self.events.send(event.clone());
            self.reply.clone()
        })
    }
}

impl Recorder {
    /// Next event, failing the test after two seconds.
    pub async fn next(&mut self) -> ResponderEvent {
        tokio::time::timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("responder not called in time")
            .expect("responder dropped")
    }

    /// Whether another event arrives within `wait`.
    pub async fn idle_for(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.events.recv()).await.is_err()
    }

    /// Varbind visits so far.
    pub fn varbind_visits(&self) -> usize {
        self.varbinds.load(Ordering::SeqCst)
    }
}
