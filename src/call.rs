use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll},
    time::Duration,
};

use serde_json::Value;
use tokio::{spawn, sync::oneshot, task::JoinHandle, time::sleep};
use tracing::{debug, trace};

use super::{
    Error, ErrorCode, ErrorObject, Result,
    message::{IncomingResponse, Request, RequestId},
    peer::{RawPeer, ReplySink},
};

enum Issued {
    Queued,
    Rejected(Option<ReplySink>),
}

impl RawPeer {
    /// Queues a call. A `reply` sink makes it a call with an id; without one it is a notification.
    pub(crate) fn call(self: &Arc<Self>, method: &str, params: Option<Value>, reply: Option<ReplySink>) {
        let peer = Arc::downgrade(self);
        let issued = self.with_active(|s| {
            if !s.remote_components.allows(method) {
                return Issued::Rejected(reply);
            }
            let id = reply.map(|reply| {
                s.serial += 1;
                let serial = s.serial;
                s.inbox.insert(serial, reply);
                s.out_timers.insert_placeholder(serial);
                if !s.remote_timeout.is_zero() {
                    let timer = spawn_remote_timeout(peer, serial, s.remote_timeout);
                    s.out_timers.arm(&serial, timer);
                }
                debug!(id = serial, %method, "call registered");
                RequestId::from(serial)
            });
            s.outbox.requests.push(Request::new(method, id, params));
            Issued::Queued
        });
        match issued {
            Some(Issued::Queued) => self.transmit(),
            Some(Issued::Rejected(reply)) => {
                debug!(%method, "method not advertised by remote peer");
                if let Some(reply) = reply {
                    let error = ErrorObject::new(ErrorCode::METHOD_NOT_FOUND, "Unknown remote method");
                    spawn(async move { reply(Err(error)) });
                }
            }
            None => {}
        }
    }

    pub(crate) fn deliver_incoming(&self, response: IncomingResponse) {
        match response.id.to_serial() {
            Some(serial) => self.deliver_response(serial, response.outcome),
            None => trace!(id = ?response.id, "discarding response with a foreign id"),
        }
    }

    /// Resolves an outstanding call. Only the first outcome for an id gets through.
    pub(crate) fn deliver_response(&self, serial: u64, outcome: Result<Value, ErrorObject>) {
        let reply = self.with_active(|s| {
            if !s.out_timers.claim(&serial) {
                trace!(id = serial, "discarding duplicate or unexpected response");
                return None;
            }
            s.inbox.remove(&serial)
        });
        if let Some(Some(reply)) = reply {
            spawn(async move { reply(outcome) });
        }
    }
}

fn spawn_remote_timeout(peer: Weak<RawPeer>, serial: u64, after: Duration) -> JoinHandle<()> {
    spawn(async move {
        sleep(after).await;
        if let Some(peer) = peer.upgrade() {
            debug!(id = serial, "call timed out");
            peer.deliver_response(serial, Err(ErrorObject::from(ErrorCode::REMOTE_TIMEOUT)));
        }
    })
}

/// The eventual outcome of a call.
///
/// Resolves to [`Error::Shutdown`] if the peer shuts down before an outcome
/// is known.
#[must_use = "dropping a PendingCall discards its outcome; the call itself stays queued"]
pub struct PendingCall(oneshot::Receiver<Result<Value, ErrorObject>>);

impl PendingCall {
    pub(crate) fn new() -> (ReplySink, Self) {
        let (tx, rx) = oneshot::channel();
        let sink: ReplySink = Box::new(move |outcome| {
            let _ = tx.send(outcome);
        });
        (sink, Self(rx))
    }
}

impl Future for PendingCall {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx).map(|r| match r {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::Remote(e)),
            Err(_) => Err(Error::Shutdown),
        })
    }
}
