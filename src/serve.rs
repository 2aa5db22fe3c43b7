use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use serde_json::Value;
use tokio::{spawn, task::JoinHandle, time::sleep};
use tracing::{debug, trace, warn};

use super::{
    ErrorCode, ErrorInfo, ErrorObject, Params, Responder,
    components::Builtin,
    handler::Handler,
    message::{IncomingRequest, Outcome, RequestId, Response},
    peer::{PeerState, RawPeer},
};

/// Key of an incoming request while it is being served.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ServeId {
    /// The id the caller sent; echoed in the response.
    Remote(RequestId),
    /// Allocated locally for a notification. Never put on the wire.
    Discard(i64),
}
impl ServeId {
    fn wire_id(&self) -> Option<RequestId> {
        match self {
            ServeId::Remote(id) => Some(id.clone()),
            ServeId::Discard(_) => None,
        }
    }
}

#[derive(Clone)]
pub(crate) enum Exposed {
    Builtin(Builtin),
    Handler(Arc<dyn Handler>),
}

enum Admission {
    /// Tracked and ready to be dispatched.
    Dispatch(ServeId, Exposed),
    /// Tracked, but answered with an error straight away.
    Reject(ServeId, ErrorObject),
    Ignore,
}

impl RawPeer {
    pub(crate) fn serve_request(self: &Arc<Self>, value: Value) {
        let Some(request) = IncomingRequest::from_value(value) else {
            trace!("ignoring request without a JSON-RPC 2.0 envelope");
            return;
        };
        let (id, method, params) = match request {
            IncomingRequest::Call { id, method, params } => (id, method, params),
            IncomingRequest::Invalid { id, error } => {
                match self.admit(id, |_| Err(error)) {
                    Admission::Reject(id, error) => self.send_response(&id, Err(error.into())),
                    Admission::Dispatch(..) | Admission::Ignore => {}
                }
                return;
            }
            IncomingRequest::BadId => {
                let error = ErrorObject::from(ErrorCode::INVALID_REQUEST);
                let queued = self.with_active(|s| s.outbox.responses.push(Response::error(None, error)));
                if queued.is_some() {
                    self.transmit();
                }
                return;
            }
        };
        let admission = self.admit(id, |s| match (s.exposed.get(&method), &params) {
            (None, _) => Err(ErrorObject::from(ErrorCode::METHOD_NOT_FOUND)),
            (Some(_), Err(e)) => Err(e.clone()),
            (Some(exposed), Ok(_)) => Ok(exposed.clone()),
        });
        match admission {
            Admission::Dispatch(id, exposed) => {
                debug!(?id, %method, "serving request");
                let responder = Responder::new(self, id);
                let params = Params::new(params.unwrap_or_default());
                spawn(async move {
                    match exposed {
                        Exposed::Builtin(builtin) => builtin.serve(params, responder),
                        Exposed::Handler(handler) => handler.handle(params, responder),
                    }
                });
            }
            Admission::Reject(id, error) => {
                debug!(?id, %method, code = %error.code, "rejecting request");
                self.send_response(&id, Err(error.into()));
            }
            Admission::Ignore => {}
        }
    }

    /// Registers an incoming request in the serving table.
    ///
    /// Rejected notifications are dropped here since nobody could see the error.
    fn admit(
        self: &Arc<Self>,
        id: Option<RequestId>,
        lookup: impl FnOnce(&PeerState) -> Result<Exposed, ErrorObject>,
    ) -> Admission {
        let peer = Arc::downgrade(self);
        self.with_active(|s| {
            let found = lookup(s);
            let id = match (id, found.is_ok()) {
                (Some(id), _) => {
                    let id = ServeId::Remote(id);
                    if s.local_timers.contains(&id) {
                        warn!(?id, "request id is already being served; ignoring");
                        return Admission::Ignore;
                    }
                    id
                }
                (None, true) => {
                    s.discard_serial -= 1;
                    ServeId::Discard(s.discard_serial)
                }
                (None, false) => {
                    trace!("dropping invalid notification");
                    return Admission::Ignore;
                }
            };
            s.local_timers.insert_placeholder(id.clone());
            match found {
                Ok(exposed) => {
                    if !s.local_timeout.is_zero() {
                        let timer = spawn_local_timeout(peer, id.clone(), s.local_timeout);
                        s.local_timers.arm(&id, timer);
                    }
                    Admission::Dispatch(id, exposed)
                }
                Err(error) => Admission::Reject(id, error),
            }
        })
        .unwrap_or(Admission::Ignore)
    }

    pub(crate) fn send_response(self: &Arc<Self>, id: &ServeId, result: Result<Value, ErrorInfo>) {
        let queued = self.with_active(|s| {
            if !s.local_timers.claim(id) {
                trace!(?id, "discarding duplicate or late response");
                return false;
            }
            let Some(wire_id) = id.wire_id() else {
                trace!(?id, "notification handled");
                return false;
            };
            let outcome = match result {
                Ok(value) => Outcome::Result(value),
                Err(e) => Outcome::Error(e.into_error_object()),
            };
            s.outbox.responses.push(Response::new(Some(wire_id), outcome));
            true
        });
        if queued == Some(true) {
            self.transmit();
        }
    }
}

fn spawn_local_timeout(peer: Weak<RawPeer>, id: ServeId, after: Duration) -> JoinHandle<()> {
    spawn(async move {
        sleep(after).await;
        if let Some(peer) = peer.upgrade() {
            debug!(?id, "method handler timed out");
            let error = ErrorObject::from(ErrorCode::HANDLER_TIMEOUT);
            peer.send_response(&id, Err(error.into()));
        }
    })
}
