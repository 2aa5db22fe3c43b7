//! # jsonpeer
//!
//! A bidirectional, transport-agnostic [JSON-RPC 2.0] engine.
//!
//! A [`Peer`] is both caller and callee over one channel. It correlates
//! replies with calls, packs queued messages into batches, requeues them when
//! the transport reports a failure, and enforces a deadline on both sides of
//! every call: how long we wait for the other end, and how long our own
//! handlers may take.
//!
//! The transport is anything implementing [`Transmit`] for the outgoing
//! direction; incoming text is handed to [`Peer::receive`].
//!
//! ```rust
//! use jsonpeer::{AsyncFn, ErrorInfo, Params, Peer, PeerOptions};
//! use serde_json::{Value, json};
//!
//! async fn add(params: Params) -> Result<Value, ErrorInfo> {
//!     let (a, b): (i64, i64) = params.to()?;
//!     Ok(json!(a + b))
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> jsonpeer::Result<()> {
//! let (client, server) = Peer::linked_pair(&PeerOptions::default(), &PeerOptions::default());
//! server.expose("add", AsyncFn(add));
//! let sum = client.call("add", Some(json!([1, 2]))).await?;
//! assert_eq!(sum, json!(3));
//! # Ok(())
//! # }
//! ```
//!
//! [JSON-RPC 2.0]: https://www.jsonrpc.org/specification

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

mod call;
mod components;
mod deadline;
mod dispatch;
mod error;
mod handler;
mod message;
mod outbox;
mod peer;
mod peer_builder;
mod serve;
mod transmit;

pub use call::PendingCall;
pub use components::{ComponentSet, DUAL_BATCH, LIST_COMPONENTS};
pub use dispatch::Incoming;
pub use error::*;
pub use handler::{AsyncFn, Handler, Params, Responder};
pub use message::{Outcome, Packet, Request, RequestId, Response};
pub use transmit::{BoxTransmitter, ChannelTransmitter, LineTransmitter, Transmit};

use peer::RawPeer;
use serve::Exposed;

/// Passes no parameters to [`Peer::request`] or [`Peer::notification`].
pub const NO_PARAMS: Option<&()> = None;

/// Deadlines, in seconds. Zero, negative or non-finite values disable a deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PeerOptions {
    /// How long a call waits for the other end to reply.
    pub remote_timeout_seconds: f64,
    /// How long an exposed handler may take to respond.
    pub local_timeout_seconds: f64,
}
impl Default for PeerOptions {
    fn default() -> Self {
        Self {
            remote_timeout_seconds: 60.0,
            local_timeout_seconds: 0.0,
        }
    }
}
impl PeerOptions {
    pub(crate) fn remote_timeout(&self) -> Duration {
        seconds(self.remote_timeout_seconds)
    }
    pub(crate) fn local_timeout(&self) -> Duration {
        seconds(self.local_timeout_seconds)
    }
}
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// One end of a JSON-RPC conversation.
///
/// Cloning yields another handle to the same peer. Must be used from within a
/// Tokio runtime. After [`shutdown`](Self::shutdown) every method is a no-op.
#[derive(Clone)]
pub struct Peer(Arc<RawPeer>);

impl Peer {
    pub fn new(options: &PeerOptions) -> Self {
        Self(RawPeer::new(options))
    }

    /// Installs the transmitter and makes a first transmission attempt.
    pub fn set_transmitter(&self, transmitter: impl Transmit + Send + Sync + 'static) -> &Self {
        let transmitter = transmitter.boxed();
        if self
            .0
            .with_active(|s| s.transmitter = Some(transmitter))
            .is_some()
        {
            self.0.transmit();
        }
        self
    }

    /// Makes one transmission attempt with the installed transmitter.
    ///
    /// Useful to retry after the transport reported a failure.
    pub fn transmit(&self) -> &Self {
        self.0.transmit();
        self
    }

    /// Makes one transmission attempt with `transmitter`, without installing it.
    pub fn transmit_with(&self, transmitter: impl Transmit + Send + Sync + 'static) -> &Self {
        self.0.transmit_via(Some(transmitter.boxed()));
        self
    }

    /// Feeds one wire message from the other end.
    ///
    /// Undecodable or oddly shaped input is ignored.
    pub fn receive(&self, message: impl Into<Incoming>) -> &Self {
        self.0.receive(message.into());
        self
    }

    /// Calls a remote method and returns its eventual outcome.
    pub fn call(&self, method: &str, params: Option<Value>) -> PendingCall {
        let (sink, pending) = PendingCall::new();
        self.0.call(method, params, Some(sink));
        pending
    }

    /// Calls a remote method; `callback` receives the outcome exactly once.
    ///
    /// It is never invoked if the peer shuts down first.
    pub fn call_with(
        &self,
        method: &str,
        params: Option<Value>,
        callback: impl FnOnce(Result<Value, ErrorObject>) + Send + 'static,
    ) -> &Self {
        self.0.call(method, params, Some(Box::new(callback)));
        self
    }

    /// Sends a notification. It carries no id and gets no reply.
    pub fn notify(&self, method: &str, params: Option<Value>) -> &Self {
        self.0.call(method, params, None);
        self
    }

    pub async fn request<R>(&self, method: &str, params: Option<&impl Serialize>) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let value = self.call(method, to_params(params)?).await?;
        R::deserialize(value).map_err(|e| Error::Deserialize(Arc::new(e)))
    }

    pub fn notification(&self, method: &str, params: Option<&impl Serialize>) -> Result<()> {
        self.notify(method, to_params(params)?);
        Ok(())
    }

    /// Exposes a method to the other end and lists it in our component set.
    pub fn expose(&self, name: &str, handler: impl Handler) -> &Self {
        let handler = Exposed::Handler(Arc::new(handler));
        self.0.with_active(|s| {
            s.local_components.insert(name);
            s.exposed.insert(name.to_string(), handler);
        });
        self
    }

    /// Exposes an async function returning the outcome.
    pub fn expose_fn<F, Fut>(&self, name: &str, f: F) -> &Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ErrorInfo>> + Send + 'static,
    {
        self.expose(name, AsyncFn(f))
    }

    pub fn expose_all<N, H>(&self, handlers: impl IntoIterator<Item = (N, H)>) -> &Self
    where
        N: AsRef<str>,
        H: Handler,
    {
        for (name, handler) in handlers {
            self.expose(name.as_ref(), handler);
        }
        self
    }

    /// Exchanges component sets with the other end.
    ///
    /// Once it succeeds, calls to methods the other end did not list fail
    /// immediately with `-32601`. Resolves to the other end's component set.
    pub fn upgrade(&self) -> PendingCall {
        let (sink, pending) = PendingCall::new();
        let Some(local) = self.0.with_active(|s| s.local_components.to_value()) else {
            return pending;
        };
        let peer = Arc::downgrade(&self.0);
        self.0.call(
            LIST_COMPONENTS,
            Some(local),
            Some(Box::new(move |outcome: Result<Value, ErrorObject>| {
                if let (Ok(value), Some(peer)) = (&outcome, peer.upgrade()) {
                    if let Some(names) = ComponentSet::from_value(value) {
                        peer.with_active(|s| s.remote_components.replace(names));
                    }
                }
                sink(outcome);
            })),
        );
        pending
    }

    /// Tears the peer down for good.
    ///
    /// Pending calls are dropped without their callbacks firing, every timer
    /// is cancelled and later calls to any method do nothing.
    pub fn shutdown(&self) -> &Self {
        self.0.shutdown();
        self
    }

    pub fn set_remote_timeout(&self, timeout: Duration) -> &Self {
        self.0.with_active(|s| s.remote_timeout = timeout);
        self
    }
    pub fn set_local_timeout(&self, timeout: Duration) -> &Self {
        self.0.with_active(|s| s.local_timeout = timeout);
        self
    }

    pub fn is_active(&self) -> bool {
        self.0.is_active()
    }
    pub fn is_upgraded(&self) -> bool {
        self.0
            .with_active(|s| s.remote_components.is_upgraded())
            .unwrap_or(false)
    }
    pub fn local_components(&self) -> ComponentSet {
        self.0
            .with_active(|s| s.local_components.clone())
            .unwrap_or_default()
    }
    pub fn remote_components(&self) -> ComponentSet {
        self.0
            .with_active(|s| s.remote_components.names().clone())
            .unwrap_or_default()
    }
    /// Number of outgoing calls still waiting for an outcome.
    pub fn pending_calls(&self) -> usize {
        self.0.with_active(|s| s.out_timers.len()).unwrap_or(0)
    }
    /// Number of incoming requests still being served.
    pub fn serving(&self) -> usize {
        self.0.with_active(|s| s.local_timers.len()).unwrap_or(0)
    }
    /// Requests and responses waiting for the transport.
    pub fn queued(&self) -> (usize, usize) {
        self.0
            .with_active(|s| (s.outbox.requests.len(), s.outbox.responses.len()))
            .unwrap_or((0, 0))
    }
}

fn to_params(params: Option<&impl Serialize>) -> Result<Option<Value>> {
    params
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| Error::Serialize(Arc::new(e)))
}
