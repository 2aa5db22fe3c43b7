use std::{
    future::Future,
    sync::{Arc, Weak},
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::spawn;

use super::{Error, ErrorInfo, Peer, Result, peer::RawPeer, serve::ServeId};

/// Serves one exposed method.
///
/// `handle` is called on a spawned task and must eventually answer through
/// `responder`. Answering twice is harmless; the second answer is dropped.
/// Never answering leaves the request pending until the local deadline, or
/// forever if there is none.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, params: Params, responder: Responder);
}

impl<F> Handler for F
where
    F: Fn(Params, Responder) + Send + Sync + 'static,
{
    fn handle(&self, params: Params, responder: Responder) {
        self(params, responder)
    }
}

/// Adapts an async function returning the outcome into a [`Handler`].
pub struct AsyncFn<F>(pub F);

impl<F, Fut> Handler for AsyncFn<F>
where
    F: Fn(Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ErrorInfo>> + Send + 'static,
{
    fn handle(&self, params: Params, responder: Responder) {
        let task = (self.0)(params);
        spawn(async move { responder.respond(task.await) });
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(Option<Value>);

impl Params {
    pub(crate) fn new(value: Option<Value>) -> Self {
        Self(value)
    }
    pub fn as_value(&self) -> Option<&Value> {
        self.0.as_ref()
    }
    pub fn into_value(self) -> Option<Value> {
        self.0
    }
    pub fn to<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        match &self.0 {
            Some(p) => T::deserialize(p).map_err(|e| Error::Deserialize(Arc::new(e))),
            None => T::deserialize(&Value::Null).map_err(|e| Error::Deserialize(Arc::new(e))),
        }
    }
    pub fn to_opt<T>(&self) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match &self.0 {
            Some(p) => match T::deserialize(p) {
                Ok(p) => Ok(Some(p)),
                Err(e) => Err(Error::Deserialize(Arc::new(e))),
            },
            None => Ok(None),
        }
    }
}

/// Answers one incoming request.
#[derive(Clone)]
pub struct Responder {
    peer: Weak<RawPeer>,
    id: ServeId,
}

impl Responder {
    pub(crate) fn new(peer: &Arc<RawPeer>, id: ServeId) -> Self {
        Self {
            peer: Arc::downgrade(peer),
            id,
        }
    }
    pub(crate) fn raw_peer(&self) -> Option<Arc<RawPeer>> {
        self.peer.upgrade()
    }

    /// The peer that received the request, unless it is gone.
    pub fn peer(&self) -> Option<Peer> {
        self.raw_peer().map(Peer)
    }
    /// True if the request carried no id; whatever is answered is not sent.
    pub fn is_notification(&self) -> bool {
        matches!(self.id, ServeId::Discard(_))
    }

    pub fn respond(&self, result: Result<Value, ErrorInfo>) {
        if let Some(peer) = self.peer.upgrade() {
            peer.send_response(&self.id, result);
        }
    }
    pub fn success<T: Serialize>(&self, result: &T) {
        match serde_json::to_value(result) {
            Ok(value) => self.respond(Ok(value)),
            Err(e) => self.respond(Err(Error::Serialize(Arc::new(e)).into())),
        }
    }
    pub fn error(&self, error: impl Into<ErrorInfo>) {
        self.respond(Err(error.into()))
    }
}
