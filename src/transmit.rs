use std::{future::Future, pin::Pin, sync::Arc};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{Mutex, mpsc},
};

use super::{Error, Result};

/// Sends one serialized wire message to the other peer.
///
/// `Err` tells the peer that the attempt failed and everything it carried is
/// queued again. A transmitter that resolves `Ok` (or never resolves) has taken
/// ownership of the payload.
pub trait Transmit {
    fn transmit(&self, payload: String) -> impl Future<Output = Result<()>> + Send;

    fn boxed(self) -> BoxTransmitter
    where
        Self: Sized + Send + Sync + 'static,
    {
        BoxTransmitter(Arc::new(self))
    }
}

impl<F, Fut> Transmit for F
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<()>> + Send,
{
    fn transmit(&self, payload: String) -> impl Future<Output = Result<()>> + Send {
        self(payload)
    }
}

trait DynTransmit {
    fn dyn_transmit(&self, payload: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
impl<T: Transmit> DynTransmit for T {
    fn dyn_transmit(&self, payload: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.transmit(payload))
    }
}

#[derive(Clone)]
pub struct BoxTransmitter(Arc<dyn DynTransmit + Send + Sync + 'static>);

impl BoxTransmitter {
    pub(crate) async fn send(&self, payload: String) -> Result<()> {
        self.0.dyn_transmit(payload).await
    }
}

/// Forwards every payload into an unbounded channel.
///
/// Fails once the receiving side is gone.
#[derive(Debug, Clone)]
pub struct ChannelTransmitter(mpsc::UnboundedSender<String>);

impl ChannelTransmitter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}
impl Transmit for ChannelTransmitter {
    async fn transmit(&self, payload: String) -> Result<()> {
        self.0
            .send(payload)
            .map_err(|_| Error::Transport("channel closed".to_string()))
    }
}

/// Writes each payload as one line of a byte stream.
pub struct LineTransmitter<W>(Mutex<W>);

impl<W> LineTransmitter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self(Mutex::new(writer))
    }
}
impl<W> Transmit for LineTransmitter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn transmit(&self, payload: String) -> Result<()> {
        let mut w = self.0.lock().await;
        w.write_all(payload.as_bytes()).await?;
        w.write_all(b"\n").await?;
        w.flush().await?;
        Ok(())
    }
}
