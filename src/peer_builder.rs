use std::{process::Stdio, sync::Arc};

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, BufReader},
    process::Command,
    spawn,
    sync::watch,
};
use tracing::{debug, warn};

use crate::{Error, LineTransmitter, Peer, PeerOptions, Result, dispatch::Incoming};

impl Peer {
    /// Two peers talking to each other in-process.
    pub fn linked_pair(options0: &PeerOptions, options1: &PeerOptions) -> (Peer, Peer) {
        let p0 = Peer::new(options0);
        let p1 = Peer::new(options1);
        p0.link_to(&p1);
        p1.link_to(&p0);
        (p0, p1)
    }
    fn link_to(&self, other: &Peer) {
        let other = Arc::downgrade(&other.0);
        self.set_transmitter(move |payload: String| {
            let other = other.upgrade();
            async move {
                match other {
                    Some(other) => {
                        other.receive(Incoming::Text(payload));
                        Ok(())
                    }
                    None => Err(Error::Shutdown),
                }
            }
        });
    }

    /// Speaks newline-delimited JSON over a byte stream.
    ///
    /// Each line read from `reader` is fed to [`receive`](Self::receive); each
    /// transmission is written to `writer` as one line.
    pub fn connect_stream(
        options: &PeerOptions,
        reader: impl AsyncBufRead + Unpin + Send + 'static,
        writer: impl AsyncWrite + Unpin + Send + 'static,
    ) -> Peer {
        let peer = Peer::new(options);
        let raw = Arc::downgrade(&peer.0);
        let (closed_tx, closed_rx) = watch::channel(false);
        let task = spawn(async move {
            let mut lines = reader.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(peer) = raw.upgrade() else {
                            break;
                        };
                        peer.receive(Incoming::Text(line));
                    }
                    Ok(None) => {
                        debug!("stream closed");
                        break;
                    }
                    Err(e) => {
                        warn!(%e, "failed to read from stream");
                        break;
                    }
                }
            }
            let _ = closed_tx.send(true);
        });
        peer.0.with_active(|s| {
            s.insert_task(task);
            s.closed = Some(closed_rx);
        });
        peer.set_transmitter(LineTransmitter::new(writer));
        peer
    }

    /// Waits until the stream behind [`connect_stream`](Self::connect_stream) is closed.
    ///
    /// Returns immediately for peers without a stream or once the peer is shut down.
    pub async fn wait(&self) {
        let Some(Some(mut closed)) = self.0.with_active(|s| s.closed.clone()) else {
            return;
        };
        let _ = closed.wait_for(|closed| *closed).await;
    }

    pub fn from_stdio(options: &PeerOptions) -> Peer {
        Self::connect_stream(
            options,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }

    /// Spawns `command` and talks to it over its stdin and stdout.
    ///
    /// The child is killed when the peer shuts down or is dropped.
    pub fn from_command(options: &PeerOptions, command: &mut Command) -> Result<Peer> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transport("child stdin is not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transport("child stdout is not piped".to_string()))?;
        let peer = Self::connect_stream(options, BufReader::new(stdout), stdin);
        let reaper = spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(%status, "child process exited"),
                Err(e) => warn!(%e, "failed to wait for child process"),
            }
        });
        peer.0.with_active(|s| s.insert_task(reaper));
        Ok(peer)
    }
}
