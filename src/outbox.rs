use std::{mem, sync::Arc};

use tokio::spawn;
use tracing::{error, trace, warn};

use super::{
    message::{Packet, Request, Response},
    peer::RawPeer,
    transmit::BoxTransmitter,
};

/// Messages waiting for the transport.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    pub requests: Vec<Request>,
    pub responses: Vec<Response>,
}

impl Outbox {
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.responses.is_empty()
    }

    /// Takes what the next transmission carries.
    ///
    /// With `dual_batch`, both queues travel together when both have something.
    /// Otherwise responses go first and only one queue is drained.
    pub fn take_packet(&mut self, dual_batch: bool) -> Option<Packet> {
        let has_requests = !self.requests.is_empty();
        let has_responses = !self.responses.is_empty();
        if has_requests && has_responses && dual_batch {
            Some(Packet::Dual {
                requests: mem::take(&mut self.requests),
                responses: mem::take(&mut self.responses),
            })
        } else if has_responses {
            Some(Packet::Responses(mem::take(&mut self.responses)))
        } else if has_requests {
            Some(Packet::Requests(mem::take(&mut self.requests)))
        } else {
            None
        }
    }

    /// Puts back the contents of a failed transmission, ahead of anything queued since.
    pub fn restore(&mut self, packet: Packet) {
        match packet {
            Packet::Requests(requests) => prepend(&mut self.requests, requests),
            Packet::Responses(responses) => prepend(&mut self.responses, responses),
            Packet::Dual {
                requests,
                responses,
            } => {
                prepend(&mut self.requests, requests);
                prepend(&mut self.responses, responses);
            }
        }
    }
}

fn prepend<T>(queue: &mut Vec<T>, mut items: Vec<T>) {
    items.append(queue);
    *queue = items;
}

impl RawPeer {
    /// Makes one transmission attempt with the installed transmitter.
    pub(crate) fn transmit(self: &Arc<Self>) {
        self.transmit_via(None)
    }

    pub(crate) fn transmit_via(self: &Arc<Self>, transmitter: Option<BoxTransmitter>) {
        let attempt = self.with_active(|s| {
            let transmitter = transmitter.or_else(|| s.transmitter.clone())?;
            let packet = s
                .outbox
                .take_packet(s.remote_components.has_dual_batch())?;
            Some((transmitter, packet))
        });
        let Some(Some((transmitter, packet))) = attempt else {
            return;
        };
        let payload = match packet.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(%e, items = packet.len(), "cannot serialize outgoing messages; dropping them");
                return;
            }
        };
        trace!(items = packet.len(), bytes = payload.len(), "transmitting");
        let peer = Arc::downgrade(self);
        spawn(async move {
            if let Err(e) = transmitter.send(payload).await {
                warn!(%e, items = packet.len(), "transmit failed; requeueing");
                if let Some(peer) = peer.upgrade() {
                    peer.with_active(|s| s.outbox.restore(packet));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::message::RequestId;

    fn request(n: i64) -> Request {
        Request::new("m", Some(RequestId::Number(n)), None)
    }
    fn response(n: i64) -> Response {
        Response::success(Some(RequestId::Number(n)), json!(n))
    }

    #[test]
    fn requests_only_drain_as_one_batch() {
        let mut o = Outbox::default();
        o.requests.extend([request(1), request(2), request(3)]);
        let p = o.take_packet(false).unwrap();
        assert_eq!(p, Packet::Requests(vec![request(1), request(2), request(3)]));
        assert!(o.is_empty());
        assert_eq!(o.take_packet(false), None);
    }

    #[test]
    fn responses_take_priority() {
        let mut o = Outbox::default();
        o.requests.push(request(1));
        o.responses.extend([response(7), response(8)]);
        let p = o.take_packet(false).unwrap();
        assert_eq!(p, Packet::Responses(vec![response(7), response(8)]));
        assert_eq!(o.requests, vec![request(1)]);
        let p = o.take_packet(false).unwrap();
        assert_eq!(p, Packet::Requests(vec![request(1)]));
    }

    #[test]
    fn dual_batch_drains_both() {
        let mut o = Outbox::default();
        o.requests.push(request(1));
        o.responses.extend([response(7), response(8)]);
        let p = o.take_packet(true).unwrap();
        assert_eq!(
            p,
            Packet::Dual {
                requests: vec![request(1)],
                responses: vec![response(7), response(8)],
            }
        );
        assert!(o.is_empty());
    }

    #[test]
    fn dual_batch_needs_both_queues() {
        let mut o = Outbox::default();
        o.responses.push(response(7));
        assert_eq!(o.take_packet(true), Some(Packet::Responses(vec![response(7)])));
    }

    #[test]
    fn restore_keeps_new_items() {
        let mut o = Outbox::default();
        o.requests.extend([request(1), request(2)]);
        o.responses.push(response(7));
        let p = o.take_packet(true).unwrap();
        o.requests.push(request(3));
        o.restore(p);
        assert_eq!(o.requests, vec![request(1), request(2), request(3)]);
        assert_eq!(o.responses, vec![response(7)]);
    }

    #[test]
    fn repeated_failures_do_not_duplicate() {
        let mut o = Outbox::default();
        o.requests.extend([request(1), request(2)]);
        for _ in 0..3 {
            let p = o.take_packet(false).unwrap();
            o.restore(p);
        }
        assert_eq!(o.requests, vec![request(1), request(2)]);
        assert!(o.responses.is_empty());
    }
}
