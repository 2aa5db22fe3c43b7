use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use super::{message::IncomingResponse, peer::RawPeer};

/// A message handed to [`Peer::receive`](crate::Peer::receive).
#[derive(Debug, Clone)]
pub enum Incoming {
    Text(String),
    Value(Value),
}
impl From<String> for Incoming {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}
impl From<&str> for Incoming {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}
impl From<Value> for Incoming {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Shape of one decoded wire message.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inbound {
    RequestBatch(Vec<Value>),
    ResponseBatch(Vec<Value>),
    DualEnvelope {
        requests: Vec<Value>,
        responses: Vec<Value>,
    },
    SingleRequest(Value),
    SingleResponse(Value),
    Unrecognized,
}

impl Inbound {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    Inbound::Unrecognized
                } else if has_method(&items[0]) {
                    Inbound::RequestBatch(items)
                } else {
                    Inbound::ResponseBatch(items)
                }
            }
            Value::Object(map) => {
                if map.contains_key("requests") && map.contains_key("responses") {
                    classify_dual(map)
                } else if has_method_in(&map) {
                    Inbound::SingleRequest(Value::Object(map))
                } else {
                    Inbound::SingleResponse(Value::Object(map))
                }
            }
            _ => Inbound::Unrecognized,
        }
    }

    /// Splits into `(responses, requests)`.
    pub fn into_streams(self) -> (Vec<Value>, Vec<Value>) {
        match self {
            Inbound::RequestBatch(requests) => (Vec::new(), requests),
            Inbound::ResponseBatch(responses) => (responses, Vec::new()),
            Inbound::DualEnvelope {
                requests,
                responses,
            } => (responses, requests),
            Inbound::SingleRequest(request) => (Vec::new(), vec![request]),
            Inbound::SingleResponse(response) => (vec![response], Vec::new()),
            Inbound::Unrecognized => (Vec::new(), Vec::new()),
        }
    }
}

fn classify_dual(mut map: Map<String, Value>) -> Inbound {
    match (map.remove("requests"), map.remove("responses")) {
        (Some(Value::Array(requests)), Some(Value::Array(responses))) => Inbound::DualEnvelope {
            requests,
            responses,
        },
        _ => Inbound::Unrecognized,
    }
}

fn has_method(value: &Value) -> bool {
    value.as_object().is_some_and(has_method_in)
}
fn has_method_in(map: &Map<String, Value>) -> bool {
    matches!(map.get("method"), Some(Value::String(_)))
}

impl RawPeer {
    pub(crate) fn receive(self: &Arc<Self>, message: Incoming) {
        if !self.is_active() {
            return;
        }
        let value = match message {
            Incoming::Text(text) => match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) => {
                    trace!(%e, "ignoring undecodable message");
                    return;
                }
            },
            Incoming::Value(value) => value,
        };
        let inbound = Inbound::classify(value);
        if matches!(inbound, Inbound::Unrecognized) {
            trace!("ignoring message of unknown shape");
            return;
        }
        let (responses, requests) = inbound.into_streams();
        for response in responses {
            match IncomingResponse::from_value(response) {
                Some(response) => self.deliver_incoming(response),
                None => trace!("ignoring malformed response"),
            }
        }
        for request in requests {
            self.serve_request(request);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_array_is_ignored() {
        assert_eq!(Inbound::classify(json!([])), Inbound::Unrecognized);
    }

    #[test]
    fn batch_kind_follows_first_element() {
        let requests = json!([{"method": "a"}, {"id": 1, "result": 0}]);
        assert!(matches!(Inbound::classify(requests), Inbound::RequestBatch(v) if v.len() == 2));
        let responses = json!([{"id": 1, "result": 0}, {"method": "a"}]);
        assert!(matches!(Inbound::classify(responses), Inbound::ResponseBatch(v) if v.len() == 2));
        let numbers = json!([1, 2]);
        assert!(matches!(Inbound::classify(numbers), Inbound::ResponseBatch(_)));
    }

    #[test]
    fn non_string_method_is_a_response() {
        assert!(matches!(
            Inbound::classify(json!({"method": 3, "id": 1})),
            Inbound::SingleResponse(_)
        ));
    }

    #[test]
    fn dual_envelope() {
        let inbound = Inbound::classify(json!({
            "requests": [{"method": "a"}],
            "responses": [{"id": 1, "result": 0}, {"id": 2, "result": 0}],
        }));
        let (responses, requests) = inbound.into_streams();
        assert_eq!(responses.len(), 2);
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn dual_envelope_members_must_be_arrays() {
        assert_eq!(
            Inbound::classify(json!({"requests": 1, "responses": []})),
            Inbound::Unrecognized
        );
    }

    #[test]
    fn scalars_are_unrecognized() {
        assert_eq!(Inbound::classify(json!(3)), Inbound::Unrecognized);
        assert_eq!(Inbound::classify(json!(null)), Inbound::Unrecognized);
        assert_eq!(Inbound::classify(json!("x")), Inbound::Unrecognized);
    }

    #[test]
    fn single_shapes() {
        assert!(matches!(
            Inbound::classify(json!({"jsonrpc": "2.0", "method": "a"})),
            Inbound::SingleRequest(_)
        ));
        assert!(matches!(
            Inbound::classify(json!({"jsonrpc": "2.0", "id": 1, "result": 2})),
            Inbound::SingleResponse(_)
        ));
    }
}
