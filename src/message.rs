use derive_ex::derive_ex;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ErrorCode, ErrorInfo, ErrorObject};

#[cfg(test)]
mod tests;

pub(crate) const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[derive_ex(Eq, PartialEq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    Float(#[eq(key = OrderedFloat($))] f64),
    String(String),
}
const MAX_SAFE_INTEGER: u64 = 9007199254740991;

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        match i64::try_from(id) {
            Ok(n) => RequestId::Number(n),
            Err(_) => RequestId::String(id.to_string()),
        }
    }
}
impl RequestId {
    /// Reads back an id this peer allocated for an outgoing call.
    ///
    /// Only non-negative integers (or integral floats) match; the string `"1"` is not serial 1.
    pub(crate) fn to_serial(&self) -> Option<u64> {
        match *self {
            RequestId::Number(n) => u64::try_from(n).ok(),
            RequestId::Float(f) => {
                if f.fract() == 0.0 && 0.0 <= f && f <= MAX_SAFE_INTEGER as f64 {
                    Some(f as u64)
                } else {
                    None
                }
            }
            RequestId::String(_) => None,
        }
    }
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(n) = n.as_i64() {
                    Some(RequestId::Number(n))
                } else {
                    n.as_f64().map(RequestId::Float)
                }
            }
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}
impl Request {
    pub fn new(method: &str, id: Option<RequestId>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            id,
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(flatten)]
    pub outcome: Outcome,
}
impl Response {
    pub fn new(id: Option<RequestId>, outcome: Outcome) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome,
        }
    }
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self::new(id, Outcome::Result(result))
    }
    pub fn error(id: Option<RequestId>, error: ErrorObject) -> Self {
        Self::new(id, Outcome::Error(error))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(ErrorObject),
}
impl Outcome {
    pub fn into_result(self) -> Result<Value, ErrorObject> {
        match self {
            Outcome::Result(value) => Ok(value),
            Outcome::Error(e) => Err(e),
        }
    }
}

/// A response as read off the wire, before it is matched to a call.
///
/// Peers are lenient about what they accept: the `error` member may hold any
/// value and is normalized the same way local handler outcomes are.
pub(crate) struct IncomingResponse {
    pub id: RequestId,
    pub outcome: Result<Value, ErrorObject>,
}
impl IncomingResponse {
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };
        let id = RequestId::from_value(map.get("id")?)?;
        let error = map.remove("error").and_then(ErrorInfo::from_value);
        let outcome = match error {
            Some(e) => Err(e.into_error_object()),
            None => Ok(map.remove("result").unwrap_or(Value::Null)),
        };
        Some(Self { id, outcome })
    }
}

/// An incoming request after the envelope has been checked.
pub(crate) enum IncomingRequest {
    /// Call or notification with a valid method name.
    ///
    /// `params` is `Err` when present but neither an object nor an array; it is
    /// only reported once the method is known to be exposed.
    Call {
        id: Option<RequestId>,
        method: String,
        params: Result<Option<Value>, ErrorObject>,
    },
    /// Envelope is fine but the request is not; answered if `id` is present.
    Invalid {
        id: Option<RequestId>,
        error: ErrorObject,
    },
    /// The `id` member is neither a number nor a string.
    BadId,
}

impl IncomingRequest {
    /// Returns `None` when the value is not a JSON-RPC 2.0 envelope at all.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };
        if map.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return None;
        }
        let id = match map.get("id") {
            None | Some(Value::Null) => None,
            Some(v) => match RequestId::from_value(v) {
                Some(id) => Some(id),
                None => return Some(Self::BadId),
            },
        };
        let method = match map.remove("method") {
            Some(Value::String(method)) => method,
            _ => {
                return Some(Self::Invalid {
                    id,
                    error: ErrorObject::from(ErrorCode::INVALID_REQUEST),
                });
            }
        };
        let params = match map.remove("params") {
            None | Some(Value::Null) => Ok(None),
            Some(p @ (Value::Object(_) | Value::Array(_))) => Ok(Some(p)),
            Some(_) => Err(ErrorObject::from(ErrorCode::INVALID_PARAMS)),
        };
        Some(Self::Call { id, method, params })
    }
}

/// What one transmission attempt carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Requests(Vec<Request>),
    Responses(Vec<Response>),
    Dual {
        requests: Vec<Request>,
        responses: Vec<Response>,
    },
}

impl Packet {
    pub fn to_payload(&self) -> serde_json::Result<String> {
        match self {
            Packet::Requests(rs) => to_single_or_batch(rs),
            Packet::Responses(rs) => to_single_or_batch(rs),
            Packet::Dual {
                requests,
                responses,
            } => {
                let mut m = Map::new();
                m.insert("responses".to_string(), serde_json::to_value(responses)?);
                m.insert("requests".to_string(), serde_json::to_value(requests)?);
                serde_json::to_string(&m)
            }
        }
    }
    pub fn len(&self) -> usize {
        match self {
            Packet::Requests(rs) => rs.len(),
            Packet::Responses(rs) => rs.len(),
            Packet::Dual {
                requests,
                responses,
            } => requests.len() + responses.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn to_single_or_batch<T: Serialize>(items: &[T]) -> serde_json::Result<String> {
    match items {
        [one] => serde_json::to_string(one),
        _ => serde_json::to_string(items),
    }
}
