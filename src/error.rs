use std::{io, sync::Arc};

use parse_display::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(transparent)]
#[display("{0}")]
pub struct ErrorCode(pub i64);

impl ErrorCode {
    pub const PARSE_ERROR: Self = Self(-32700);
    pub const INVALID_REQUEST: Self = Self(-32600);
    pub const METHOD_NOT_FOUND: Self = Self(-32601);
    pub const INVALID_PARAMS: Self = Self(-32602);
    pub const INTERNAL_ERROR: Self = Self(-32603);

    /// Generic application failure (`true` or a bare message from a handler).
    pub const APPLICATION_ERROR: Self = Self(-1);
    /// Application failure carrying an arbitrary value in `data`.
    pub const UNSHAPED_ERROR: Self = Self(-2);
    /// No reply arrived before the caller's deadline.
    pub const REMOTE_TIMEOUT: Self = Self(-1000);
    /// The local handler did not respond before the serving deadline.
    pub const HANDLER_TIMEOUT: Self = Self(-1002);

    pub fn message(self) -> &'static str {
        match self {
            Self::PARSE_ERROR => "Parse error",
            Self::INVALID_REQUEST => "Invalid Request",
            Self::METHOD_NOT_FOUND => "Method not found",
            Self::INVALID_PARAMS => "Invalid params",
            Self::INTERNAL_ERROR => "Internal error",
            Self::REMOTE_TIMEOUT => "Timed out waiting for response",
            Self::HANDLER_TIMEOUT => "Method handler timed out",
            _ => "error",
        }
    }
}
impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        Self(code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display)]
#[display("{message} (code {code})")]
pub struct ErrorObject {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
impl ErrorObject {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}
impl From<ErrorCode> for ErrorObject {
    fn from(code: ErrorCode) -> Self {
        Self::new(code, code.message())
    }
}

/// An error outcome reported by a method handler, before it is put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorInfo {
    /// A bare error code, sent with the message `"error"`.
    Code(i64),
    /// "Something failed", with nothing more to say.
    Flag,
    /// A bare message, sent with code `-1`.
    Text(String),
    /// An already shaped error object, sent as is.
    Detailed(ErrorObject),
    /// Any other value, sent as `data` of a code `-2` error.
    Other(Value),
}

impl ErrorInfo {
    /// Classifies an arbitrary JSON value the way an untyped handler outcome is read.
    ///
    /// `null` and `false` mean "no error" and yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some(Self::Flag),
            Value::Number(n) => Some(match n.as_i64() {
                Some(code) => Self::Code(code),
                None => Self::Other(Value::Number(n)),
            }),
            Value::String(s) => Some(Self::Text(s)),
            Value::Object(map) => Some(Self::from_map(map)),
            value @ Value::Array(_) => Some(Self::Other(value)),
        }
    }
    fn from_map(map: Map<String, Value>) -> Self {
        if map.contains_key("code") && map.contains_key("message") {
            match serde_json::from_value::<ErrorObject>(Value::Object(map.clone())) {
                Ok(e) => Self::Detailed(e),
                Err(_) => Self::Other(Value::Object(map)),
            }
        } else {
            Self::Other(Value::Object(map))
        }
    }

    pub fn into_error_object(self) -> ErrorObject {
        match self {
            Self::Code(code) => ErrorObject::new(ErrorCode(code), "error"),
            Self::Flag => ErrorObject::new(ErrorCode::APPLICATION_ERROR, "error"),
            Self::Text(message) => ErrorObject::new(ErrorCode::APPLICATION_ERROR, message),
            Self::Detailed(e) => e,
            Self::Other(data) => ErrorObject::new(ErrorCode::UNSHAPED_ERROR, "error").with_data(data),
        }
    }
}

impl From<i64> for ErrorInfo {
    fn from(code: i64) -> Self {
        Self::Code(code)
    }
}
impl From<i32> for ErrorInfo {
    fn from(code: i32) -> Self {
        Self::Code(code.into())
    }
}
impl From<ErrorCode> for ErrorInfo {
    fn from(code: ErrorCode) -> Self {
        Self::Code(code.0)
    }
}
impl From<&str> for ErrorInfo {
    fn from(message: &str) -> Self {
        Self::Text(message.to_string())
    }
}
impl From<String> for ErrorInfo {
    fn from(message: String) -> Self {
        Self::Text(message)
    }
}
impl From<ErrorObject> for ErrorInfo {
    fn from(e: ErrorObject) -> Self {
        Self::Detailed(e)
    }
}
impl From<Error> for ErrorInfo {
    fn from(e: Error) -> Self {
        Self::Detailed(e.to_error_object())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Remote(ErrorObject),
    #[error("peer is shut down")]
    Shutdown,
    #[error("failed to serialize: {0}")]
    Serialize(#[source] Arc<serde_json::Error>),
    #[error("failed to deserialize: {0}")]
    Deserialize(#[source] Arc<serde_json::Error>),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),
}
impl Error {
    pub fn error_object(&self) -> Option<&ErrorObject> {
        match self {
            Self::Remote(e) => Some(e),
            _ => None,
        }
    }
    pub fn to_error_object(&self) -> ErrorObject {
        match self {
            Self::Remote(e) => e.clone(),
            Self::Deserialize(_) => ErrorObject::from(ErrorCode::INVALID_PARAMS),
            _ => ErrorObject::new(ErrorCode::INTERNAL_ERROR, self.to_string()),
        }
    }
}
impl From<ErrorObject> for Error {
    fn from(e: ErrorObject) -> Self {
        Self::Remote(e)
    }
}
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn normalize(value: Value) -> Value {
        let e = ErrorInfo::from_value(value).unwrap().into_error_object();
        serde_json::to_value(e).unwrap()
    }

    #[test]
    fn numeric_code() {
        assert_eq!(normalize(json!(42)), json!({"code": 42, "message": "error"}));
    }

    #[test]
    fn flag() {
        assert_eq!(normalize(json!(true)), json!({"code": -1, "message": "error"}));
    }

    #[test]
    fn text() {
        assert_eq!(normalize(json!("boom")), json!({"code": -1, "message": "boom"}));
    }

    #[test]
    fn unshaped_object_goes_to_data() {
        assert_eq!(
            normalize(json!({"hint": 1})),
            json!({"code": -2, "message": "error", "data": {"hint": 1}})
        );
    }

    #[test]
    fn shaped_object_passes_through() {
        assert_eq!(
            normalize(json!({"code": 7, "message": "x"})),
            json!({"code": 7, "message": "x"})
        );
        assert_eq!(
            normalize(json!({"code": 7, "message": "x", "data": [1, 2]})),
            json!({"code": 7, "message": "x", "data": [1, 2]})
        );
    }

    #[test]
    fn badly_typed_code_is_unshaped() {
        assert_eq!(
            normalize(json!({"code": "7", "message": "x"})),
            json!({"code": -2, "message": "error", "data": {"code": "7", "message": "x"}})
        );
    }

    #[test]
    fn falsy_is_not_an_error() {
        assert_eq!(ErrorInfo::from_value(Value::Null), None);
        assert_eq!(ErrorInfo::from_value(json!(false)), None);
    }

    #[test]
    fn zero_and_empty_string_are_errors() {
        assert_eq!(normalize(json!(0)), json!({"code": 0, "message": "error"}));
        assert_eq!(normalize(json!("")), json!({"code": -1, "message": ""}));
    }

    #[test]
    fn error_object_display() {
        let e = ErrorObject::from(ErrorCode::METHOD_NOT_FOUND);
        assert_eq!(e.to_string(), "Method not found (code -32601)");
    }
}
