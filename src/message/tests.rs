use serde_json::{Value, json};

use crate::{
    ErrorCode, ErrorObject,
    message::{IncomingRequest, IncomingResponse, Packet, Request, RequestId, Response},
};

#[test]
fn request_serialize() -> Result<(), serde_json::Error> {
    let m = Request::new("test_method", Some(RequestId::Number(1)), Some(json!({"a": 1})));
    assert_eq!(
        serde_json::to_value(&m)?,
        json!({"jsonrpc": "2.0", "method": "test_method", "id": 1, "params": {"a": 1}})
    );
    Ok(())
}

#[test]
fn notification_serialize_has_no_id() -> Result<(), serde_json::Error> {
    let m = Request::new("test_method", None, None);
    assert_eq!(
        serde_json::to_value(&m)?,
        json!({"jsonrpc": "2.0", "method": "test_method"})
    );
    Ok(())
}

#[test]
fn response_serialize() -> Result<(), serde_json::Error> {
    let ok = Response::success(Some(RequestId::Number(3)), json!("ok"));
    assert_eq!(
        serde_json::to_value(&ok)?,
        json!({"jsonrpc": "2.0", "id": 3, "result": "ok"})
    );
    let err = Response::error(
        Some(RequestId::String("a".into())),
        ErrorObject::from(ErrorCode::METHOD_NOT_FOUND),
    );
    assert_eq!(
        serde_json::to_value(&err)?,
        json!({"jsonrpc": "2.0", "id": "a", "error": {"code": -32601, "message": "Method not found"}})
    );
    Ok(())
}

#[test]
fn response_deserialize() -> Result<(), serde_json::Error> {
    let input = r#"{"jsonrpc":"2.0","id":1,"error":{"code":1,"message":"error message"}}"#;
    let m = serde_json::from_str::<Response>(input)?;
    assert_eq!(m.id, Some(RequestId::Number(1)));
    assert_eq!(
        m.outcome.into_result(),
        Err(ErrorObject::new(ErrorCode(1), "error message"))
    );
    Ok(())
}

#[test]
fn request_id_float_key() {
    let id = RequestId::from_value(&json!(2.0)).unwrap();
    assert_eq!(id, RequestId::Float(2.0));
    assert_eq!(id.to_serial(), Some(2));
    assert_eq!(RequestId::Float(2.5).to_serial(), None);
    assert_eq!(RequestId::Number(-4).to_serial(), None);
    assert_eq!(RequestId::String("1".into()).to_serial(), None);
}

#[test]
fn incoming_response_lenient_error() {
    let r = IncomingResponse::from_value(json!({"jsonrpc": "2.0", "id": 5, "error": -1000})).unwrap();
    assert_eq!(r.id, RequestId::Number(5));
    assert_eq!(r.outcome, Err(ErrorObject::new(ErrorCode(-1000), "error")));
}

#[test]
fn incoming_response_false_error_is_success() {
    let r = IncomingResponse::from_value(json!({"id": 5, "error": false, "result": 9})).unwrap();
    assert_eq!(r.outcome, Ok(json!(9)));
}

#[test]
fn incoming_response_without_id() {
    assert!(IncomingResponse::from_value(json!({"result": 9})).is_none());
    assert!(IncomingResponse::from_value(json!({"id": null, "result": 9})).is_none());
    assert!(IncomingResponse::from_value(json!([1])).is_none());
}

#[test]
fn incoming_request_requires_version() {
    assert!(IncomingRequest::from_value(json!({"method": "a", "id": 1})).is_none());
    assert!(IncomingRequest::from_value(json!({"jsonrpc": "1.0", "method": "a"})).is_none());
    assert!(IncomingRequest::from_value(json!("text")).is_none());
}

#[test]
fn incoming_request_classification() {
    let call = IncomingRequest::from_value(
        json!({"jsonrpc": "2.0", "method": "a", "id": "x", "params": [1]}),
    );
    assert!(matches!(
        call,
        Some(IncomingRequest::Call { id: Some(RequestId::String(ref s)), ref method, params: Ok(Some(Value::Array(_))) })
            if s == "x" && method == "a"
    ));

    let bad_method = IncomingRequest::from_value(json!({"jsonrpc": "2.0", "method": 1, "id": 2}));
    assert!(matches!(
        bad_method,
        Some(IncomingRequest::Invalid { id: Some(RequestId::Number(2)), ref error })
            if error.code == ErrorCode::INVALID_REQUEST
    ));

    let bad_params =
        IncomingRequest::from_value(json!({"jsonrpc": "2.0", "method": "a", "params": 3}));
    assert!(matches!(
        bad_params,
        Some(IncomingRequest::Call { id: None, params: Err(ref error), .. })
            if error.code == ErrorCode::INVALID_PARAMS
    ));

    let bad_id = IncomingRequest::from_value(json!({"jsonrpc": "2.0", "method": "a", "id": {}}));
    assert!(matches!(bad_id, Some(IncomingRequest::BadId)));
}

#[test]
fn packet_single_is_bare() -> Result<(), serde_json::Error> {
    let p = Packet::Requests(vec![Request::new("a", None, None)]);
    let v: Value = serde_json::from_str(&p.to_payload()?)?;
    assert_eq!(v, json!({"jsonrpc": "2.0", "method": "a"}));
    Ok(())
}

#[test]
fn packet_many_is_array() -> Result<(), serde_json::Error> {
    let p = Packet::Responses(vec![
        Response::success(Some(RequestId::Number(1)), json!(1)),
        Response::success(Some(RequestId::Number(2)), json!(2)),
    ]);
    let v: Value = serde_json::from_str(&p.to_payload()?)?;
    assert_eq!(
        v,
        json!([
            {"jsonrpc": "2.0", "id": 1, "result": 1},
            {"jsonrpc": "2.0", "id": 2, "result": 2},
        ])
    );
    Ok(())
}

#[test]
fn packet_dual_envelope() -> Result<(), serde_json::Error> {
    let p = Packet::Dual {
        requests: vec![Request::new("a", Some(RequestId::Number(1)), None)],
        responses: vec![Response::success(Some(RequestId::Number(9)), json!(true))],
    };
    assert_eq!(p.len(), 2);
    let v: Value = serde_json::from_str(&p.to_payload()?)?;
    assert_eq!(
        v,
        json!({
            "requests": [{"jsonrpc": "2.0", "method": "a", "id": 1}],
            "responses": [{"jsonrpc": "2.0", "id": 9, "result": true}],
        })
    );
    Ok(())
}
