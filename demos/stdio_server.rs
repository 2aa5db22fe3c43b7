use serde::{Deserialize, Serialize};
use serde_json::Value;

use jsonpeer::{AsyncFn, ErrorInfo, Params, Peer, PeerOptions};

#[tokio::main]
async fn main() {
    let peer = Peer::from_stdio(&PeerOptions::default());
    peer.expose("hello", AsyncFn(hello));
    peer.wait().await;
}

async fn hello(params: Params) -> Result<Value, ErrorInfo> {
    let r: HelloRequest = params.to()?;
    let response = HelloResponse {
        message: format!("Hello, {}!", r.name),
    };
    serde_json::to_value(response).map_err(|e| ErrorInfo::Text(e.to_string()))
}

#[derive(Debug, Serialize, Deserialize)]
struct HelloRequest {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct HelloResponse {
    message: String,
}
