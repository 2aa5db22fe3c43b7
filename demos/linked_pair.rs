use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::sleep;

use jsonpeer::{AsyncFn, ErrorInfo, Params, Peer, PeerOptions, Responder, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let client_options = PeerOptions {
        remote_timeout_seconds: 0.5,
        ..PeerOptions::default()
    };
    let server_options = PeerOptions {
        local_timeout_seconds: 0.2,
        ..PeerOptions::default()
    };
    let (client, server) = Peer::linked_pair(&client_options, &server_options);
    server
        .expose("add", AsyncFn(add))
        .expose("slow", AsyncFn(slow))
        .expose("log", |params: Params, _: Responder| {
            println!("log: {:?}", params.as_value());
        });

    println!("remote components: {}", client.upgrade().await?);
    println!("add: {}", client.call("add", Some(json!([1, 2]))).await?);
    client.notify("log", Some(json!({"line": "hello"})));

    match client.call("slow", None).await {
        Ok(value) => println!("slow: {value}"),
        Err(e) => println!("slow: {e}"),
    }
    match client.call("missing", None).await {
        Ok(value) => println!("missing: {value}"),
        Err(e) => println!("missing: {e}"),
    }

    client.shutdown();
    server.shutdown();
    Ok(())
}

async fn add(params: Params) -> Result<Value, ErrorInfo> {
    let (a, b): (i64, i64) = params.to()?;
    Ok(json!(a + b))
}

async fn slow(_params: Params) -> Result<Value, ErrorInfo> {
    sleep(Duration::from_secs(1)).await;
    Ok(Value::Null)
}
