use serde::{Deserialize, Serialize};
use tokio::process::Command;

use jsonpeer::{Peer, PeerOptions, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let client = Peer::from_command(
        &PeerOptions::default(),
        Command::new("cargo").args(["run", "--example", "stdio_server"]),
    )?;
    let response: HelloResponse = client
        .request(
            "hello",
            Some(&HelloRequest {
                name: "world".to_string(),
            }),
        )
        .await?;
    println!("{:?}", response);
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct HelloRequest {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct HelloResponse {
    message: String,
}
