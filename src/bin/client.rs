//! Interactive echo client
//!
//! Streams stdin lines to the server and prints whatever comes back.
//! Ctrl+C sends a close frame and waits briefly for the server to answer.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(name = "echod-client", about = "Interactive WebSocket echo client")]
struct Args {
    /// WebSocket server address
    #[arg(long, default_value = "localhost:8080")]
    addr: String,

    /// WebSocket path
    #[arg(long, default_value = "/ws")]
    path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let url = format!("ws://{}{}", args.addr, args.path);

    println!("Connecting to {url}");
    let (ws, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    let (mut write, mut read) = ws.split();

    let mut read_task = tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    // The server may coalesce several echoes into one frame
                    for line in text.lines() {
                        println!("Received: {line}");
                    }
                }
                Ok(Message::Close(_)) => {
                    println!("Connection closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Read error: {e}");
                    break;
                }
            }
        }
    });

    write
        .send(Message::Text("Hello from client!".to_string()))
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Type messages to send (Ctrl+C to quit):");

    loop {
        tokio::select! {
            _ = &mut read_task => break,
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupt received, closing connection");
                let _ = write.send(Message::Close(None)).await;
                let _ = timeout(Duration::from_secs(1), &mut read_task).await;
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) if line.is_empty() => {}
                Some(line) => {
                    write.send(Message::Text(line.clone())).await?;
                    println!("Sent: {line}");
                }
                // stdin closed
                None => break,
            },
        }
    }

    Ok(())
}
