//! Smoke-test client for a running gateway.

use clap::Args;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::warn;
use voicerelay_core::ReconnectPolicy;
use voicerelay_gateway::ServerMessage;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client command arguments.
#[derive(Args)]
pub struct ClientArgs {
    /// Gateway WebSocket URL
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
    pub url: String,

    /// Send start_session after connecting
    #[arg(long)]
    pub start: bool,

    /// Extra raw JSON messages to send after connecting
    #[arg(long = "send")]
    pub messages: Vec<String>,

    /// Seconds to keep printing gateway messages
    #[arg(long, default_value = "5")]
    pub wait_secs: u64,

    /// Connection retries before giving up
    #[arg(long, default_value = "5")]
    pub retries: u32,

    /// Delay before the first retry, in milliseconds (doubles each retry)
    #[arg(long, default_value = "1000")]
    pub retry_base_ms: u64,
}

/// Connect, retrying with exponential backoff.
pub async fn connect_with_retry(url: &str, policy: &ReconnectPolicy) -> anyhow::Result<WsStream> {
    let mut attempt = 0;
    loop {
        match connect_async(url).await {
            Ok((ws, _)) => return Ok(ws),
            Err(e) => match policy.delay_for(attempt) {
                Some(delay) => {
                    warn!("Connect to {} failed ({}), retrying in {:?}", url, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => anyhow::bail!(
                    "Could not connect to {} after {} attempts: {}",
                    url,
                    attempt + 1,
                    e
                ),
            },
        }
    }
}

/// Human-readable line for one gateway message.
pub fn describe(text: &str) -> String {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::AudioResponse { payload }) => {
            format!("audio_response ({} base64 chars)", payload.audio.len())
        }
        Ok(ServerMessage::Error { message, .. }) => format!("error: {}", message),
        Ok(ServerMessage::Connected { payload }) => format!("connected: {}", payload.session_id),
        Ok(message) => message.kind().to_string(),
        Err(_) => format!("unrecognized: {}", text),
    }
}

/// Run the client command.
pub async fn run(args: ClientArgs) -> anyhow::Result<()> {
    let policy = ReconnectPolicy::new(Duration::from_millis(args.retry_base_ms), args.retries);
    let ws = connect_with_retry(&args.url, &policy).await?;
    let (mut sink, mut stream) = ws.split();

    if args.start {
        sink.send(Message::Text(r#"{"type":"start_session"}"#.to_string()))
            .await?;
    }
    for message in args.messages {
        sink.send(Message::Text(message)).await?;
    }

    let deadline = tokio::time::sleep(Duration::from_secs(args.wait_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => println!("{}", describe(&text)),
                Some(Ok(Message::Close(_))) | None => {
                    println!("Gateway closed the connection");
                    break;
                }
                Some(Err(e)) => anyhow::bail!("Connection error: {}", e),
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    Ok(())
}
