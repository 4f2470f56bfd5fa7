//! CLI for chatbus
//!
//! Subcommands:
//! - `server`: run the WebSocket server
//! - `write`, `read`, `subscribe`: small clients for smoke tests

use chatbus::config::{Settings, load_config};
use chatbus::handlers::Services;
use chatbus::transport::message::{ClientMessage, ServerMessage};
use chatbus::transport::websocket::start_websocket_server;
use chatbus::utils::logging;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info};

const DEFAULT_URL: &str = "ws://127.0.0.1:4000";

#[derive(Parser)]
#[command(name = "chatbus")]
enum Command {
    /// Start the WebSocket server
    Server,
    /// Write a message to a channel and print the stored record
    Write {
        /// Channel to write to
        #[arg(long, default_value_t = 1)]
        channel: i64,
        content: String,
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
    },
    /// Fetch one message by id
    Read {
        id: u64,
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
    },
    /// Print every message written to a channel until Ctrl-C
    Subscribe {
        #[arg(long, default_value_t = 1)]
        channel: i64,
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let settings = match load_config() {
        Ok(settings) => {
            logging::init(&settings.log.level);
            settings
        }
        Err(e) => {
            logging::init("info");
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    let result = match Command::parse() {
        Command::Server => run_server(settings).await,
        Command::Write {
            channel,
            content,
            url,
        } => {
            let request = ClientMessage::Write {
                channel_id: Some(channel),
                content: Some(content),
            };
            run_request(&url, &request).await
        }
        Command::Read { id, url } => {
            let request = ClientMessage::Read {
                id: Some(chatbus::MessageId(id)),
            };
            run_request(&url, &request).await
        }
        Command::Subscribe { channel, url } => run_subscribe(&url, channel).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
    }
}

async fn run_server(settings: Settings) -> CliResult {
    let addr = settings.server.addr();
    let services = Services::from_settings(&settings);
    info!(routing = ?settings.broker.routing, "starting server");

    tokio::select! {
        res = start_websocket_server(addr, services, settings.clone()) => {
            res?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

async fn run_request(url: &str, request: &ClientMessage) -> CliResult {
    let (mut ws_stream, _response) = connect_async(url).await?;
    ws_stream
        .send(WsMessage::text(serde_json::to_string(request)?))
        .await?;

    if let Some(frame) = ws_stream.next().await {
        let reply: ServerMessage = serde_json::from_str(frame?.to_text()?)?;
        println!("{} {:?}", timestamp(), reply);
    }

    ws_stream.close(None).await?;
    Ok(())
}

async fn run_subscribe(url: &str, channel_id: i64) -> CliResult {
    let (mut ws_stream, _response) = connect_async(url).await?;
    let subscribe = ClientMessage::Subscribe { channel_id };
    ws_stream
        .send(WsMessage::text(serde_json::to_string(&subscribe)?))
        .await?;
    println!("{} subscribed to channel {}", timestamp(), channel_id);

    loop {
        tokio::select! {
            frame = ws_stream.next() => {
                let Some(frame) = frame else { break };
                let frame = frame?;
                if !frame.is_text() {
                    continue;
                }
                match serde_json::from_str::<ServerMessage>(frame.to_text()?)? {
                    ServerMessage::Event { id, content, .. } => {
                        println!("{} channel={} id={} content={}", timestamp(), channel_id, id, content);
                    }
                    other => println!("{} {:?}", timestamp(), other),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let _ = ws_stream.close(None).await;
    Ok(())
}
