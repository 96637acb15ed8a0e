use std::io::{Error, ErrorKind};
use std::sync::{Arc, Mutex};

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{error, info};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message;

use beacon_engine::agent::Agent;
use beacon_engine::board::Side;
use beacon_engine::engine::DEFAULT_DEPTH;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "localhost")]
    host: String,
    #[arg(long, default_value_t = 999)]
    port: u16,
    #[arg(long, default_value_t = DEFAULT_DEPTH)]
    depth: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    simple_logger::init_with_level(log::Level::Info).unwrap();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let listener = TcpListener::bind(address.clone()).await.expect("Failed to bind");
    info!("Listening on: {}", address);

    while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(accept_connection(stream, args.depth));
    }

    Ok(())
}

struct Session {
    agent: Option<Agent>,
    depth: u32,
}

impl Session {
    fn new(depth: u32) -> Self {
        Self { agent: None, depth }
    }
}

async fn accept_connection(stream: TcpStream, depth: u32) -> Result<(), Error> {
    let addr = stream.peer_addr()?;
    info!("Peer address: {}", addr);

    let ws_stream = tokio_tungstenite::accept_async(stream)
        .await
        .expect("Error during the websocket handshake occurred");
    info!("New WebSocket connection: {}", addr);

    let (mut write, mut read) = ws_stream.split();

    let session_mutex = Arc::new(Mutex::new(Session::new(depth)));

    while let Some(raw_message) = read.next().await {
        match raw_message {
            Ok(text_message) => {
                if !text_message.is_text() && !text_message.is_binary() { continue; }
                match serde_json::from_slice::<Value>(&text_message.into_data()) {
                    Ok(data) => {
                        info!("Received: {}", data);
                        let result: Result<Value, Error> = handle_message(&session_mutex, data).await;
                        let response = match result {
                            Ok(resp) => resp,
                            Err(e) => {
                                error!("Error handling message: {:?}", e);
                                json!({"error": format!("{}", e)})
                            }
                        };
                        let response_str = response.to_string();
                        write.send(Message::text(response_str.clone())).await
                                    .expect(&format!("Failed to send message: {}", response_str));
                        info!("Sent: {}", response_str);
                    },
                    Err(e) => { error!("Error parsing JSON: {:?}", e); }
                }
            }
            Err(e) => { error!("Error reading websocket message: {:?}", e); }
        }
    }

    Ok(())
}

fn invalid(e: impl ToString) -> Error {
    Error::new(ErrorKind::InvalidInput, e.to_string())
}

async fn handle_message(session_mutex: &Arc<Mutex<Session>>, data: Value) -> Result<Value, Error> {
    let mut session = session_mutex.lock().unwrap();

    let map = data.as_object()
        .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "Expected a dict"))?;

    // client message protocol: "init", "opponent", "winner"
    // server message protocol: "move", "end", "ok", "error"
    if map.contains_key("init") {
        let side: Side = data["init"].as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "Expected string field: init"))?
            .parse()
            .map_err(invalid)?;
        let depth = init_depth(map, session.depth)?;
        handle_init(&mut session, side, depth)
    } else if map.contains_key("opponent") {
        let text = data["opponent"].as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "Expected string field: opponent"))?;
        handle_opponent_move(&mut session, text)
    } else if map.contains_key("winner") {
        let winner: Side = data["winner"].as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "Expected string field: winner"))?
            .parse()
            .map_err(invalid)?;
        let agent = session.agent.as_ref()
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "Game has not started yet"))?;
        agent.declare_winner(winner);
        Ok(json!({ "ok": true }))
    } else {
        Err(Error::new(ErrorKind::InvalidInput, format!("Invalid message: {}", data)))
    }
}

// Per-game search depth from the init message, defaulting to the
// server-wide CLI value.
fn init_depth(map: &serde_json::Map<String, Value>, default: u32) -> Result<u32, Error> {
    match map.get("depth") {
        Some(value) => value
            .as_u64()
            .map(|depth| depth as u32)
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "Expected integer field: depth")),
        None => Ok(default),
    }
}

fn handle_init(session: &mut Session, side: Side, depth: u32) -> Result<Value, Error> {
    let mut agent = Agent::new(side, depth);
    // Light opens the game; Dark waits for the first opponent move.
    let response = if side == Side::Light {
        let emitted = agent.choose_move().map_err(invalid)?;
        json!({ "move": emitted })
    } else {
        json!({ "ok": true })
    };
    session.agent = Some(agent);
    Ok(response)
}

fn handle_opponent_move(session: &mut Session, text: &str) -> Result<Value, Error> {
    let agent = session.agent.as_mut()
        .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "Game has not started yet"))?;
    agent.notify_opponent_move(text).map_err(invalid)?;
    if let Some(end) = check_game_over(agent) {
        return Ok(end);
    }
    let emitted = agent.choose_move().map_err(invalid)?;
    match check_game_over(agent) {
        Some(end) => Ok(json!({ "move": emitted, "end": end["end"] })),
        None => Ok(json!({ "move": emitted })),
    }
}

fn check_game_over(agent: &Agent) -> Option<Value> {
    if !agent.board().is_terminal() {
        return None;
    }
    match agent.board().winner() {
        Some(winner) => Some(json!({ "end": winner.to_string() })),
        None => Some(json!({ "end": Value::Null })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_depth_prefers_the_message_field() {
        let message = json!({ "init": "dark", "depth": 3 });
        let depth = init_depth(message.as_object().unwrap(), 4).unwrap();
        assert_eq!(depth, 3);
    }

    #[test]
    fn init_depth_falls_back_to_the_server_default() {
        let message = json!({ "init": "light" });
        let depth = init_depth(message.as_object().unwrap(), 4).unwrap();
        assert_eq!(depth, 4);
    }

    #[test]
    fn init_depth_rejects_non_integer_values() {
        let message = json!({ "init": "light", "depth": "deep" });
        assert!(init_depth(message.as_object().unwrap(), 4).is_err());
    }
}
