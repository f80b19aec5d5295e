use crate::{parse_player, parse_stake};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State as AxumState,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tombola_engine::{ClaimOutcome, MemoryEngine};
use tombola_types::{
    api::{parse_picks, Command, Param, Reply},
    Stake,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub(crate) async fn upgrade(
    AxumState(engine): AxumState<MemoryEngine>,
    Path(stake): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let stake = match parse_stake(Some(&Param::Text(stake))) {
        Ok(stake) => stake,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    ws.on_upgrade(move |socket| handle(socket, engine, stake))
}

fn encode<T: Serialize>(value: &T) -> Option<Message> {
    match serde_json::to_string(value) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            warn!(error = %e, "failed to encode websocket message");
            None
        }
    }
}

/// Answer a client command. `None` means nothing is sent back directly.
async fn respond(engine: &MemoryEngine, stake: Stake, text: &str) -> Option<Reply> {
    let command = match serde_json::from_str::<Command>(text) {
        Ok(command) => command,
        Err(e) => {
            debug!(error = %e, "unreadable websocket command");
            return Some(Reply::Rejected {
                reason: "invalid_params".to_string(),
            });
        }
    };
    match command {
        Command::Ping => Some(Reply::Pong),
        Command::ClaimBingo { tid, picks } => {
            let player = match parse_player(Some(&tid)) {
                Ok(player) => player,
                Err(e) => {
                    return Some(Reply::Rejected {
                        reason: e.reason().to_string(),
                    })
                }
            };
            let picks = picks.as_deref().map(parse_picks);
            match engine.claim_bingo(player, stake, picks).await {
                // Everyone, the claimant included, sees the winner broadcast
                Ok(ClaimOutcome::Won(_)) => None,
                Ok(ClaimOutcome::NotBingo) => Some(Reply::Disqualified {
                    reason: "not_bingo".to_string(),
                }),
                Err(e) => Some(Reply::Rejected {
                    reason: e.reason().to_string(),
                }),
            }
        }
    }
}

async fn handle(socket: WebSocket, engine: MemoryEngine, stake: Stake) {
    let connection = Uuid::new_v4();
    info!(%connection, stake, "websocket connected");
    let (mut sender, mut receiver) = socket.split();
    let mut events = engine.subscribe(stake);

    // Catch up on anything that became due while nobody was polling
    if let Err(e) = engine.advance(stake).await {
        warn!(%connection, stake, error = %e, "failed to advance session");
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let Some(reply) = respond(&engine, stake, &text).await else {
                            continue;
                        };
                        let Some(message) = encode(&reply) else {
                            continue;
                        };
                        if sender.send(message).await.is_err() {
                            warn!(%connection, "failed to send reply, client disconnected");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(%connection, "client closed websocket connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            warn!(%connection, "failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(%connection, error = ?e, "websocket error");
                        break;
                    }
                    None => {
                        info!(%connection, "websocket stream ended");
                        break;
                    }
                    _ => {}
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let Some(message) = encode(&event) else {
                            continue;
                        };
                        if sender.send(message).await.is_err() {
                            warn!(%connection, "failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%connection, stake, skipped, "websocket client lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(%connection, "broadcast channel closed");
                        break;
                    }
                }
            }
        }
    }
    info!(%connection, stake, "websocket handler exiting");
    let _ = sender.close().await;
}
