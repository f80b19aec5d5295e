use super::*;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::{net::SocketAddr, time::Duration};
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tombola_engine::{
    mocks::{create_engine, register_player, seed_front},
    ManualClock, Settings,
};
use tombola_types::Cell;
use tower::ServiceExt;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const STAKE: u32 = 10;

struct TestContext {
    engine: MemoryEngine,
    clock: Arc<ManualClock>,
    base_url: String,
    ws_url: String,
    http: reqwest::Client,
    server_handle: tokio::task::JoinHandle<()>,
}

impl TestContext {
    async fn new() -> Self {
        let (engine, clock) = create_engine(Settings::default());
        let api = Api::new(engine.clone()).with_rate_limit(RateLimit {
            per_second: 1_000_000,
            burst: 1_000_000,
        });

        // Start server on random port
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let router = api.router().unwrap();
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let actual_addr = listener.local_addr().unwrap();

        let server_handle = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            engine,
            clock,
            base_url: format!("http://{actual_addr}"),
            ws_url: format!("ws://{actual_addr}"),
            http: reqwest::Client::new(),
            server_handle,
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    async fn accept(&self, tid: u64, index: u16) {
        let (status, body) = self
            .post(
                "/api/select",
                json!({"tid": tid, "stake": STAKE, "index": index, "action": "accept"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    /// Two players holding cards 1 and 2, with card 1's top row drawn first.
    async fn start_game(&self) {
        register_player(&self.engine, 1, 100);
        register_player(&self.engine, 2, 100);
        seed_front(&self.engine, STAKE, &top_row(1)).await.unwrap();
        self.accept(1, 1).await;
        self.accept(2, 2).await;
        self.clock.advance(Duration::from_secs(30));
    }

    async fn connect(&self, stake: &str) -> Socket {
        let (socket, _) = connect_async(format!("{}/ws/{stake}", self.ws_url))
            .await
            .unwrap();
        socket
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

fn top_row(index: i64) -> Vec<u8> {
    Card::generate(index).rows()[0]
        .iter()
        .filter_map(Cell::number)
        .collect()
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for message")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_json(socket: &mut Socket, value: Value) {
    socket
        .send(Message::Text(value.to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_game_over_http() {
    let ctx = TestContext::new().await;
    ctx.start_game().await;

    let (status, state) = ctx.get("/api/game_state?stake=10&tid=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["started"], true);
    assert_eq!(state["players"], 2);
    assert_eq!(state["my_index"], 1);
    assert_eq!(state["my_card"][2][2], "FREE");
    assert_eq!(state["phase"]["state"], "running");
    assert_eq!(state["current_call"], top_row(1)[0]);

    ctx.clock.advance(Duration::from_secs(12));
    let (status, body) = ctx
        .post("/api/claim_bingo", json!({"tid": "1", "stake": "10"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["pattern"], "row");
    assert_eq!(body["row"], 0);
    assert_eq!(body["index"], 1);
    assert_eq!(body["player"], "player1");
    assert_eq!(body["amount"], "16.00");

    // The won session stays current until the restart delay passes
    let (status, body) = ctx
        .post("/api/claim_bingo", json!({"tid": 2, "stake": 10}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "already_won");

    let (_, state) = ctx.get("/api/game_state?stake=10").await;
    assert_eq!(state["winner"]["winner"], "player1");
    assert_eq!(state["phase"]["state"], "finished");
}

#[tokio::test]
async fn test_failed_claim_is_not_an_error() {
    let ctx = TestContext::new().await;
    ctx.start_game().await;
    ctx.get("/api/game_state?stake=10").await;

    // Only one number has been called
    let (status, body) = ctx
        .post("/api/claim_bingo", json!({"tid": 2, "stake": 10}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"ok": false, "reason": "not_bingo", "disqualified": true})
    );

    let (status, body) = ctx
        .post("/api/claim_bingo", json!({"tid": 2, "stake": 10}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "no_card");
}

#[tokio::test]
async fn test_error_statuses() {
    let ctx = TestContext::new().await;
    register_player(&ctx.engine, 1, 100);
    register_player(&ctx.engine, 2, 100);

    let cases = [
        (json!({"stake": 10, "index": 1}), StatusCode::BAD_REQUEST, "invalid_params"),
        (json!({"tid": "abc", "stake": 10, "index": 1}), StatusCode::BAD_REQUEST, "invalid_params"),
        (json!({"tid": 1, "stake": 0, "index": 1}), StatusCode::BAD_REQUEST, "invalid_params"),
        (json!({"tid": 1, "stake": 10}), StatusCode::BAD_REQUEST, "invalid_params"),
        (json!({"tid": 1, "stake": 10, "index": 201}), StatusCode::BAD_REQUEST, "invalid_params"),
        (json!({"tid": 99, "stake": 10, "index": 1}), StatusCode::NOT_FOUND, "player_not_found"),
    ];
    for (body, expected, reason) in cases {
        let (status, response) = ctx.post("/api/select", body.clone()).await;
        assert_eq!(status, expected, "{body}");
        assert_eq!(response["ok"], false);
        assert_eq!(response["reason"], reason, "{body}");
    }

    // Malformed body
    let response = ctx
        .http
        .post(format!("{}/api/select", ctx.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    ctx.accept(1, 1).await;
    let (status, body) = ctx
        .post("/api/claim_bingo", json!({"tid": 1, "stake": 10}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "not_started");

    let (status, body) = ctx
        .post(
            "/api/select",
            json!({"tid": 2, "stake": 10, "index": 1, "action": "accept"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "taken");

    ctx.accept(2, 2).await;
    let (status, body) = ctx
        .post("/api/abandon", json!({"tid": 1, "stake": 10}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "countdown_or_started");

    let (status, _) = ctx.get("/api/game_state?stake=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_abandon_while_open() {
    let ctx = TestContext::new().await;
    register_player(&ctx.engine, 1, 100);
    ctx.accept(1, 5).await;

    let (status, body) = ctx
        .post("/api/abandon", json!({"tid": 1, "stake": 10}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"], true);
    assert_eq!(body["taken"], json!([]));

    // Cancel needs no index
    let (status, body) = ctx
        .post("/api/select", json!({"tid": 1, "stake": 10, "index": 7}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, body) = ctx
        .post("/api/select", json!({"tid": 1, "stake": 10, "action": "cancel"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["card"].is_null());

    let (status, body) = ctx
        .post("/api/select", json!({"tid": 1, "stake": 10, "action": "accept"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_params");
}

#[tokio::test]
async fn test_card_and_stake_state() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx.get("/api/card/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["index"], 1);
    assert_eq!(body["card"], serde_json::to_value(Card::generate(1)).unwrap());

    let (_, body) = ctx.get("/api/card/999").await;
    assert_eq!(body["index"], 200);
    assert_eq!(body["card"], serde_json::to_value(Card::generate(200)).unwrap());

    let (status, body) = ctx.get("/api/card/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "invalid_params");

    let (status, body) = ctx.get("/api/stake_state?stake=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], json!({"state": "open"}));
    assert_eq!(body["accepted_count"], 0);
}

#[tokio::test]
async fn test_websocket_commands() {
    let ctx = TestContext::new().await;
    ctx.start_game().await;
    let mut socket = ctx.connect("10").await;

    // A pong means the connection is subscribed
    send_json(&mut socket, json!({"action": "ping"})).await;
    assert_eq!(next_json(&mut socket).await, json!({"type": "pong"}));

    send_json(&mut socket, json!({"action": "dance"})).await;
    assert_eq!(
        next_json(&mut socket).await,
        json!({"type": "rejected", "reason": "invalid_params"})
    );

    send_json(
        &mut socket,
        json!({"action": "claim_bingo", "tid": "99"}),
    )
    .await;
    assert_eq!(
        next_json(&mut socket).await,
        json!({"type": "rejected", "reason": "player_not_found"})
    );

    // The connection drove the overdue run start on connect
    let session = ctx.engine.current(STAKE).await.unwrap();
    assert!(session.is_running());

    send_json(&mut socket, json!({"action": "claim_bingo", "tid": 2})).await;
    assert_eq!(
        next_json(&mut socket).await,
        json!({"type": "disqualified", "reason": "not_bingo"})
    );
}

#[tokio::test]
async fn test_websocket_pushes_events() {
    let ctx = TestContext::new().await;
    register_player(&ctx.engine, 1, 100);
    register_player(&ctx.engine, 2, 100);
    seed_front(&ctx.engine, STAKE, &top_row(1)).await.unwrap();
    let mut socket = ctx.connect("10").await;
    send_json(&mut socket, json!({"action": "ping"})).await;
    assert_eq!(next_json(&mut socket).await["type"], "pong");

    ctx.accept(1, 1).await;
    ctx.accept(2, 2).await;
    ctx.clock.advance(Duration::from_secs(30));
    ctx.get("/api/game_state?stake=10").await;

    let sync = next_json(&mut socket).await;
    assert_eq!(sync["type"], "call_sync");
    assert_eq!(sync["started_at"], sync["server_time"]);

    ctx.clock.advance(Duration::from_secs(12));
    send_json(
        &mut socket,
        json!({"action": "claim_bingo", "tid": 1, "picks": []}),
    )
    .await;
    let winner = next_json(&mut socket).await;
    assert_eq!(winner["type"], "winner");
    assert_eq!(winner["winner"], "player1");
    assert_eq!(winner["pattern"], "row");
    assert_eq!(winner["index"], 1);
    assert_eq!(winner["amount"], "16.00");
}

#[tokio::test]
async fn test_websocket_rejects_bad_stake() {
    let ctx = TestContext::new().await;
    assert!(connect_async(format!("{}/ws/abc", ctx.ws_url)).await.is_err());
}

fn local_request(method: Method, uri: &str) -> axum::http::request::Builder {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .extension(axum::extract::ConnectInfo(SocketAddr::from((
            [127, 0, 0, 1],
            4000,
        ))))
}

#[tokio::test]
async fn test_cors_preflight() {
    let (engine, _) = create_engine(Settings::default());
    let router = Api::new(engine).router().unwrap();

    let request = local_request(Method::OPTIONS, "/api/select")
        .header(header::ORIGIN, "https://play.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_rate_limit() {
    let (engine, _) = create_engine(Settings::default());
    let router = Api::new(engine)
        .with_rate_limit(RateLimit {
            per_second: 1,
            burst: 2,
        })
        .router()
        .unwrap();

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let request = local_request(Method::GET, "/api/stake_state?stake=10")
            .body(axum::body::Body::empty())
            .unwrap();
        statuses.push(router.clone().oneshot(request).await.unwrap().status());
    }
    assert_eq!(
        statuses,
        vec![
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS
        ]
    );
}
