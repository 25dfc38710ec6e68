use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use shared_fate_server::constants::TICK_MS;
use shared_fate_server::history::RunHistoryStore;
use shared_fate_server::host::ParticipantRegistry;
use shared_fate_server::settings::Settings;
use shared_fate_server::sim::{BotDriver, SimHost};
use shared_fate_server::types::Vec3;
use shared_fate_server::RunContext;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

const STATUS_BROADCAST_INTERVAL_TICKS: u64 = 5;

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    participant_id: Option<String>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    ctx: RunContext,
    host: SimHost,
    bots: BotDriver,
    history: RunHistoryStore,
    settings_path: Option<PathBuf>,
}

impl ServerState {
    fn new(host: SimHost, history: RunHistoryStore, settings_path: Option<PathBuf>) -> Self {
        Self {
            clients: HashMap::new(),
            ctx: RunContext::new(),
            host,
            bots: BotDriver::new(rand::random()),
            history,
            settings_path,
        }
    }

    /// Settings are re-read before every run; a broken file keeps the last good copy.
    fn refresh_settings(&mut self) {
        let Some(path) = self.settings_path.as_ref() else {
            return;
        };
        match Settings::load(path) {
            Ok(settings) => self.host.settings = settings,
            Err(err) => warn!(%err, "keeping previous run settings"),
        }
    }

    fn start_run(&mut self) -> Result<(), String> {
        self.refresh_settings();
        self.ctx
            .start_run(&mut self.host)
            .map_err(|err| err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<String>,
}

#[derive(Debug)]
enum ParsedClientMessage {
    Join { name: String, spectator: bool },
    Start,
    Objective,
    Jump,
    Ping { t: f64 },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let history_path = std::env::var("RUN_HISTORY_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".data/run-history.json"));

    let settings_path = std::env::var("RUN_SETTINGS_PATH").ok().map(PathBuf::from);
    let settings = match settings_path.as_deref() {
        Some(path) => Settings::load(path).unwrap_or_else(|err| {
            warn!(%err, "falling back to default settings");
            Settings::default()
        }),
        None => Settings::default(),
    };

    let participants = std::env::var("SIM_PARTICIPANTS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(4)
        .clamp(1, 64);

    let host = SimHost::with_participants(settings, participants);
    let state = Arc::new(Mutex::new(ServerState::new(
        host,
        RunHistoryStore::new(history_path),
        settings_path,
    )));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status", get(status_handler))
        .route("/api/history", get(history_handler))
        .route("/api/run/start", post(start_handler))
        .route("/api/run/objective", post(objective_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, %bind_addr, "failed to bind server socket");
            return;
        }
    };

    info!(port, participants, "listening");
    if let Err(err) = axum::serve(listener, app).await {
        error!(%err, "server runtime failed");
    }
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn status_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(guard.ctx.status())
}

async fn history_handler(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(
        guard
            .history
            .build_response(parse_history_limit(query.limit.as_deref())),
    )
}

async fn start_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let mut guard = state.lock().await;
    match guard.start_run() {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "ok": true }))),
        Err(message) => (
            StatusCode::CONFLICT,
            Json(json!({ "ok": false, "error": message })),
        ),
    }
}

async fn objective_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let mut guard = state.lock().await;
    let state = &mut *guard;
    if !state.ctx.is_active() {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "ok": false, "error": "no run in progress" })),
        );
    }
    state.ctx.complete_objective(&mut state.host);
    (StatusCode::OK, Json(json!({ "ok": true })))
}

fn parse_history_limit(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|value| value.parse::<usize>().ok())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        guard.clients.insert(
            client_id.clone(),
            ClientContext {
                tx: tx.clone(),
                participant_id: None,
            },
        );
        let status = json!({ "type": "status", "status": guard.ctx.status() });
        send_to_client(&mut guard, &client_id, &status, QueuePolicy::DropOnFull);
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&state, &client_id, raw.as_str()).await;
            }
            Message::Binary(raw) => match std::str::from_utf8(&raw) {
                Ok(text) => handle_client_message(&state, &client_id, text).await,
                Err(_) => send_error_to_client(&state, &client_id, "invalid utf8 message").await,
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut guard = state.lock().await;
        disconnect_client(&mut guard, &client_id);
    }
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: &SharedState, client_id: &str, raw: &str) {
    let Some(message) = parse_client_message(raw) else {
        send_error_to_client(state, client_id, "invalid message").await;
        return;
    };

    let mut guard = state.lock().await;
    let server = &mut *guard;
    match message {
        ParsedClientMessage::Join { name, spectator } => {
            let participant_id = make_id("player");
            let spawn = server
                .host
                .participants()
                .first()
                .map(|id| server.host.position(id))
                .unwrap_or_else(Vec3::default);
            server.host.add_participant(&participant_id, spawn);
            if let Some(participant) = server.host.participant_mut(&participant_id) {
                participant.name = sanitize_name(&name);
                participant.eligible = !spectator;
            }
            server
                .ctx
                .on_participant_joined(&mut server.host, &participant_id);
            if let Some(client) = server.clients.get_mut(client_id) {
                client.participant_id = Some(participant_id.clone());
            }
            info!(%participant_id, spectator, "participant joined");
            let welcome = json!({ "type": "welcome", "participantId": participant_id });
            send_to_client(server, client_id, &welcome, QueuePolicy::DisconnectOnFull);
        }
        ParsedClientMessage::Start => {
            if let Err(message) = server.start_run() {
                let reply = json!({ "type": "error", "message": message });
                send_to_client(server, client_id, &reply, QueuePolicy::DropOnFull);
            }
        }
        ParsedClientMessage::Objective => {
            server.ctx.complete_objective(&mut server.host);
        }
        ParsedClientMessage::Jump => {
            let participant_id = server
                .clients
                .get(client_id)
                .and_then(|client| client.participant_id.clone());
            if let Some(participant_id) = participant_id {
                server.ctx.on_natural_jump(&mut server.host, &participant_id);
            }
        }
        ParsedClientMessage::Ping { t } => {
            let pong = json!({ "type": "pong", "t": t });
            send_to_client(server, client_id, &pong, QueuePolicy::DropOnFull);
        }
    }
}

fn disconnect_client(state: &mut ServerState, client_id: &str) {
    let Some(client) = state.clients.remove(client_id) else {
        return;
    };
    if let Some(participant_id) = client.participant_id {
        state.host.remove_participant(&participant_id);
        info!(%participant_id, "participant left");
    }
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_run(&mut guard);
        }
    });
}

fn tick_run(state: &mut ServerState) {
    {
        let ServerState {
            ctx, host, bots, ..
        } = &mut *state;
        ctx.tick(host);
        bots.step(ctx, host);
        ctx.end_tick(host);
    }

    let notices = std::mem::take(&mut state.host.notices);
    for notice in notices {
        let message = json!({
            "type": "notice",
            "notice": notice,
            "text": notice.to_string(),
        });
        broadcast(state, &message, QueuePolicy::DisconnectOnFull);
    }
    state.host.status_texts.clear();
    state.host.events.clear();

    if let Some(summary) = state.ctx.take_finished_run() {
        state.history.record_run(&summary);
        broadcast(
            state,
            &json!({ "type": "run_finished", "summary": summary }),
            QueuePolicy::DisconnectOnFull,
        );
    }

    if state
        .ctx
        .tick_count()
        .is_multiple_of(STATUS_BROADCAST_INTERVAL_TICKS)
    {
        let status = json!({ "type": "status", "status": state.ctx.status() });
        broadcast(state, &status, QueuePolicy::DropOnFull);
    }
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        close_slow_client(state, client_id);
    }
}

fn broadcast(state: &mut ServerState, message: &Value, policy: QueuePolicy) {
    let payload = message.to_string();
    let mut failed_clients = Vec::new();
    for (client_id, client) in &state.clients {
        if client
            .tx
            .try_send(OutboundMessage::Text(payload.clone()))
            .is_err()
            && policy == QueuePolicy::DisconnectOnFull
        {
            failed_clients.push(client_id.clone());
        }
    }
    for client_id in failed_clients {
        close_slow_client(state, &client_id);
    }
}

fn close_slow_client(state: &mut ServerState, client_id: &str) {
    if let Some(client) = state.clients.get(client_id) {
        let _ = client.tx.try_send(OutboundMessage::Close {
            code: 1013,
            reason: "client too slow".to_string(),
        });
    }
    warn!(client_id, "dropping slow client");
    disconnect_client(state, client_id);
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_to_client(
        &mut guard,
        client_id,
        &json!({ "type": "error", "message": message }),
        QueuePolicy::DropOnFull,
    );
}

fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    trimmed.chars().take(16).collect()
}

fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "join" => {
            let name = object.get("name")?.as_str()?.to_string();
            let spectator = match object.get("spectator") {
                None => false,
                Some(value) => value.as_bool()?,
            };
            Some(ParsedClientMessage::Join { name, spectator })
        }
        "start" => Some(ParsedClientMessage::Start),
        "objective" => Some(ParsedClientMessage::Objective),
        "jump" => Some(ParsedClientMessage::Jump),
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}
