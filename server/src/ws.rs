//! WebSocket transport for room connections.
//!
//! One WebSocket connection is one session in one room. The ticket is
//! validated once at upgrade time; the attachment built from it travels
//! with the connection, so a reconnect reconstructs it without any
//! server-side session state.

use crate::registry::Rooms;
use crate::session::{encode, SessionId};
use crate::ticket::TicketKeeper;
use actix::{Actor, ActorContext, AsyncContext, Handler, Message, StreamHandler};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use huntboard_protocol::{Attachment, ClientFrame, RoomKey, ServerEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);
const OUTBOUND_BUFFER: usize = 256;

/// Shared state for the WebSocket handlers.
pub struct WsState {
    pub rooms: Arc<Rooms>,
    pub tickets: Arc<TicketKeeper>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoomKind {
    Workspace,
    Presence,
    Chat,
    Notify,
}

/// WebSocket actor for one room session.
pub struct RoomWsSession {
    kind: RoomKind,
    key: RoomKey,
    session_id: SessionId,
    rooms: Arc<Rooms>,
    /// Frames pushed by the room actor.
    write_rx: Option<mpsc::Receiver<String>>,
    last_heartbeat: Instant,
}

/// Message type for forwarding room frames to the WebSocket.
#[derive(Message)]
#[rtype(result = "()")]
struct RoomFrame(String);

impl RoomWsSession {
    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                tracing::debug!("WebSocket client heartbeat timeout");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn start_pump(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if let Some(mut write_rx) = self.write_rx.take() {
            let addr = ctx.address();
            actix::spawn(async move {
                while let Some(frame) = write_rx.recv().await {
                    if addr.try_send(RoomFrame(frame)).is_err() {
                        break;
                    }
                }
            });
        }
    }

    fn forward_post(&self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(%err, "ignoring malformed client frame");
                return;
            }
        };
        let ClientFrame::Post { text } = frame;

        let rooms = Arc::clone(&self.rooms);
        let key = self.key.clone();
        let id = self.session_id;
        let addr = ctx.address();
        actix::spawn(async move {
            if let Err(err) = rooms.post_chat(&key, id, text).await {
                // The failure surfaces to the posting client only.
                if let Some(frame) = encode(&ServerEvent::Error {
                    message: err.to_string(),
                }) {
                    let _ = addr.try_send(RoomFrame(frame));
                }
            }
        });
    }
}

impl Actor for RoomWsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);
        self.start_pump(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        let rooms = Arc::clone(&self.rooms);
        let key = self.key.clone();
        let id = self.session_id;
        let kind = self.kind;
        actix::spawn(async move {
            match kind {
                RoomKind::Workspace => rooms.disconnect_workspace(&key, id).await,
                RoomKind::Presence => rooms.leave_presence(&key, id).await,
                RoomKind::Chat => rooms.disconnect_chat(&key, id).await,
                RoomKind::Notify => rooms.unsubscribe_notify(&key, id).await,
            }
        });
    }
}

impl Handler<RoomFrame> for RoomWsSession {
    type Result = ();

    fn handle(&mut self, msg: RoomFrame, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RoomWsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                if self.kind == RoomKind::Chat {
                    self.forward_post(&text, ctx);
                }
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!("WebSocket close: {:?}", reason);
                ctx.stop();
            }
            _ => (),
        }
    }
}

#[derive(serde::Deserialize)]
pub struct WsQuery {
    pub ticket: String,
    /// Which sub-entity the session is viewing (used by presence rooms).
    pub sub_key: Option<String>,
}

async fn open(
    kind: RoomKind,
    req: HttpRequest,
    stream: web::Payload,
    key: String,
    query: WsQuery,
    state: web::Data<WsState>,
) -> Result<HttpResponse, actix_web::Error> {
    let identity = state
        .tickets
        .validate(&query.ticket)
        .map_err(|_| actix_web::error::ErrorUnauthorized("Invalid ticket"))?;

    let key = RoomKey::new(key);
    let attachment = Attachment::new(&identity, query.sub_key);
    let (write_tx, write_rx) = mpsc::channel(OUTBOUND_BUFFER);

    tracing::debug!(%key, ?kind, user = %identity.display_name, "WebSocket room connection");

    let session_id = match kind {
        RoomKind::Workspace => state
            .rooms
            .connect_workspace(&key, attachment, write_tx)
            .await
            .map_err(actix_web::error::ErrorServiceUnavailable)?,
        RoomKind::Presence => state
            .rooms
            .join_presence(&key, attachment, write_tx)
            .await
            .ok_or_else(|| actix_web::error::ErrorServiceUnavailable("room unavailable"))?,
        RoomKind::Chat => state
            .rooms
            .connect_chat(&key, attachment, write_tx)
            .await
            .map_err(actix_web::error::ErrorServiceUnavailable)?,
        RoomKind::Notify => state
            .rooms
            .subscribe_notify(&key, attachment, write_tx)
            .await
            .ok_or_else(|| actix_web::error::ErrorServiceUnavailable("room unavailable"))?,
    };

    let actor = RoomWsSession {
        kind,
        key,
        session_id,
        rooms: Arc::clone(&state.rooms),
        write_rx: Some(write_rx),
        last_heartbeat: Instant::now(),
    };
    ws::start(actor, &req, stream)
}

pub async fn workspace_ws(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    query: web::Query<WsQuery>,
    state: web::Data<WsState>,
) -> Result<HttpResponse, actix_web::Error> {
    open(
        RoomKind::Workspace,
        req,
        stream,
        path.into_inner(),
        query.into_inner(),
        state,
    )
    .await
}

pub async fn presence_ws(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    query: web::Query<WsQuery>,
    state: web::Data<WsState>,
) -> Result<HttpResponse, actix_web::Error> {
    open(
        RoomKind::Presence,
        req,
        stream,
        path.into_inner(),
        query.into_inner(),
        state,
    )
    .await
}

pub async fn chat_ws(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    query: web::Query<WsQuery>,
    state: web::Data<WsState>,
) -> Result<HttpResponse, actix_web::Error> {
    open(
        RoomKind::Chat,
        req,
        stream,
        path.into_inner(),
        query.into_inner(),
        state,
    )
    .await
}

pub async fn notify_ws(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    query: web::Query<WsQuery>,
    state: web::Data<WsState>,
) -> Result<HttpResponse, actix_web::Error> {
    open(
        RoomKind::Notify,
        req,
        stream,
        path.into_inner(),
        query.into_inner(),
        state,
    )
    .await
}
