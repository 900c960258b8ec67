//! Real-time actor layer for collaborative puzzle workspaces.
//!
//! Every workspace, puzzle chat, presence view, and notification feed is a
//! per-key room: a single task owning its state and sessions, fed by a
//! serialized command channel. The registry routes by key, the WebSocket
//! transport attaches sessions, and the out-of-scope mutation layer calls
//! back in through [`Rooms`] after committing writes.

pub mod builder;
pub mod chat;
pub mod error;
pub mod notify;
pub mod presence;
pub mod registry;
pub mod session;
pub mod storage;
pub mod ticket;
pub mod workspace;
pub mod ws;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use registry::Rooms;
use std::sync::Arc;
use std::time::Duration;
use ticket::TicketKeeper;

pub use builder::ServerBuilder;
pub use error::ServerError;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server.
    pub http_addr: String,
    /// How long an untouched chat log survives before its expiry wake-up
    /// purges it.
    pub chat_retention: Duration,
    /// Connection ticket lifetime in seconds.
    pub ticket_expiry_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_owned(),
            chat_retention: Duration::from_secs(7 * 24 * 60 * 60),
            ticket_expiry_secs: 3600,
        }
    }
}

/// The real-time server: room registry plus WebSocket transport.
pub struct Server {
    config: ServerConfig,
    rooms: Arc<Rooms>,
    tickets: Arc<TicketKeeper>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Handle for the mutation layer: `invalidate_workspace`, `publish`,
    /// and friends stay callable while the server runs.
    pub fn rooms(&self) -> Arc<Rooms> {
        Arc::clone(&self.rooms)
    }

    /// Ticket keeper, for embedders that issue tickets in-process.
    pub fn tickets(&self) -> Arc<TicketKeeper> {
        Arc::clone(&self.tickets)
    }

    /// Run the server.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("server starting on {}", self.config.http_addr);

        let state = web::Data::new(ws::WsState {
            rooms: Arc::clone(&self.rooms),
            tickets: Arc::clone(&self.tickets),
        });

        let http_addr = self.config.http_addr.clone();
        HttpServer::new(move || {
            let cors = Cors::permissive();
            App::new()
                .wrap(cors)
                .app_data(state.clone())
                .route("/ws/workspace/{key}", web::get().to(ws::workspace_ws))
                .route("/ws/presence/{key}", web::get().to(ws::presence_ws))
                .route("/ws/chat/{key}", web::get().to(ws::chat_ws))
                .route("/ws/notify/{key}", web::get().to(ws::notify_ws))
        })
        .bind(&http_addr)?
        .run()
        .await?;

        Ok(())
    }
}
