use crate::error::ServerError;
use crate::registry::Rooms;
use crate::storage::Storage;
use crate::ticket::TicketKeeper;
use crate::{Server, ServerConfig};
use std::sync::Arc;
use std::time::Duration;

/// Builder for constructing a [`Server`] instance.
pub struct ServerBuilder {
    config: ServerConfig,
    storage: Option<Arc<dyn Storage>>,
    jwt_secret: Option<Vec<u8>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            storage: None,
            jwt_secret: None,
        }
    }

    /// Set server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the HTTP bind address.
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.http_addr = addr.into();
        self
    }

    /// Set how long an untouched chat log survives. Default: 7 days.
    pub fn chat_retention(mut self, retention: Duration) -> Self {
        self.config.chat_retention = retention;
        self
    }

    /// Set JWT ticket expiry in seconds. Default: 3600 (1 hour).
    pub fn ticket_expiry_secs(mut self, secs: u64) -> Self {
        self.config.ticket_expiry_secs = secs;
        self
    }

    /// Set the JWT signing secret.
    pub fn jwt_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.jwt_secret = Some(secret.into());
        self
    }

    /// Set the storage backing workspace aggregates and chat logs.
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Build the server.
    pub fn build(self) -> Result<Server, ServerError> {
        let storage = self
            .storage
            .ok_or_else(|| ServerError::Config("storage is required".to_owned()))?;
        let jwt_secret = self
            .jwt_secret
            .ok_or_else(|| ServerError::Config("jwt_secret is required".to_owned()))?;

        let rooms = Arc::new(Rooms::new(storage, self.config.chat_retention));
        let tickets = Arc::new(TicketKeeper::new(
            &jwt_secret,
            self.config.ticket_expiry_secs,
        ));

        Ok(Server {
            config: self.config,
            rooms,
            tickets,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
