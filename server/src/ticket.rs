//! JWT ticket issuance and validation.
//!
//! The identity provider proper is out of process; this keeper only turns
//! its verified identities into short-lived connection tickets and checks
//! them once, at WebSocket accept time.

use huntboard_protocol::{Identity, TicketClaims};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct TicketKeeper {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_secs: u64,
}

impl TicketKeeper {
    pub fn new(secret: &[u8], expiry_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expiry_secs,
        }
    }

    /// Issue a ticket for a verified identity.
    pub fn issue(&self, identity: Identity) -> Result<String, jsonwebtoken::errors::Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let claims = TicketClaims {
            exp: now + self.expiry_secs,
            identity,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Validate a ticket and recover the identity it carries.
    pub fn validate(&self, token: &str) -> Result<Identity, jsonwebtoken::errors::Error> {
        let token_data =
            decode::<TicketClaims>(token, &self.decoding_key, &Validation::default())?;
        Ok(token_data.claims.identity)
    }
}
