// ===============================
// src/venue.rs (trading terminal seam)
// ===============================
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AccountInfo, Credentials, Deal, OpenPosition, Ticket};

pub type VenueResult<T> = Result<T, VenueError>;

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("bad payload: {0}")]
    Decode(String),
    #[error("venue error {code}: {message}")]
    Venue { code: i64, message: String },
}

/// What the pipeline needs from the trading terminal.
#[async_trait]
pub trait VenueClient: Send + Sync {
    fn name(&self) -> &str;

    async fn authenticate(&self, creds: &Credentials) -> bool;

    async fn list_open_positions(&self) -> VenueResult<Vec<OpenPosition>>;

    /// `Ok(None)` when the venue has no record for the position (yet).
    async fn fetch_deal_history(&self, ticket: Ticket) -> VenueResult<Option<Vec<Deal>>>;

    async fn fetch_account_metadata(&self) -> VenueResult<Option<AccountInfo>>;

    /// Human-readable description of the most recent failure.
    fn last_error_description(&self) -> String;
}
