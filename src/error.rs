use thiserror::Error;

/// Error kinds for the ingestion runtime (spec §7).
///
/// Propagation policy: stream workers and the embedding pump catch and log
/// every variant at their boundary; inside narrow operations these bubble up
/// via `?` to the nearest boundary.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Token refresh returned a non-200 status. Treated as a connection-level
    /// failure by stream workers, which reconnect after the fixed backoff.
    #[error("auth refresh failed: status={status} body={body}")]
    Auth { status: u16, body: String },

    /// Any failure inside a stream's websocket loop: connect failure, read
    /// failure, JSON decoding inside a handler, etc. Always non-fatal; the
    /// reconnect loop logs and retries forever.
    #[error("transient stream error: {0}")]
    TransientStream(String),

    /// Failure from the embedding backend adapter, either the primary or
    /// (if attempted) the fallback protocol.
    #[error("embedding backend error: {0}")]
    Backend(String),

    /// A single embedding-queue row failed to process. Carried alongside the
    /// row id so the pump can mark it `error` without aborting the batch.
    #[error("queue row {queue_id} failed: {reason}")]
    QueueRow { queue_id: String, reason: String },

    /// Degraded-mode marker, not a true error: an empty refresh credential
    /// disables stream workers but the embedding pump keeps running.
    #[error("configuration incomplete: {0}")]
    Config(String),
}

impl From<reqwest::Error> for IngestError {
    fn from(e: reqwest::Error) -> Self {
        IngestError::TransientStream(e.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::TransientStream(e.to_string())
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(e: sqlx::Error) -> Self {
        IngestError::TransientStream(e.to_string())
    }
}
