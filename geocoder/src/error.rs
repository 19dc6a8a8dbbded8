//! Error types for the geocoder.

use thiserror::Error;

/// Geocoder errors.
///
/// A query that matches nothing is not an error; it resolves to an
/// `Unknown`-level result.
#[derive(Error, Debug)]
pub enum GeocodeError {
    /// Lookup provider failure (database unavailable, bad fixture, ...).
    #[error("Lookup provider error: {0}")]
    Provider(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Task payload could not be encoded or decoded.
    #[error("Payload codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker running the task died or no worker is alive.
    #[error("Worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// The task panicked inside the worker.
    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),

    /// The shared payload slot was reclaimed before the worker read it.
    #[error("Payload slot {0} lease lost")]
    LeaseLost(usize),

    /// A worker did not answer within the allowed time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The batch was cancelled before the task finished.
    #[error("Task cancelled")]
    Cancelled,
}

/// Result type for geocoder operations.
pub type Result<T> = std::result::Result<T, GeocodeError>;
