use thiserror::Error;

/// Errors surfaced by the geocode and open-data clients.
///
/// Empty result sets are never errors; only `reverse_geocode` reports a
/// missing match, as [`Error::NotFound`].
#[derive(Debug, Error)]
pub enum Error {
    /// Network failure, timeout, or a non-2xx HTTP status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// No address within the requested radius.
    #[error("no address found within {radius_m} m of ({x:.3}, {y:.3})")]
    NotFound { x: f64, y: f64, radius_m: f64 },

    /// The request was rejected before anything was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The service answered 200 with an ArcGIS error envelope.
    #[error("service error {code}: {message}")]
    Service { code: i64, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Transport(format!("request timed out: {err}"))
        } else {
            Error::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
