use thiserror::Error;

/// Failure modes of one API request.
///
/// `Clone` so a stream guard can keep the last error in its published
/// snapshot while the request that produced it is long gone.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApiError {
    /// The server rejected our Basic credentials (HTTP 401).
    #[error("not authorized")]
    Unauthorized,
    /// The entity (or its exit record) does not exist server-side.
    #[error("not found")]
    NotFound,
    /// Any other non-2xx response.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },
    /// Connect/send/timeout failures before a status line arrived.
    #[error("network error: {0}")]
    Network(String),
    /// The body did not decode as the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// True for errors worth retrying on the next scheduled tick.
    /// Auth failures are excluded: retrying them cannot succeed until a
    /// new credential is stored.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Unauthorized)
    }
}
