use serde_json::Value;

/// Error taxonomy for Grafana API interactions.
///
/// HTTP failures are classified by status band so callers can match on a
/// variant instead of re-inspecting status codes. The health inquiry engine
/// relies on this classification to decide between surfacing an error,
/// falling back to a client-side probe, and rendering a verdict.
#[derive(Debug, thiserror::Error)]
pub enum GrafanaError {
    /// Server rejected the request body (HTTP 400).
    #[error("Bad Input: {message}")]
    BadInput { body: Value, message: String },

    /// Authentication or authorization failure (HTTP 401).
    #[error("Unauthorized: {message}")]
    Unauthorized { body: Value, message: String },

    /// Any other 4xx, including 404.
    #[error("Client Error {status}: {message}")]
    Client {
        status: u16,
        body: Value,
        message: String,
    },

    /// 5xx.
    #[error("Server Error {status}: {message}")]
    Server {
        status: u16,
        body: Value,
        message: String,
    },

    /// No response within the configured deadline.
    #[error("request timed out: {0}")]
    Timeout(reqwest::Error),

    /// Connection-level failure.
    #[error("transport failure: {0}")]
    Transport(reqwest::Error),

    /// Unknown backend kind, unknown access mode, or an endpoint the target
    /// server version does not provide.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Local programmer error caught before any network I/O.
    #[error("invalid value: {0}")]
    Value(String),

    /// Request body of an unsupported shape.
    #[error("invalid type: {0}")]
    Type(String),

    /// Client construction failure.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GrafanaError {
    /// Stable name for the error kind, used when rendering health verdict
    /// messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::BadInput { .. } => "GrafanaBadInputError",
            Self::Unauthorized { .. } => "GrafanaUnauthorizedError",
            Self::Client { .. } => "GrafanaClientError",
            Self::Server { .. } => "GrafanaServerError",
            Self::Timeout(_) => "GrafanaTimeoutError",
            Self::Transport(_) => "GrafanaTransportError",
            Self::NotImplemented(_) => "NotImplementedError",
            Self::InvalidUrl(_) => "InvalidUrlError",
            Self::Value(_) => "ValueError",
            Self::Type(_) => "TypeError",
            Self::Config(_) => "ConfigError",
        }
    }

    /// HTTP status code, for variants that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadInput { .. } => Some(400),
            Self::Unauthorized { .. } => Some(401),
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Decoded response body, for variants that carry one.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::BadInput { body, .. }
            | Self::Unauthorized { body, .. }
            | Self::Client { body, .. }
            | Self::Server { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether this is an HTTP 404 from the server.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Client { status: 404, .. })
    }
}

impl From<reqwest::Error> for GrafanaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Transport(err)
        }
    }
}

/// Result type for all client operations.
pub type Result<T> = std::result::Result<T, GrafanaError>;
