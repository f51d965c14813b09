//! Error taxonomy. Each class has its own propagation policy: protocol and
//! transport failures stay local to one connection, domain failures become
//! typed error responses, configuration failures abort startup.

use thiserror::Error;

/// A frame or payload the peer sent cannot be understood. Never fatal to
/// the server; the owning connection reports it back and carries on (or
/// closes, when the stream itself is desynchronized).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown packet tag {0}")]
    UnknownTag(u32),

    #[error("payload decodes to tag {found}, header said {expected}")]
    TagMismatch { expected: u32, found: u32 },

    #[error("malformed payload for tag {tag}: {source}")]
    MalformedPayload {
        tag: u32,
        #[source]
        source: bincode::Error,
    },

    #[error("declared payload of {0} bytes exceeds the frame limit")]
    OversizedFrame(usize),

    #[error("packet could not be encoded: {0}")]
    Encode(#[source] bincode::Error),
}

/// A business-rule violation. Converted into an error response for the
/// requesting client; never crosses threads as a failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("already logged in as {0}, log out before logging in again")]
    AlreadyLoggedIn(String),

    #[error("unknown user, please register first")]
    UnknownUser,

    #[error("wrong password")]
    WrongPassword,

    #[error("an active session for {0} already exists on another client")]
    SessionElsewhere(String),

    #[error("not logged in, log in first to {0}")]
    NotLoggedIn(&'static str),

    #[error("hotel not found")]
    HotelNotFound,

    #[error("no hotels found")]
    NoHotelsFound,

    #[error("username and password must not be empty")]
    EmptyCredentials,

    #[error("whitespace is not allowed in username or password")]
    WhitespaceInCredentials,

    #[error("user {0} is already registered")]
    DuplicateUser(String),
}

/// An I/O failure on a connection or a notification delivery. Connection
/// errors close that connection only; delivery errors deregister the
/// failing subscriber only.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("delivery to subscriber failed: {0}")]
    Delivery(String),
}

/// Startup configuration or persisted state is unusable. Fatal: the
/// process reports it and does not start serving.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("ranking interval must be a positive number of seconds, got {0}")]
    InvalidRankingInterval(i64),

    #[error("data directory {0} does not exist")]
    MissingDataDir(String),

    #[error("required snapshot file {0} is missing")]
    MissingSnapshot(String),

    #[error("snapshot file {name} is malformed: {reason}")]
    MalformedSnapshot { name: String, reason: String },
}
