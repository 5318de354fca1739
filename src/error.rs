use thiserror::Error;

#[derive(Debug, Error)]
pub enum BienestarError {
    #[error("config: {message}")]
    Config { message: String },

    #[error("call: {0}")]
    Call(#[from] CallError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of a failed procedure invocation.
///
/// Kept distinct from the message so callers can branch on the class while
/// the HTTP boundary still reports the human-readable description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallErrorKind {
    /// Unknown procedure, wrong argument count, or malformed parameters.
    InvalidCall,
    /// Rejected credentials.
    Auth,
    /// The database could not be reached or the link dropped.
    Connection,
    /// Any other database-side failure (constraint violation, deadlock, ...).
    Database,
}

impl CallErrorKind {
    /// Wire label used in the `Class` field of error envelopes.
    pub fn as_str(self) -> &'static str {
        match self {
            CallErrorKind::InvalidCall => "invalid_call",
            CallErrorKind::Auth => "auth",
            CallErrorKind::Connection => "connection",
            CallErrorKind::Database => "database",
        }
    }
}

/// A failed stored-procedure invocation or connection attempt.
#[derive(Debug, Clone, Error)]
#[error("{}: {}", .kind.as_str(), .message)]
pub struct CallError {
    pub kind: CallErrorKind,
    pub message: String,
}

impl CallError {
    pub fn new(kind: CallErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(CallErrorKind::InvalidCall, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(CallErrorKind::Auth, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(CallErrorKind::Connection, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(CallErrorKind::Database, message)
    }
}
