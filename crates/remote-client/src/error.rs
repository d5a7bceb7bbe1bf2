use remote_proto::protocol::{PlaylistId, ValidationError};

/// Code used for transport failures that carry no HTTP status.
pub const NETWORK_ERROR_CODE: i64 = -1;
/// Code used when a call exceeds its timeout.
pub const TIMEOUT_ERROR_CODE: i64 = -2;

/// Every failure the client can report.  Nothing in the client panics or
/// unwinds past a call boundary; callers always get one of these.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    /// Network, HTTP or timeout failure.
    #[error("transport error {code}: {message}")]
    Transport { code: i64, message: String },
    /// Error object returned by the player.
    #[error("player error {code}: {message}")]
    Application { code: i64, message: String },
    /// Rejected locally before reaching the transport.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),
    #[error("malformed response to {method}: {reason}")]
    MalformedResponse { method: String, reason: String },
    /// A response arrived for a list that is no longer active.
    #[error("stale result for playlist {0}")]
    StaleResult(PlaylistId),
}

impl RemoteError {
    pub fn transport(code: i64, message: impl Into<String>) -> Self {
        Self::Transport {
            code,
            message: message.into(),
        }
    }

    pub fn malformed(method: &str, reason: impl ToString) -> Self {
        Self::MalformedResponse {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Numeric code, if the error carries one.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Transport { code, .. } | Self::Application { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Text meant for the user, without the code prefix.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { message, .. } | Self::Application { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;
