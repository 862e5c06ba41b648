use thiserror::Error;

/// Failures raised while turning an utterance into a structured command.
///
/// The rule-based path never produces these; an utterance nothing matches
/// is answered with the "unknown" reply instead.
#[derive(Debug, Error)]
pub enum InterpretError {
    /// Empty or otherwise unusable recognized text.
    #[error("recognized text is empty")]
    BadInput,

    /// The remote client could not be constructed (missing credential, bad client setup).
    #[error("remote client unavailable: {0}")]
    ClientUnavailable(String),

    /// Network or remote-service failure during the request.
    #[error("transport error: {0}")]
    Transport(String),

    /// The model reply was not valid JSON or did not satisfy the command schema.
    #[error("model reply violates command schema: {0}")]
    SchemaViolation(String),
}

impl InterpretError {
    /// Whether a caller may reasonably retry the same utterance.
    pub fn is_retryable(&self) -> bool {
        matches!(self, InterpretError::Transport(_))
    }
}

impl From<reqwest::Error> for InterpretError {
    fn from(err: reqwest::Error) -> Self {
        InterpretError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(InterpretError::Transport("timeout".to_string()).is_retryable());
        assert!(!InterpretError::BadInput.is_retryable());
        assert!(!InterpretError::SchemaViolation("x".to_string()).is_retryable());
        assert!(!InterpretError::ClientUnavailable("x".to_string()).is_retryable());
    }
}
