/// Message used when the gateway rejects a request without saying why.
pub const GENERIC_GATEWAY_MESSAGE: &str = "Something went wrong!";

/// Errors raised while talking to the task gateway or handling its payloads.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not signed in: run `taskdeck login` first")]
    MissingToken,
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("gateway returned {status}: {message}")]
    Gateway { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid task payload: {0}")]
    InvalidTask(String),
    #[error("session storage: {0}")]
    Session(String),
}

impl ClientError {
    /// Missing, expired or rejected credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::MissingToken | Self::Unauthorized { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Map a non-2xx status and its body into the matching variant.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = server_message(body);
        match status {
            401 | 403 => Self::Unauthorized { message },
            404 => Self::NotFound { message },
            _ => Self::Gateway { status, message },
        }
    }
}

/// Pull `message` out of a JSON error body, falling back to the generic text.
pub fn server_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| GENERIC_GATEWAY_MESSAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_prefers_body_message() {
        assert_eq!(server_message(r#"{"message":"Invalid credentials"}"#), "Invalid credentials");
        assert_eq!(server_message(r#"{"error":"nope"}"#), GENERIC_GATEWAY_MESSAGE);
        assert_eq!(server_message("<html>502</html>"), GENERIC_GATEWAY_MESSAGE);
        assert_eq!(server_message(r#"{"message":"  "}"#), GENERIC_GATEWAY_MESSAGE);
    }

    #[test]
    fn status_mapping_classifies_auth_and_not_found() {
        assert!(ClientError::from_status(401, "").is_auth());
        assert!(ClientError::from_status(403, "").is_auth());
        assert!(ClientError::from_status(404, "").is_not_found());

        match ClientError::from_status(500, r#"{"message":"db down"}"#) {
            ClientError::Gateway { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "db down");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
