use serde::Deserialize;

/// Everything that can go wrong between issuing a request and decoding its body.
///
/// All variants collapse into the same recovery policy: nothing is mutated and a
/// message is surfaced, see [`RequestError::user_message`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    /// The request never completed
    #[error("transport failure: {0}")]
    Transport(String),
    /// The server answered with a non-success status, maybe with a structured message
    #[error("server responded with status {status}")]
    Status { status: u16, message: Option<String> },
    /// The server claimed success but the body was not what we expected
    #[error("unexpected response body: {0}")]
    Decode(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl RequestError {
    /// Builds a status failure, extracting `{"message": ...}` from the body if present.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.message);
        RequestError::Status { status, message }
    }

    /// The text shown to the user: the server's own message when it sent one.
    pub fn user_message(&self, generic: &str) -> String {
        match self {
            RequestError::Status { message: Some(message), .. } => message.clone(),
            _ => generic.to_string(),
        }
    }
}
