use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Non-success upstream response. The display text starts with the
    /// numeric status so callers can recover it from the message alone.
    #[error("{status} {status_text} - {message}")]
    Api {
        status: u16,
        status_text: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request permit pool closed")]
    PoolClosed,
}

pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Recovers an HTTP status from a message of the form `"404 Not Found - ..."`.
///
/// Only a leading run of exactly three digits followed by whitespace counts.
pub fn status_from_message(message: &str) -> Option<u16> {
    let bytes = message.as_bytes();
    if bytes.len() < 4 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    if !bytes[3].is_ascii_whitespace() {
        return None;
    }
    message[..3].parse().ok()
}
