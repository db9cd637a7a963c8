use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use crate::error::{status_from_message, ConnectorError};

/// An inbound request, stripped of any hosting framework types.
#[derive(Debug, Clone)]
pub struct ConnectorRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ConnectorRequest {
    /// Builds a request from a `/`-separated path. Empty segments are dropped.
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            segments: path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// First non-empty value of `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .filter(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.as_str())
            .next()
    }

    /// First non-empty value among `aliases`, tried in order.
    pub fn query_alias(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| self.query_param(alias))
    }

    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// JSON envelope returned by the router.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ConnectorResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    /// Maps a client failure to an envelope. The status comes from a leading
    /// three-digit code in the message, otherwise 500.
    pub fn from_error(error: &ConnectorError) -> Self {
        let message = error.to_string();
        let status = status_from_message(&message)
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::error(status, message)
    }
}
