//! Low-level HTTP transport for device-agent communication.
//!
//! This module handles URL building, bearer credential injection, and
//! non-2xx response conversion. For the typed per-operation API, see
//! `client.rs`.
//!
//! The agent contract signals failure with any non-2xx status; the body on
//! failure is free text, not a structured envelope, so it is captured
//! verbatim into [`AgentError::HttpStatus`].

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur talking to a device agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Request never completed (connect failure, timeout, DNS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Agent returned a non-success HTTP status.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Response body was not the expected JSON shape.
    #[error("Failed to parse agent response: {0}")]
    Parse(String),
}

/// Convenient Result alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

impl AgentError {
    /// Returns true if the failure was a client-side timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentError::Http(e) if e.is_timeout())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Endpoint Addressing
// ─────────────────────────────────────────────────────────────────────────────

/// Builds the base URL for a device agent.
///
/// `host` is the device's network address as reported by the registry
/// (hostname or IP, no scheme).
#[must_use]
pub fn agent_url(host: &str, port: u16, path: &str) -> String {
    format!("http://{}:{}{}", host, port, path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Execution
// ─────────────────────────────────────────────────────────────────────────────

/// Attaches the bearer credential and executes a request, converting any
/// non-2xx status into [`AgentError::HttpStatus`].
///
/// Returns the raw response body on success. The credential itself is
/// opaque to this layer - issuance and rotation live elsewhere.
pub async fn execute(request: RequestBuilder, token: &str) -> AgentResult<String> {
    let response = request.bearer_auth(token).send().await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(AgentError::HttpStatus(status.as_u16(), body));
    }

    Ok(body)
}

/// Executes a GET and deserializes the JSON response body.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    token: &str,
) -> AgentResult<T> {
    let body = execute(client.get(url), token).await?;
    serde_json::from_str(&body).map_err(|e| AgentError::Parse(e.to_string()))
}

/// Executes a POST with a JSON body, discarding the response payload.
pub async fn post_json<B: Serialize>(
    client: &Client,
    url: &str,
    token: &str,
    body: &B,
) -> AgentResult<()> {
    execute(client.post(url).json(body), token).await?;
    Ok(())
}

/// Executes a bodyless POST, discarding the response payload.
pub async fn post_empty(client: &Client, url: &str, token: &str) -> AgentResult<()> {
    execute(client.post(url), token).await?;
    Ok(())
}

/// Executes a DELETE, discarding the response payload.
pub async fn delete(client: &Client, url: &str, token: &str) -> AgentResult<()> {
    execute(client.delete(url), token).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_url_joins_host_port_and_path() {
        assert_eq!(
            agent_url("10.51.200.68", 8000, "/tv/switch/2"),
            "http://10.51.200.68:8000/tv/switch/2"
        );
    }

    #[test]
    fn http_status_error_keeps_opaque_body() {
        let err = AgentError::HttpStatus(500, "vlc exploded".into());
        assert_eq!(err.to_string(), "HTTP error 500: vlc exploded");
    }
}
