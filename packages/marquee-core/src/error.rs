//! Centralized error types for the Marquee core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::agent::AgentError;
use crate::registry::RegistryError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for AgentError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "agent_unreachable",
            Self::HttpStatus(_, _) => "agent_error_status",
            Self::Parse(_) => "agent_parse_error",
        }
    }
}

impl ErrorCode for RegistryError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "registry_unreachable",
            Self::HttpStatus(_) => "registry_error_status",
            Self::Parse(_) => "registry_parse_error",
        }
    }
}

/// One device's contribution to an aggregate command failure.
///
/// The coordinator converts every per-device error into one of these at the
/// fan-out boundary, so a single unreachable device never aborts the batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFailure {
    /// Human-readable device name (from the registry).
    pub device: String,
    /// What went wrong on this device.
    pub detail: String,
}

impl std::fmt::Display for DeviceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.device, self.detail)
    }
}

/// Formats a list of per-device failures as a single `; `-joined breakdown.
fn format_failures(failures: &[DeviceFailure]) -> String {
    failures
        .iter()
        .map(DeviceFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Application-wide error type for the Marquee server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum MarqueeError {
    /// Directory service unreachable or returned garbage.
    #[error("Registry error: {0}")]
    Registry(String),

    /// A single device-agent request failed outside a fan-out context.
    #[error("Agent request failed: {0}")]
    Agent(String),

    /// A group command failed on one or more member devices.
    ///
    /// Carries the per-device breakdown; successful members are not listed
    /// (their effects stand - there is no rollback).
    #[error("{command} failed on {} device(s): {}", .failures.len(), format_failures(.failures))]
    CommandFailed {
        /// The logical command that was fanned out.
        command: String,
        /// Every failing device with its error detail.
        failures: Vec<DeviceFailure>,
    },

    /// Malformed input to a group store mutation (empty name, empty members).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Mutation or command targeting a group id that no longer exists.
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    /// Request targeting a host the registry does not know about.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Group persistence failed (disk I/O or serialization).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Server configuration error (missing required settings).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl MarqueeError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Registry(_) => "registry_error",
            Self::Agent(_) => "agent_error",
            Self::CommandFailed { .. } => "command_failed",
            Self::Validation(_) => "validation_error",
            Self::GroupNotFound(_) => "group_not_found",
            Self::DeviceNotFound(_) => "device_not_found",
            Self::Storage(_) => "storage_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal_error",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::GroupNotFound(_) | Self::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::CommandFailed { .. } | Self::Agent(_) => StatusCode::BAD_GATEWAY,
            Self::Registry(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type MarqueeResult<T> = Result<T, MarqueeError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for MarqueeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AgentError> for MarqueeError {
    fn from(err: AgentError) -> Self {
        Self::Agent(err.to_string())
    }
}

impl From<RegistryError> for MarqueeError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_returns_correct_code() {
        let err = MarqueeError::Validation("empty name".into());
        assert_eq!(err.code(), "validation_error");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn group_not_found_maps_to_404() {
        let err = MarqueeError::GroupNotFound("group_missing".into());
        assert_eq!(err.code(), "group_not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn command_failed_enumerates_each_failing_device() {
        let err = MarqueeError::CommandFailed {
            command: "play".into(),
            failures: vec![
                DeviceFailure {
                    device: "Lobby Left".into(),
                    detail: "connection refused".into(),
                },
                DeviceFailure {
                    device: "Lobby Right".into(),
                    detail: "HTTP 500".into(),
                },
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("play failed on 2 device(s)"));
        assert!(msg.contains("Lobby Left: connection refused"));
        assert!(msg.contains("Lobby Right: HTTP 500"));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
