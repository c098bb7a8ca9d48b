//! Backend error taxonomy.
//!
//! Non-2xx responses carry a `detail` field that is either a plain message or a
//! list of field-level validation errors. Both shapes are folded into one
//! [`ApiError`] so callers never look at raw bodies.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const NETWORK_MESSAGE: &str = "Could not reach the server. Check your connection and try again.";
const AUTH_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";
const FORBIDDEN_MESSAGE: &str = "You do not have permission to do that.";

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted location such as `body.quantity`.
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors from a backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// 401. The stored session has been cleared.
    #[error("session expired")]
    AuthExpired,

    /// 403.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// 422 with field-level errors.
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    /// 400. The message is the server's, verbatim.
    #[error("{0}")]
    Conflict(String),

    /// 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-2xx status.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The request never completed or the body was not the expected JSON.
    #[error("network error: {0}")]
    Network(String),
}

impl ApiError {
    /// A single display line for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthExpired => AUTH_EXPIRED_MESSAGE.to_string(),
            Self::Forbidden(message) if message.is_empty() => FORBIDDEN_MESSAGE.to_string(),
            Self::Forbidden(message)
            | Self::Conflict(message)
            | Self::NotFound(message)
            | Self::Server { message, .. } => message.clone(),
            Self::Validation(fields) => join_fields(fields),
            Self::Network(_) => NETWORK_MESSAGE.to_string(),
        }
    }

    /// Whether the caller should send the user back to the login screen.
    #[must_use]
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }

    /// Map a non-2xx status and its body onto the taxonomy.
    pub(crate) fn from_response(status: u16, body: &[u8]) -> Self {
        let detail = parse_detail(body);
        let message = || match &detail {
            Some(Detail::Message(m)) => m.clone(),
            Some(Detail::Fields(fields)) => join_fields(fields),
            None => format!("HTTP error {status}"),
        };

        match status {
            401 => Self::AuthExpired,
            403 => Self::Forbidden(match &detail {
                Some(_) => message(),
                None => String::new(),
            }),
            404 => Self::NotFound(message()),
            400 => Self::Conflict(message()),
            422 => match detail {
                Some(Detail::Fields(fields)) => Self::Validation(fields),
                Some(Detail::Message(m)) => Self::Validation(vec![FieldError {
                    field: String::new(),
                    message: m,
                }]),
                None => Self::Validation(Vec::new()),
            },
            _ => Self::Server {
                status,
                message: message(),
            },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    if fields.is_empty() {
        return "Validation failed".to_string();
    }
    fields
        .iter()
        .map(|f| {
            if f.field.is_empty() {
                f.message.clone()
            } else {
                f.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

enum Detail {
    Message(String),
    Fields(Vec<FieldError>),
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
}

#[derive(Deserialize)]
struct RawFieldError {
    #[serde(default)]
    loc: Vec<Value>,
    msg: String,
}

fn parse_detail(body: &[u8]) -> Option<Detail> {
    let detail = serde_json::from_slice::<ErrorBody>(body).ok()?.detail?;
    match detail {
        Value::String(message) => Some(Detail::Message(message)),
        Value::Array(items) => {
            let fields = items
                .into_iter()
                .filter_map(|item| serde_json::from_value::<RawFieldError>(item).ok())
                .map(|raw| FieldError {
                    field: raw
                        .loc
                        .iter()
                        .map(|part| match part {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join("."),
                    message: raw.msg,
                })
                .collect();
            Some(Detail::Fields(fields))
        }
        other => Some(Detail::Message(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_detail_is_verbatim() {
        let err = ApiError::from_response(
            400,
            br#"{"detail":"Invalid status transition from 'ready' to 'pending'."}"#,
        );
        assert_eq!(
            err,
            ApiError::Conflict("Invalid status transition from 'ready' to 'pending'.".to_string())
        );
        assert_eq!(
            err.user_message(),
            "Invalid status transition from 'ready' to 'pending'."
        );
    }

    #[test]
    fn test_field_errors_are_joined() {
        let body = br#"{"detail":[
            {"loc":["body","quantity"],"msg":"ensure this value is less than or equal to 99","type":"x"},
            {"loc":["query","item",0],"msg":"field required"}
        ]}"#;
        let err = ApiError::from_response(422, body);
        let ApiError::Validation(fields) = &err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(
            err.user_message(),
            "body.quantity: ensure this value is less than or equal to 99, query.item.0: field required"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from_response(401, b"{}"), ApiError::AuthExpired);
        assert!(matches!(
            ApiError::from_response(403, br#"{"detail":"Store access only"}"#),
            ApiError::Forbidden(m) if m == "Store access only"
        ));
        assert!(matches!(
            ApiError::from_response(404, br#"{"detail":"Order not found"}"#),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_response(503, b"<html>busy</html>"),
            ApiError::Server { status: 503, message } if message == "HTTP error 503"
        ));
    }

    #[test]
    fn test_network_message_suggests_retry() {
        let err = ApiError::Network("connection refused".to_string());
        assert!(err.user_message().contains("try again"));
        assert_eq!(
            ApiError::Forbidden(String::new()).user_message(),
            FORBIDDEN_MESSAGE
        );
    }
}
