use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// A single offending field in a rejected generation request.
///
/// These are the only validation details that cross the gateway boundary:
/// the field name and a short human-readable constraint description.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, PartialEq)]
// As long as the struct member is private, we force people to use the `new` method and log the error.
// We box `ErrorDetails` per the `clippy::result_large_err` lint
pub struct Error(Box<ErrorDetails>);

impl Error {
    pub fn new(details: ErrorDetails) -> Self {
        details.log();
        Error(Box::new(details))
    }

    pub fn new_without_logging(details: ErrorDetails) -> Self {
        Error(Box::new(details))
    }

    pub fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }

    pub fn get_details(&self) -> &ErrorDetails {
        &self.0
    }

    pub fn get_owned_details(self) -> ErrorDetails {
        *self.0
    }

    pub fn log(&self) {
        self.0.log();
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl From<ErrorDetails> for Error {
    fn from(details: ErrorDetails) -> Self {
        Error::new(details)
    }
}

#[derive(Debug, PartialEq)]
pub enum ErrorDetails {
    AccessDenied {
        project_id: Uuid,
    },
    AppState {
        message: String,
    },
    Authentication {
        message: String,
    },
    ClientSide {
        message: String,
    },
    Config {
        message: String,
    },
    Generation {
        message: String,
        status_code: Option<StatusCode>,
    },
    JsonRequest {
        message: String,
    },
    ProfileStore {
        message: String,
    },
    ProjectStore {
        message: String,
    },
    QuotaExceeded {
        quota: u32,
    },
    RouteNotFound {
        path: String,
        method: String,
    },
    UsageLog {
        message: String,
    },
    Validation {
        fields: Vec<FieldError>,
    },
}

impl ErrorDetails {
    /// Defines the log level for each error
    pub fn level(&self) -> tracing::Level {
        match self {
            ErrorDetails::AccessDenied { .. } => tracing::Level::WARN,
            ErrorDetails::AppState { .. } => tracing::Level::ERROR,
            ErrorDetails::Authentication { .. } => tracing::Level::WARN,
            ErrorDetails::ClientSide { .. } => tracing::Level::WARN,
            ErrorDetails::Config { .. } => tracing::Level::ERROR,
            ErrorDetails::Generation { .. } => tracing::Level::ERROR,
            ErrorDetails::JsonRequest { .. } => tracing::Level::WARN,
            ErrorDetails::ProfileStore { .. } => tracing::Level::ERROR,
            ErrorDetails::ProjectStore { .. } => tracing::Level::ERROR,
            ErrorDetails::QuotaExceeded { .. } => tracing::Level::WARN,
            ErrorDetails::RouteNotFound { .. } => tracing::Level::WARN,
            // Log-append failures are a persistence warning: the generation
            // already succeeded and must still be returned to the caller.
            ErrorDetails::UsageLog { .. } => tracing::Level::WARN,
            ErrorDetails::Validation { .. } => tracing::Level::WARN,
        }
    }

    /// Defines the HTTP status code for each error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorDetails::AccessDenied { .. } => StatusCode::FORBIDDEN,
            ErrorDetails::AppState { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::Authentication { .. } => StatusCode::UNAUTHORIZED,
            ErrorDetails::ClientSide { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::Generation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::JsonRequest { .. } => StatusCode::BAD_REQUEST,
            ErrorDetails::ProfileStore { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::ProjectStore { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            ErrorDetails::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            ErrorDetails::UsageLog { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::Validation { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Log the error using the `tracing` library
    pub fn log(&self) {
        match self.level() {
            tracing::Level::ERROR => tracing::error!("{self}"),
            tracing::Level::WARN => tracing::warn!("{self}"),
            tracing::Level::INFO => tracing::info!("{self}"),
            tracing::Level::DEBUG => tracing::debug!("{self}"),
            tracing::Level::TRACE => tracing::trace!("{self}"),
        }
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDetails::AccessDenied { project_id } => {
                write!(
                    f,
                    "Access denied for project {project_id} (missing or owned by another account)"
                )
            }
            ErrorDetails::AppState { message } => {
                write!(f, "Error initializing AppState: {message}")
            }
            ErrorDetails::Authentication { message } => {
                write!(f, "Authentication failed: {message}")
            }
            ErrorDetails::ClientSide { message } => {
                write!(f, "Client-side request failed: {message}")
            }
            ErrorDetails::Config { message } => {
                write!(f, "{message}")
            }
            ErrorDetails::Generation {
                message,
                status_code,
            } => {
                write!(
                    f,
                    "Error{} from generation backend: {message}",
                    status_code.map_or(String::new(), |s| format!(" {s}"))
                )
            }
            ErrorDetails::JsonRequest { message } => write!(f, "{message}"),
            ErrorDetails::ProfileStore { message } => {
                write!(f, "Error from profile store: {message}")
            }
            ErrorDetails::ProjectStore { message } => {
                write!(f, "Error from project store: {message}")
            }
            ErrorDetails::QuotaExceeded { quota } => {
                write!(f, "Monthly credit quota of {quota} exhausted")
            }
            ErrorDetails::RouteNotFound { path, method } => {
                write!(f, "Route not found: {method} {path}")
            }
            ErrorDetails::UsageLog { message } => {
                write!(f, "Error appending usage log entry: {message}")
            }
            ErrorDetails::Validation { fields } => {
                write!(
                    f,
                    "Invalid request data: {}",
                    fields
                        .iter()
                        .map(|e| format!("{}: {}", e.field, e.message))
                        .collect::<Vec<_>>()
                        .join("; ")
                )
            }
        }
    }
}

impl Error {
    /// Get the JSON response body that would be sent to clients.
    ///
    /// Internal error text (store errors, backend error bodies, config
    /// problems) never crosses the boundary: every server-side failure maps
    /// to a fixed, safe message. Validation errors carry field-level details
    /// because those only describe the caller's own input.
    pub fn to_response_json(&self) -> (StatusCode, Value) {
        let body = match self.get_details() {
            ErrorDetails::Authentication { .. } => json!({ "error": "Unauthorized" }),
            ErrorDetails::JsonRequest { message } => json!({
                "error": "Invalid request data",
                "message": message,
            }),
            ErrorDetails::Validation { fields } => json!({
                "error": "Invalid request data",
                "details": fields,
            }),
            ErrorDetails::QuotaExceeded { quota } => json!({
                "error": "Credit limit reached",
                "message": format!(
                    "You've used all {quota} credits this month. Upgrade to get more!"
                ),
            }),
            ErrorDetails::AccessDenied { .. } => {
                json!({ "error": "Project not found or access denied" })
            }
            ErrorDetails::ProfileStore { .. } => {
                json!({ "error": "Failed to verify subscription" })
            }
            ErrorDetails::RouteNotFound { .. } => json!({ "error": "Route not found" }),
            _ => json!({ "error": "An error occurred while generating content" }),
        };
        (self.status_code(), body)
    }
}

impl IntoResponse for Error {
    /// Convert the error into an Axum response with the safe body shape
    fn into_response(self) -> Response {
        let (status_code, body) = self.to_response_json();
        (status_code, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_error() {
        let error = Error::new(ErrorDetails::QuotaExceeded { quota: 5 });

        assert_eq!(error.to_string(), "Monthly credit quota of 5 exhausted");
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(error.get_details().level(), tracing::Level::WARN);

        let (status, body) = error.to_response_json();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Credit limit reached");
        assert_eq!(
            body["message"],
            "You've used all 5 credits this month. Upgrade to get more!"
        );
    }

    #[test]
    fn test_access_denied_body_does_not_leak_project_id() {
        let project_id = Uuid::now_v7();
        let error = Error::new(ErrorDetails::AccessDenied { project_id });

        let (status, body) = error.to_response_json();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Project not found or access denied");
        assert!(!body.to_string().contains(&project_id.to_string()));
    }

    #[test]
    fn test_store_error_body_hides_internal_message() {
        let error = Error::new(ErrorDetails::ProfileStore {
            message: "connection refused (127.0.0.1:5432)".to_string(),
        });

        let (status, body) = error.to_response_json();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to verify subscription");
        assert!(!body.to_string().contains("connection refused"));
    }

    #[test]
    fn test_validation_error_enumerates_fields() {
        let error = Error::new(ErrorDetails::Validation {
            fields: vec![FieldError {
                field: "prompt",
                message: "must be at most 2000 characters".to_string(),
            }],
        });

        let (status, body) = error.to_response_json();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request data");
        assert_eq!(body["details"][0]["field"], "prompt");
    }

    #[test]
    fn test_error_into_response() {
        let error = Error::new(ErrorDetails::Authentication {
            message: "missing authorization header".to_string(),
        });

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
