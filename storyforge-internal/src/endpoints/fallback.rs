use axum::extract::Request;
use axum::response::IntoResponse;

use crate::error::{Error, ErrorDetails};

/// 404 handler for unmatched routes
pub async fn handle_404(request: Request) -> impl IntoResponse {
    Error::new(ErrorDetails::RouteNotFound {
        path: request.uri().path().to_string(),
        method: request.method().to_string(),
    })
}
