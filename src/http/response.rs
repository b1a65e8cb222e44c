//! Outbound response construction.
//!
//! # Responsibilities
//! - Turn forwarded responses back into axum responses
//! - Render gateway-side failures (no route, body too large, forwarding error)
//!
//! # Design Decisions
//! - Gateway-side errors carry a small JSON body; upstream bodies pass through untouched
//! - Error details stay in the logs; the client sees the class of failure only

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::ForwardError;
use crate::http::message::ProxyResponse;
use crate::http::request::BodyError;

/// Convert a buffered proxy response into an axum response.
pub fn from_proxy(res: ProxyResponse) -> Response {
    let (parts, bytes) = res.into_parts();
    Response::from_parts(parts, Body::from(bytes))
}

fn error_response(status: StatusCode, error: &str, request_id: &str) -> Response {
    let body = json!({
        "error": error,
        "status": status.as_u16(),
        "request_id": request_id,
    });
    (status, axum::Json(body)).into_response()
}

pub fn no_route(request_id: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, "no matching route", request_id)
}

pub fn body_error(err: &BodyError, request_id: &str) -> Response {
    match err {
        BodyError::TooLarge { .. } => {
            error_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large", request_id)
        }
        BodyError::Read(_) => {
            error_response(StatusCode::BAD_REQUEST, "unreadable request body", request_id)
        }
    }
}

/// Default policy for a request that failed inside the gateway.
pub fn forward_error(err: &ForwardError, request_id: &str) -> Response {
    let (status, message) = match err {
        ForwardError::MissingParameter { .. } | ForwardError::Transform { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "request could not be forwarded")
        }
        ForwardError::Dispatch(_) => (StatusCode::BAD_GATEWAY, "upstream request failed"),
    };
    error_response(status, message, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use std::time::Duration;

    #[test]
    fn test_forward_error_statuses() {
        let res = forward_error(&ForwardError::MissingParameter { name: "id".into() }, "r1");
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ForwardError::Dispatch(DispatchError::Timeout(Duration::from_secs(1)));
        let res = forward_error(&err, "r1");
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(res.headers()["content-type"], "application/json");
    }

    #[test]
    fn test_body_errors() {
        let res = body_error(&BodyError::TooLarge { limit: 1 }, "r1");
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(no_route("r1").status(), StatusCode::NOT_FOUND);
    }
}
