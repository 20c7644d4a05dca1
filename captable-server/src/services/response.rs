//! HTTP response building helpers

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::error::CapTableError;

pub type HttpResponse = Response<Full<Bytes>>;

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(json) => with_body(status, "application/json", Bytes::from(json)),
        Err(e) => {
            error!(error = %e, "Failed to serialize response body");
            with_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "application/json",
                Bytes::from_static(br#"{"error":"serialization failed"}"#),
            )
        }
    }
}

pub fn ok<T: Serialize>(body: &T) -> HttpResponse {
    json_response(StatusCode::OK, body)
}

pub fn created<T: Serialize>(body: &T) -> HttpResponse {
    json_response(StatusCode::CREATED, body)
}

pub fn error_message(status: StatusCode, message: &str) -> HttpResponse {
    json_response(status, &serde_json::json!({ "error": message }))
}

pub fn not_found(message: &str) -> HttpResponse {
    error_message(StatusCode::NOT_FOUND, message)
}

pub fn bad_request(message: &str) -> HttpResponse {
    error_message(StatusCode::BAD_REQUEST, message)
}

pub fn unauthorized(message: &str) -> HttpResponse {
    error_message(StatusCode::UNAUTHORIZED, message)
}

pub fn method_not_allowed() -> HttpResponse {
    error_message(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

pub fn payload_too_large() -> HttpResponse {
    error_message(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
}

/// Raw bytes with a content type.
pub fn binary_response(content_type: &str, body: Vec<u8>) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    let value = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    response.headers_mut().insert(header::CONTENT_TYPE, value);
    response
}

/// Status code for an error.
pub fn status_for(error: &CapTableError) -> StatusCode {
    match error {
        CapTableError::Validation(_) | CapTableError::Json(_) => StatusCode::BAD_REQUEST,
        CapTableError::Forbidden(_) => StatusCode::FORBIDDEN,
        CapTableError::NotFound(_) => StatusCode::NOT_FOUND,
        CapTableError::Conflict(_) => StatusCode::CONFLICT,
        CapTableError::Dependency(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a CapTableError to an appropriate HTTP response
pub fn error_response(error: CapTableError) -> HttpResponse {
    let status = status_for(&error);
    if status.is_server_error() {
        error!(error = %error, "Request failed");
    }
    error_message(status, &error.to_string())
}

pub fn from_result<T: Serialize>(result: Result<T, CapTableError>) -> HttpResponse {
    match result {
        Ok(value) => ok(&value),
        Err(e) => error_response(e),
    }
}

pub fn from_create_result<T: Serialize>(result: Result<T, CapTableError>) -> HttpResponse {
    match result {
        Ok(value) => created(&value),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&CapTableError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&CapTableError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&CapTableError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&CapTableError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&CapTableError::Dependency("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&CapTableError::Internal("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_json_content_type() {
        let resp = ok(&serde_json::json!({"ok": true}));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    }
}
