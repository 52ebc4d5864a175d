use http::StatusCode;
use http::header::WWW_AUTHENTICATE;

use crate::http::http_auth::WWW_AUTHENTICATE_VALUE;
use crate::http::request_response::fixture_response::FixtureResponse;

pub fn unauthorized_response() -> FixtureResponse {
    FixtureResponse::text(StatusCode::UNAUTHORIZED, "HTTP Error 401 Unauthorized: Access is denied").with_header(WWW_AUTHENTICATE.as_str(), WWW_AUTHENTICATE_VALUE)
}

pub fn not_found_response(path: &str) -> FixtureResponse {
    FixtureResponse::text(StatusCode::NOT_FOUND, format!("File not found: {}", path))
}

pub fn internal_error_response(message: &str) -> FixtureResponse {
    FixtureResponse::text(StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
}
