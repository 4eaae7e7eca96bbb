//! Small response builders shared by the non-envelope routes.

use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// 307 to `location`, optionally carrying a `Set-Cookie`.
///
/// A location that is not a valid header value is reported as plain text.
pub fn redirect(location: &str, set_cookie: Option<HeaderValue>) -> Response {
    let Ok(location_value) = HeaderValue::from_str(location) else {
        tracing::warn!(location = %location, "Refusing invalid redirect target");
        return format!("invalid redirect location: {}", location).into_response();
    };

    let mut response = StatusCode::TEMPORARY_REDIRECT.into_response();
    response.headers_mut().insert(LOCATION, location_value);
    if let Some(cookie) = set_cookie {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}
