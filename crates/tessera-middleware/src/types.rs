//! HTTP types used throughout the pipeline.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;

/// The HTTP request type seen by middlewares.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type produced by middlewares.
pub type Response = http::Response<Full<Bytes>>;

/// Builds a response with the given status and an empty body.
#[must_use]
pub fn empty_response(status: StatusCode) -> Response {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
