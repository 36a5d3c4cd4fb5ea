use axum::{
    body::Body,
    http::{header, HeaderValue},
    response::Response,
};

use super::processor::ProcessedStream;

/// Wrap a processed stream in a chunked `text/plain` HTTP response
pub fn into_response(stream: ProcessedStream) -> Response {
    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}
