use crate::http::request_response::body_error::BodyError;
use crate::http::request_response::fixture_body::FixtureBody;
use http::HeaderValue;
use http::header::{CONTENT_TYPE, HeaderName, LOCATION};
use http_body_util::BodyExt;
use http_body_util::Full;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use log::warn;

// Response produced by route handlers and by the static fallback
#[derive(Debug)]
pub struct FixtureResponse {
    status: StatusCode,
    headers: http::HeaderMap,
    body: FixtureBody,
}

impl FixtureResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: http::HeaderMap::new(),
            body: FixtureBody::empty(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Plain text response with `Content-Type: text/plain`.
    pub fn text<T: Into<Bytes>>(status: StatusCode, body: T) -> Self {
        Self::new(status).with_header(CONTENT_TYPE.as_str(), "text/plain").with_body(body)
    }

    /// `302 Found` pointing at `location`, empty body.
    pub fn redirect(location: &str) -> Self {
        Self::new(StatusCode::FOUND).with_header(LOCATION.as_str(), location)
    }

    /// Appends a header. Invalid names or values are logged and dropped, route
    /// handlers are test code and should not take the connection down.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!("Dropping invalid response header {:?}: {:?}", name, value),
        }
        self
    }

    pub fn with_body<T: Into<Bytes>>(mut self, body: T) -> Self {
        self.body = FixtureBody::Buffered(body.into());
        self
    }

    pub fn with_streaming_body(mut self, body: BoxBody<Bytes, BodyError>) -> Self {
        self.body = FixtureBody::Streaming(body);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut http::HeaderMap {
        &mut self.headers
    }

    pub fn get_header(&self, header_name: &str) -> Option<&str> {
        self.headers.get(header_name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &FixtureBody {
        &self.body
    }

    // Convert back into a hyper Response
    pub fn into_hyper(self) -> Response<BoxBody<Bytes, BodyError>> {
        let body: BoxBody<Bytes, BodyError> = match self.body {
            FixtureBody::Buffered(bytes) => BoxBody::new(Full::new(bytes).map_err(|never| -> BodyError { match never {} })),
            FixtureBody::Streaming(boxed_body) => boxed_body,
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
