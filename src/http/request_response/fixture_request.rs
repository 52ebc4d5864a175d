use http::header::HOST;
use http::request::Parts;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::{HeaderMap, Method, Request, Uri};

// Snapshot of an inbound request. The body is collected up front so the same
// snapshot can be handed to an await subscriber and a route handler.
#[derive(Clone, Debug)]
pub struct FixtureRequest {
    method: Method,
    uri: Uri,
    url: String,
    headers: HeaderMap,
    body: Bytes,
}

impl FixtureRequest {
    /// Collects the full body of a hyper request and captures it together with the request head.
    pub async fn from_hyper<B>(hyper_request: Request<B>, scheme: &str) -> Result<Self, B::Error>
    where
        B: hyper::body::Body,
    {
        let (parts, body) = hyper_request.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok(Self::from_parts(parts, body, scheme))
    }

    pub fn from_parts(parts: Parts, body: Bytes, scheme: &str) -> Self {
        let url = Self::build_url(&parts.uri, &parts.headers, scheme);
        Self {
            method: parts.method,
            uri: parts.uri,
            url,
            headers: parts.headers,
            body,
        }
    }

    fn build_url(uri: &Uri, headers: &HeaderMap, scheme: &str) -> String {
        // Absolute-form URI, nothing to rebuild
        if uri.scheme().is_some() && uri.authority().is_some() {
            return uri.to_string();
        }

        let host = headers.get(HOST).and_then(|h| h.to_str().ok()).filter(|h| !h.is_empty()).unwrap_or("localhost");
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("{}://{}{}", scheme, host, path_and_query)
    }

    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of the named header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of the named header, skipping values that are not valid UTF-8.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers.get_all(name).iter().filter_map(|v| v.to_str().ok()).collect()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
