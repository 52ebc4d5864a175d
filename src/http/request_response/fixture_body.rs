use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use std::fmt::Debug;

use crate::http::request_response::body_error::BodyError;

pub enum FixtureBody {
    Buffered(Bytes),
    Streaming(BoxBody<Bytes, BodyError>),
}

impl FixtureBody {
    pub fn empty() -> Self {
        FixtureBody::Buffered(Bytes::new())
    }
}

impl Debug for FixtureBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureBody::Buffered(bytes) => write!(f, "FixtureBody::Buffered(len={})", bytes.len()),
            FixtureBody::Streaming(_) => write!(f, "FixtureBody::Streaming(...)"),
        }
    }
}
