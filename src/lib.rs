pub mod compression {
    pub mod gzip;
}

pub mod configuration {
    pub mod server_config;
    pub mod tls_settings;
}

pub mod error {
    pub mod fixture_error;
    pub mod fixture_error_enums;
}

pub mod file {
    pub mod mime_table;
    pub mod resource_path;
    pub mod static_resources;
}

pub mod http {
    pub mod handle_request;
    pub mod http_auth;
    pub mod http_server;
    pub mod http_tls;
    pub mod http_util;
    pub mod request_response {
        pub mod body_error;
        pub mod fixture_body;
        pub mod fixture_request;
        pub mod fixture_response;
    }
}

pub mod logging {
    pub mod fixture_log;
}

pub mod multipart {
    pub mod multipart_decoder;
}

pub mod routing {
    pub mod request_awaiter;
    pub mod route_registry;
}

pub mod websocket {
    pub mod websocket_server;
}

pub use configuration::server_config::{Scheme, ServerConfig};
pub use configuration::tls_settings::{CertificateSource, ClientAuth, TlsSettings};
pub use error::fixture_error::FixtureServerError;
pub use error::fixture_error_enums::{FixtureServerErrorKind, MultipartError, TlsError};
pub use http::http_server::FixtureServer;
pub use http::request_response::fixture_request::FixtureRequest;
pub use http::request_response::fixture_response::FixtureResponse;
pub use multipart::multipart_decoder::MultipartField;
pub use routing::request_awaiter::RequestFuture;
pub use websocket::websocket_server::WebSocketServer;
