use crate::configuration::server_config::{Scheme, ServerConfig};
use crate::configuration::tls_settings::TlsSettings;
use crate::error::fixture_error::FixtureServerError;
use crate::error::fixture_error_enums::FixtureServerErrorKind;
use crate::file::static_resources::StaticResources;
use crate::http::handle_request::{DispatchContext, handle_request_entry};
use crate::http::http_tls::build_tls_acceptor;
use crate::http::request_response::fixture_request::FixtureRequest;
use crate::http::request_response::fixture_response::FixtureResponse;
use crate::routing::request_awaiter::RequestFuture;
use crate::routing::route_registry::RouteRegistry;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use log::{debug, error, info, trace};
use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tls_listener::rustls as tokio_rustls;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::select;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

/// In-process HTTP(S) server for browser-automation fixtures.
///
/// Serves the fixture directory, lets tests install routes, redirects, Basic
/// auth, CSP headers and gzip per path, and lets them await the next request
/// for a path. All per-path state can be cleared with [`FixtureServer::reset`]
/// without restarting the server.
pub struct FixtureServer {
    port: u16,
    scheme: Scheme,
    prefix: String,
    cross_process_prefix: String,
    empty_page: String,
    registry: Arc<RouteRegistry>,
    shutdown_token: CancellationToken,
}

impl FixtureServer {
    pub async fn create_http(port: u16) -> Result<Self, FixtureServerError> {
        Self::start(ServerConfig::http(port)).await
    }

    pub async fn create_https(port: u16) -> Result<Self, FixtureServerError> {
        Self::start(ServerConfig::https(port, TlsSettings::new())).await
    }

    /// HTTPS server that rejects handshakes without a client certificate signed by the bundled CA.
    pub async fn create_https_with_client_auth(port: u16) -> Result<Self, FixtureServerError> {
        Self::start(ServerConfig::https(port, TlsSettings::with_client_auth())).await
    }

    /// Binds `localhost:port` and starts serving on the current tokio runtime.
    pub async fn start(mut config: ServerConfig) -> Result<Self, FixtureServerError> {
        config.sanitize();

        // Unusable key material is a TLS failure, not a configuration one
        let tls_acceptor = match config.scheme {
            Scheme::Https => Some(build_tls_acceptor(&config.tls)?),
            Scheme::Http => None,
        };

        config
            .validate()
            .map_err(|errors| FixtureServerError::new(FixtureServerErrorKind::Configuration(errors), "Invalid fixture server configuration"))?;

        let v4_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.port));
        let v4_listener = TcpListener::bind(v4_addr)
            .await
            .map_err(|e| FixtureServerError::new(FixtureServerErrorKind::Bind(e), format!("Failed to bind {}", v4_addr)))?;
        let port = v4_listener
            .local_addr()
            .map_err(|e| FixtureServerError::new(FixtureServerErrorKind::Bind(e), "Failed to read bound address"))?
            .port();

        let mut listeners = vec![v4_listener];

        // Browsers may resolve localhost to ::1 first
        let v6_addr = SocketAddr::from((Ipv6Addr::LOCALHOST, port));
        match TcpListener::bind(v6_addr).await {
            Ok(listener) => listeners.push(listener),
            Err(e) => debug!("Not serving on {}: {}", v6_addr, e),
        }

        let registry = Arc::new(RouteRegistry::new());
        let context = Arc::new(DispatchContext {
            registry: registry.clone(),
            resources: StaticResources::new(config.resource_root.clone()),
            scheme: config.scheme,
        });
        let shutdown_token = CancellationToken::new();

        for listener in listeners {
            tokio::task::spawn(start_accept_loop(listener, context.clone(), tls_acceptor.clone(), shutdown_token.clone()));
        }

        info!("Fixture server listening on {}://localhost:{} (resources: {})", config.scheme, port, config.resource_root.display());

        Ok(FixtureServer {
            port,
            scheme: config.scheme,
            prefix: format!("{}://localhost:{}", config.scheme, port),
            cross_process_prefix: format!("{}://127.0.0.1:{}", config.scheme, port),
            empty_page: format!("{}://localhost:{}/empty.html", config.scheme, port),
            registry,
            shutdown_token,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// `http(s)://localhost:port`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `http(s)://127.0.0.1:port`, a different origin for the same server.
    pub fn cross_process_prefix(&self) -> &str {
        &self.cross_process_prefix
    }

    pub fn empty_page(&self) -> &str {
        &self.empty_page
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path)
    }

    pub fn cross_process_url(&self, path: &str) -> String {
        format!("{}{}", self.cross_process_prefix, path)
    }

    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    pub fn set_route<F>(&self, path: &str, handler: F)
    where
        F: Fn(&FixtureRequest) -> FixtureResponse + Send + Sync + 'static,
    {
        self.registry.set_route(path, handler);
    }

    pub fn set_async_route<F, Fut>(&self, path: &str, handler: F)
    where
        F: Fn(FixtureRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FixtureResponse> + Send + 'static,
    {
        self.registry.set_async_route(path, handler);
    }

    pub fn set_redirect(&self, from: &str, to: &str) {
        self.registry.set_redirect(from, to);
    }

    pub fn unset_route(&self, path: &str) -> bool {
        self.registry.unset_route(path)
    }

    pub fn set_auth(&self, path: &str, user: &str, password: &str) {
        self.registry.set_auth(path, user, password);
    }

    pub fn set_csp(&self, path: &str, csp: &str) {
        self.registry.set_csp(path, csp);
    }

    pub fn enable_gzip(&self, path: &str) {
        self.registry.enable_gzip(path);
    }

    pub fn future_request(&self, path: &str) -> RequestFuture {
        self.registry.future_request(path)
    }

    pub fn reset(&self) {
        self.registry.reset();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Stops accepting, drops open connections and cancels pending request awaits. Never blocks.
    pub fn stop(&self) {
        if self.is_stopped() {
            return;
        }
        info!("Stopping fixture server on port {}", self.port);
        self.shutdown_token.cancel();
        self.registry.reset();
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn start_accept_loop(listener: TcpListener, context: Arc<DispatchContext>, tls_acceptor: Option<TlsAcceptor>, shutdown_token: CancellationToken) {
    let local_addr = listener.local_addr().map(|addr| addr.to_string()).unwrap_or_else(|_| "<unknown>".to_string());
    trace!("Accepting connections on {}", local_addr);

    loop {
        select! {
            _ = shutdown_token.cancelled() => {
                trace!("Termination signal received, stopping listener on {}", local_addr);
                return;
            },
            result = listener.accept() => {
                match result {
                    Ok((tcp_stream, remote_addr)) => {
                        trace!("Accepted connection from {} on {}", remote_addr, local_addr);
                        let context = context.clone();
                        let shutdown_token = shutdown_token.clone();
                        match tls_acceptor.clone() {
                            Some(acceptor) => {
                                tokio::task::spawn(async move {
                                    let handshake = select! {
                                        _ = shutdown_token.cancelled() => return,
                                        handshake = acceptor.accept(tcp_stream) => handshake,
                                    };
                                    match handshake {
                                        Ok(tls_stream) => serve_connection(tls_stream, context, shutdown_token).await,
                                        Err(err) => debug!("TLS handshake error from {}: {:?}", remote_addr, err),
                                    }
                                });
                            }
                            None => {
                                tokio::task::spawn(serve_connection(tcp_stream, context, shutdown_token));
                            }
                        }
                    }
                    Err(err) => {
                        error!("Failed to accept connection on {}: {:?}", local_addr, err);
                    }
                }
            }
        }
    }
}

async fn serve_connection<I>(io: I, context: Arc<DispatchContext>, shutdown_token: CancellationToken)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(io);
    let svc = service_fn(move |req| handle_request_entry(req, context.clone()));
    let connection = http1::Builder::new().serve_connection(io, svc);

    select! {
        _ = shutdown_token.cancelled() => {
            trace!("Dropping in-flight connection on shutdown");
        },
        result = connection => {
            if let Err(err) = result {
                debug!("Error serving connection: {:?}", err);
            }
        }
    }
}
