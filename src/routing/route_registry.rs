use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use log::trace;

use crate::http::http_auth::basic_credentials;
use crate::http::request_response::fixture_request::FixtureRequest;
use crate::http::request_response::fixture_response::FixtureResponse;
use crate::routing::request_awaiter::{RequestFuture, Subscription};

/// Custom response logic installed for a path at runtime.
pub type RouteHandler = Arc<dyn Fn(FixtureRequest) -> BoxFuture<'static, FixtureResponse> + Send + Sync>;

#[derive(Clone)]
pub enum Route {
    Handler(RouteHandler),
    Redirect(String),
}

impl Route {
    pub async fn respond(&self, request: FixtureRequest) -> FixtureResponse {
        match self {
            Route::Handler(handler) => handler(request).await,
            Route::Redirect(location) => FixtureResponse::redirect(location),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Handler(_) => write!(f, "Route::Handler(...)"),
            Route::Redirect(location) => write!(f, "Route::Redirect({})", location),
        }
    }
}

#[derive(Default)]
struct RegistryTables {
    routes: HashMap<String, Route>,
    // Expected "user:password"
    auths: HashMap<String, String>,
    csp: HashMap<String, String>,
    gzip: HashSet<String>,
    subscribers: HashMap<String, Subscription>,
}

/// Everything the dispatch engine needs to know about one path, taken in a single
/// critical section. The subscriber, if any, has already been removed from the registry.
#[derive(Debug, Default)]
pub(crate) struct RequestPlan {
    pub(crate) subscriber: Option<Subscription>,
    pub(crate) route: Option<Route>,
    pub(crate) csp: Option<String>,
    pub(crate) gzip: bool,
}

/// The path is protected and the request did not carry the right Basic credentials.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct AuthRejected;

impl RequestPlan {
    /// Completes the await subscription for this request, if there is one.
    pub(crate) fn notify_subscriber(&mut self, request: &FixtureRequest) {
        if let Some(subscriber) = self.subscriber.take() {
            subscriber.fulfill(request.clone());
        }
    }
}

// All mutable per-server state, keyed by the path component of the request URI.
// One mutex guards every table so reset and lookups never see a half-cleared state.
#[derive(Default)]
pub struct RouteRegistry {
    tables: Mutex<RegistryTables>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryTables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_route<F>(&self, path: &str, handler: F)
    where
        F: Fn(&FixtureRequest) -> FixtureResponse + Send + Sync + 'static,
    {
        let handler: RouteHandler = Arc::new(move |request: FixtureRequest| {
            let response = handler(&request);
            futures::future::ready(response).boxed()
        });
        self.insert_route(path, Route::Handler(handler));
    }

    pub fn set_async_route<F, Fut>(&self, path: &str, handler: F)
    where
        F: Fn(FixtureRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FixtureResponse> + Send + 'static,
    {
        let handler: RouteHandler = Arc::new(move |request: FixtureRequest| handler(request).boxed());
        self.insert_route(path, Route::Handler(handler));
    }

    pub fn set_redirect(&self, from: &str, to: &str) {
        self.insert_route(from, Route::Redirect(to.to_string()));
    }

    fn insert_route(&self, path: &str, route: Route) {
        trace!("Installing {:?} for {}", route, path);
        self.lock().routes.insert(path.to_string(), route);
    }

    /// Removes a route or redirect. Returns whether one was installed.
    pub fn unset_route(&self, path: &str) -> bool {
        self.lock().routes.remove(path).is_some()
    }

    pub fn set_auth(&self, path: &str, user: &str, password: &str) {
        self.lock().auths.insert(path.to_string(), format!("{}:{}", user, password));
    }

    pub fn set_csp(&self, path: &str, csp: &str) {
        self.lock().csp.insert(path.to_string(), csp.to_string());
    }

    pub fn enable_gzip(&self, path: &str) {
        self.lock().gzip.insert(path.to_string());
    }

    /// Returns the pending future for `path`, creating the subscription if there is none.
    pub fn future_request(&self, path: &str) -> RequestFuture {
        let mut tables = self.lock();
        tables.subscribers.entry(path.to_string()).or_insert_with(|| Subscription::new(path)).future()
    }

    pub fn pending_subscriptions(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Clears every table. Pending subscriptions are dropped, which resolves their futures as cancelled.
    pub fn reset(&self) {
        let cleared = std::mem::take(&mut *self.lock());
        trace!(
            "Registry reset: {} routes, {} auths, {} csp, {} gzip, {} subscriptions cleared",
            cleared.routes.len(),
            cleared.auths.len(),
            cleared.csp.len(),
            cleared.gzip.len(),
            cleared.subscribers.len()
        );
    }

    /// Snapshot of the configuration for `path`, removing its await subscription.
    ///
    /// `authorization` is the raw `Authorization` header. A protected path with
    /// missing or wrong credentials is rejected before anything is taken from
    /// the registry, so a pending await survives a 401.
    pub(crate) fn plan(&self, path: &str, authorization: Option<&str>) -> Result<RequestPlan, AuthRejected> {
        let mut tables = self.lock();
        if let Some(expected) = tables.auths.get(path) {
            let provided = authorization.and_then(basic_credentials);
            if provided.as_deref() != Some(expected.as_str()) {
                trace!("Rejecting request for {}: credentials missing or wrong", path);
                return Err(AuthRejected);
            }
        }

        Ok(RequestPlan {
            subscriber: tables.subscribers.remove(path),
            route: tables.routes.get(path).cloned(),
            csp: tables.csp.get(path).cloned(),
            gzip: tables.gzip.contains(path),
        })
    }
}
