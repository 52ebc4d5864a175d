use crate::compression::gzip::gzip_body;
use crate::configuration::server_config::Scheme;
use crate::file::resource_path::normalize_request_path;
use crate::file::static_resources::{StaticLookup, StaticResources};
use crate::http::http_util::*;
use crate::http::request_response::body_error::BodyError;
use crate::http::request_response::fixture_request::FixtureRequest;
use crate::http::request_response::fixture_response::FixtureResponse;
use crate::routing::route_registry::{RequestPlan, RouteRegistry};
use http::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_SECURITY_POLICY, CONTENT_TYPE};
use http_body_util::combinators::BoxBody;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response};
use log::{debug, trace};
use std::sync::Arc;

// State shared by every connection of one server instance
pub struct DispatchContext {
    pub registry: Arc<RouteRegistry>,
    pub resources: StaticResources,
    pub scheme: Scheme,
}

// Entry point from hyper's service_fn
pub async fn handle_request_entry(req: Request<hyper::body::Incoming>, context: Arc<DispatchContext>) -> Result<Response<BoxBody<Bytes, BodyError>>, hyper::Error> {
    let method = req.method().clone();
    let path_and_query = req.uri().path_and_query().map(|pq| pq.as_str().to_string()).unwrap_or_default();

    let response = handle_request(req, &context).await?;
    trace!("{} {} -> {}", method, path_and_query, response.status());

    Ok(response.into_hyper())
}

/// Runs one request through auth, await subscribers, route overrides and the static fallback.
///
/// Only a failure to read the request body is returned as an error, every other
/// outcome is an HTTP response.
pub async fn handle_request<B>(req: Request<B>, context: &DispatchContext) -> Result<FixtureResponse, B::Error>
where
    B: Body,
{
    let authorization = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_string);
    let request = FixtureRequest::from_hyper(req, context.scheme.as_str()).await?;
    let raw_path = request.path().to_string();
    // Every spelling of a resource path shares its auth, CSP, gzip and route entries
    let path = normalize_request_path(&raw_path);

    let mut plan = match context.registry.plan(&path, authorization.as_deref()) {
        Ok(plan) => plan,
        Err(_) => return Ok(unauthorized_response()),
    };

    plan.notify_subscriber(&request);

    if let Some(route) = plan.route.take() {
        trace!("Route override for {}", path);
        return Ok(route.respond(request).await);
    }

    Ok(serve_static(&raw_path, &plan, &context.resources).await)
}

async fn serve_static(path: &str, plan: &RequestPlan, resources: &StaticResources) -> FixtureResponse {
    let resource = match resources.lookup(path).await {
        Ok(StaticLookup::Found(resource)) => resource,
        Ok(StaticLookup::NotFound) => return not_found_response(path),
        Err(e) => {
            debug!("Failed to serve static resource {}: {}", path, e);
            return internal_error_response(&e.to_string());
        }
    };

    let mut response = FixtureResponse::ok().with_header(CONTENT_TYPE.as_str(), resource.mime_type);

    if let Some(csp) = &plan.csp {
        response = response.with_header(CONTENT_SECURITY_POLICY.as_str(), csp);
    }

    let body = if plan.gzip {
        match gzip_body(&resource.content) {
            Some(gzipped) => {
                response = response.with_header(CONTENT_ENCODING.as_str(), "gzip");
                gzipped
            }
            None => resource.content,
        }
    } else {
        resource.content
    };

    response.with_body(body)
}
