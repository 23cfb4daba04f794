//! Request Handling
//!
//! Turns built routes into axum services. Each template route reads the request
//! into `RequestData`, runs its loaders and executes its template. Requests flagged
//! as partial (`HX-Request: true`, or an event stream) go to the interactions
//! router; everything else is answered with the root document.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequest, Query, Request};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{any, get, MethodRouter};
use axum::{Form, Router};
use futures_util::future::BoxFuture;
use handlebars::Handlebars;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::template::{Loader, RequestData};

/// Path-scoped middleware around a route handler.
pub type Middleware = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;

pub fn middleware<F, Fut>(f: F) -> Middleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |request, next| Box::pin(f(request, next)))
}

/// Sets `HX-Replace-Url` on every response so the browser shows `path`.
pub fn replace_url(path: impl Into<String>) -> Middleware {
    let path: String = path.into();
    middleware(move |request, next| {
        let value = HeaderValue::from_str(&path).ok();
        async move {
            let mut response = next.run(request).await;
            if let Some(value) = value {
                response.headers_mut().insert("hx-replace-url", value);
            }
            response
        }
    })
}

/// True for requests that want a fragment rather than the whole document.
pub fn is_partial(headers: &HeaderMap) -> bool {
    let htmx = headers
        .get("hx-request")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "true")
        .unwrap_or(false);
    let stream = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/event-stream"))
        .unwrap_or(false);
    htmx || stream
}

// ─── REQUEST DATA ───

/// Reads method, path, query, headers and a url-encoded body.
pub async fn request_data(request: Request, max_form_bytes: usize) -> Result<RequestData, StatusCode> {
    let (parts, body) = request.into_parts();
    let mut data = RequestData::new(parts.method.as_str(), parts.uri.path());
    // A malformed query string leaves the query empty.
    if let Ok(Query(query)) = Query::<BTreeMap<String, String>>::try_from_uri(&parts.uri) {
        data.query = query;
    }
    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            data.headers.insert(name.as_str().to_string(), value.to_string());
        }
    }
    let is_form = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);
    if is_form {
        let bytes = axum::body::to_bytes(body, max_form_bytes)
            .await
            .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;
        let request = Request::from_parts(parts, Body::from(bytes));
        let Form(form) = Form::<BTreeMap<String, String>>::from_request(request, &())
            .await
            .map_err(|rejection| rejection.into_response().status())?;
        data.form = form;
    }
    Ok(data)
}

// ─── TEMPLATE HANDLER ───

#[derive(Clone)]
pub struct TemplateHandler {
    registry: Arc<Handlebars<'static>>,
    name: String,
    loaders: Arc<Vec<Loader>>,
    max_form_bytes: usize,
}

impl TemplateHandler {
    pub fn new(
        registry: Arc<Handlebars<'static>>,
        name: String,
        loaders: Vec<Loader>,
        max_form_bytes: usize,
    ) -> Self {
        Self { registry, name, loaders: Arc::new(loaders), max_form_bytes }
    }

    pub async fn serve(self, request: Request) -> Response {
        let mut data = match request_data(request, self.max_form_bytes).await {
            Ok(data) => data,
            Err(status) => return status.into_response(),
        };
        for loader in self.loaders.iter() {
            loader(&mut data);
        }
        match self.registry.render(&self.name, &data.to_template_data()) {
            Ok(html) => Html(html).into_response(),
            Err(err) => {
                error!(template = %self.name, path = %data.path, error = %err, "failed to render template");
                (StatusCode::INTERNAL_SERVER_ERROR, "error rendering template").into_response()
            }
        }
    }

    /// The document answers any method; interactions answer GET and POST.
    fn into_method_router(self, document: bool) -> MethodRouter {
        let handle = move |request: Request| {
            let this = self.clone();
            async move { this.serve(request).await }
        };
        if document {
            any(handle)
        } else {
            get(handle.clone()).post(handle)
        }
    }
}

// ─── ASSEMBLY ───

pub enum MountKind {
    Template(TemplateHandler),
    Custom(MethodRouter),
}

pub struct Mount {
    pub path: String,
    pub middleware: Vec<Middleware>,
    pub kind: MountKind,
}

fn with_middleware(mut router: MethodRouter, middleware: &[Middleware]) -> MethodRouter {
    // Layers wrap what is already there, so apply in reverse to keep the first outermost.
    for m in middleware.iter().rev() {
        let m = m.clone();
        router = router.layer(from_fn(move |request: Request, next: Next| m(request, next)));
    }
    router
}

pub fn assemble(mounts: Vec<Mount>) -> Router {
    let mut document: Option<Router> = None;
    let mut interactions = Router::new();
    for mount in mounts {
        let is_document = mount.path == "/" && matches!(mount.kind, MountKind::Template(_));
        let router = match mount.kind {
            MountKind::Template(handler) => handler.into_method_router(is_document),
            MountKind::Custom(router) => router,
        };
        let router = with_middleware(router, &mount.middleware);
        if is_document {
            debug!("mounted document");
            document = Some(Router::new().fallback_service(router));
        } else {
            debug!(path = %mount.path, "mounted interaction");
            interactions = interactions.route(&mount.path, router);
        }
    }
    dispatch(document, interactions).layer(TraceLayer::new_for_http())
}

fn dispatch(document: Option<Router>, interactions: Router) -> Router {
    Router::new().fallback(move |request: Request| {
        let document = document.clone();
        let interactions = interactions.clone();
        async move {
            let target = match document {
                Some(document) if !is_partial(request.headers()) => document,
                _ => interactions,
            };
            match target.oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            }
        }
    })
}
