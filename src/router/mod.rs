//! Request routing: map a method and an exact path to a handler.
//!
//! Trailing slashes are ignored on both registered and incoming paths, so `/users/` and
//! `/users` are the same route. The first route registered for a method and path wins.
//! A path that is registered only under other methods gets `405 Method Not Allowed`;
//! any other path gets `404 Not Found`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::middleware::{Middleware, MiddlewareHandler, Next, from_middleware};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased, heap-allocated async handler that processes a [`Context`] and returns a
/// [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and shared across
/// connection tasks without copying the underlying closure.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Erases an async function into a [`Handler`].
pub fn into_handler<H, F>(handler: H) -> Handler
where
    H: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    Arc::new(
        move |ctx: Context| -> Pin<Box<dyn Future<Output = Response> + Send>> {
            Box::pin(handler(ctx))
        },
    )
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

// A single registered route binding a method + path to a handler.
struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// HTTP request router with an ordered middleware stack.
///
/// # Examples
///
/// ```rust,no_run
/// use usercache::{Router, Response, StatusCode};
/// use usercache::middleware::LoggerMiddleware;
///
/// let mut router = Router::new();
/// router.layer(LoggerMiddleware);
/// router.get("/health", |_ctx| async { Response::text(StatusCode::Ok, "ok") });
/// ```
pub struct Router {
    routes: Vec<Route>,
    middlewares: Arc<[MiddlewareHandler]>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            middlewares: Arc::from(Vec::new()),
        }
    }

    /// Register a handler for `GET` requests matching `path`.
    pub fn get<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.add_route(Method::Get, path, into_handler(handler));
    }

    /// Register a handler for `POST` requests matching `path`.
    pub fn post<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.add_route(Method::Post, path, into_handler(handler));
    }

    fn add_route(&mut self, method: Method, path: &str, handler: Handler) {
        self.routes.push(Route {
            method,
            path: trim_trailing_slash(path).to_owned(),
            handler,
        });
    }

    /// Appends `middleware` to the stack. Layers run in the order they were added,
    /// before the route handler.
    pub fn layer<M>(&mut self, middleware: M)
    where
        M: Middleware + 'static,
    {
        let mut stack = self.middlewares.to_vec();
        stack.push(from_middleware(Arc::new(middleware)));
        self.middlewares = stack.into();
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `request` through the middleware stack to the first matching route.
    ///
    /// Unmatched requests still pass through the middleware stack, ending at a
    /// `404` or `405` responder.
    pub async fn route(&self, request: Request) -> Response {
        let endpoint = self.resolve(request.method(), request.path());
        Next::new(Arc::clone(&self.middlewares), endpoint)
            .run(Context::new(request))
            .await
    }

    fn resolve(&self, method: &Method, path: &str) -> Handler {
        let path = trim_trailing_slash(path);
        let mut path_matched = false;

        for route in self.routes.iter().filter(|r| r.path == path) {
            if &route.method == method {
                return Arc::clone(&route.handler);
            }
            path_matched = true;
        }

        let status = if path_matched {
            StatusCode::MethodNotAllowed
        } else {
            StatusCode::NotFound
        };
        into_handler(move |_ctx| async move {
            Response::text(status, status.canonical_reason())
        })
    }
}
