//! Middleware that wraps route handlers.
//!
//! A middleware receives the next handler in the chain and returns a
//! replacement. Layers declared on groups wrap everything declared beneath
//! them, so the outermost group runs its pre-handler code first and its
//! post-handler code last.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, info};

use crate::request::{Method, Request};
use crate::response::Response;
use crate::router::Handler;

/// Trait for middleware that wraps a handler.
///
/// Any `Fn(Handler) -> Handler` closure is a middleware.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trie_router::{Handler, Request, Response, Route};
///
/// let route = Route::get("/ping", |_req: &mut Request, res: &mut Response| {
///     res.send_string("pong");
/// })
/// .middleware(|next: Handler| -> Handler {
///     Arc::new(move |req: &mut Request, res: &mut Response| {
///         next(req, res);
///         res.set_header("X-Layer", "outer");
///     })
/// });
/// ```
pub trait Middleware: Send + Sync {
    /// Returns a handler that runs this layer around `next`.
    fn wrap(&self, next: Handler) -> Handler;
}

impl<F> Middleware for F
where
    F: Fn(Handler) -> Handler + Send + Sync,
{
    fn wrap(&self, next: Handler) -> Handler {
        self(next)
    }
}

/// A middleware shared between every route it applies to.
pub type SharedMiddleware = Arc<dyn Middleware>;

/// `outer` wrapped around `inner`.
struct Layered {
    outer: SharedMiddleware,
    inner: SharedMiddleware,
}

impl Middleware for Layered {
    fn wrap(&self, next: Handler) -> Handler {
        self.outer.wrap(self.inner.wrap(next))
    }
}

/// Combines an ancestor's middleware with a descendant's.
///
/// The result runs `outer`'s pre-handler code, then `inner`'s, then the
/// handler, then `inner`'s post-handler code, then `outer`'s.
pub fn compose(
    outer: Option<SharedMiddleware>,
    inner: Option<SharedMiddleware>,
) -> Option<SharedMiddleware> {
    match (outer, inner) {
        (Some(outer), Some(inner)) => Some(Arc::new(Layered { outer, inner })),
        (outer, None) => outer,
        (None, inner) => inner,
    }
}

/// Middleware that logs requests.
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn wrap(&self, next: Handler) -> Handler {
        Arc::new(move |req: &mut Request, res: &mut Response| {
            info!(
                method = %req.method,
                path = %req.path,
                route = req.route().unwrap_or_default(),
                "request"
            );
            next(req, res);
            info!(status = res.status_code(), "response");
        })
    }
}

/// Middleware that adds CORS headers.
///
/// Preflight requests are answered without calling the handler. The router
/// only reaches this layer for methods bound on the route, so preflight
/// handling needs an `OPTIONS` route declared under it.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    /// Allowed origins.
    pub allowed_origins: Vec<String>,
    /// Allowed methods.
    pub allowed_methods: Vec<Method>,
    /// Allowed headers.
    pub allowed_headers: Vec<String>,
}

impl CorsMiddleware {
    /// Creates CORS middleware that allows all origins.
    pub fn permissive() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Options,
            ],
            allowed_headers: vec!["*".to_string()],
        }
    }

    /// Creates CORS middleware with specific origins.
    pub fn new(origins: &[&str]) -> Self {
        Self {
            allowed_origins: origins.iter().map(|s| (*s).to_string()).collect(),
            allowed_methods: vec![Method::Get, Method::Post, Method::Put, Method::Delete],
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
        }
    }
}

impl Middleware for CorsMiddleware {
    fn wrap(&self, next: Handler) -> Handler {
        let origins = self.allowed_origins.join(", ");
        let methods = self
            .allowed_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let headers = self.allowed_headers.join(", ");

        Arc::new(move |req: &mut Request, res: &mut Response| {
            if req.method == Method::Options {
                res.status(204)
                    .set_header("Access-Control-Allow-Origin", origins.as_str())
                    .set_header("Access-Control-Allow-Methods", methods.as_str())
                    .set_header("Access-Control-Allow-Headers", headers.as_str())
                    .set_header("Access-Control-Max-Age", "86400");
                return;
            }
            next(req, res);
            res.set_header("Access-Control-Allow-Origin", origins.as_str());
        })
    }
}

/// Middleware that requires authentication.
#[derive(Debug, Clone)]
pub struct AuthMiddleware {
    /// Paths to exclude from authentication.
    pub exclude: Vec<String>,
    /// The login redirect URL.
    pub login_url: String,
}

impl AuthMiddleware {
    /// Creates new auth middleware.
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            exclude: Vec::new(),
            login_url: login_url.into(),
        }
    }

    /// Adds paths to exclude from authentication.
    #[must_use]
    pub fn exclude(mut self, paths: &[&str]) -> Self {
        self.exclude = paths.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Checks if a path should be excluded.
    fn is_excluded(&self, path: &str) -> bool {
        self.exclude.iter().any(|p| path.starts_with(p))
    }

    fn is_authenticated(req: &Request) -> bool {
        req.get_header("Authorization").is_some()
            || req
                .get_header("Cookie")
                .is_some_and(|c| c.contains("session="))
    }
}

impl Middleware for AuthMiddleware {
    fn wrap(&self, next: Handler) -> Handler {
        let this = self.clone();
        Arc::new(move |req: &mut Request, res: &mut Response| {
            if this.is_excluded(&req.path) || Self::is_authenticated(req) {
                next(req, res);
            } else {
                *res = Response::redirect(this.login_url.as_str());
            }
        })
    }
}

/// Middleware that turns a panicking handler into a 500 response.
pub struct RecoverMiddleware;

impl RecoverMiddleware {
    fn describe(panic: &(dyn Any + Send)) -> &str {
        panic
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload")
    }
}

impl Middleware for RecoverMiddleware {
    fn wrap(&self, next: Handler) -> Handler {
        Arc::new(move |req: &mut Request, res: &mut Response| {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| next(req, res))) {
                error!(
                    method = %req.method,
                    path = %req.path,
                    panic = RecoverMiddleware::describe(&*panic),
                    "handler panicked"
                );
                *res = Response::internal_server_error();
            }
        })
    }
}
