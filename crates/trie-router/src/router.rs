//! Route declarations and the router façade.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::middleware::{compose, Middleware, SharedMiddleware};
use crate::request::{Method, Request};
use crate::response::{Response, Transport};
use crate::tree::{Node, Tree};

/// A route handler. Results are observed only through the response buffer.
pub type Handler = Arc<dyn Fn(&mut Request, &mut Response) + Send + Sync>;

/// A route declaration.
///
/// A declaration with children is a group: its path prefixes every child and
/// its middleware wraps every child, while its own method and handler are
/// ignored. A declaration without children is a leaf and needs both a
/// method and a handler.
#[derive(Clone, Default)]
pub struct Route {
    /// Path pattern relative to the enclosing group.
    pub path: String,
    /// HTTP method. Required on leaves.
    pub method: Option<Method>,
    /// Request handler. Required on leaves.
    pub handler: Option<Handler>,
    /// Middleware wrapping this route and everything beneath it.
    pub middleware: Option<SharedMiddleware>,
    /// Nested routes.
    pub children: Vec<Route>,
}

impl Route {
    /// Creates a leaf route.
    pub fn new<F>(method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        Self::path(path).method(method).handler(handler)
    }

    /// Creates a declaration with only a path.
    pub fn path(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Self::default()
        }
    }

    /// Creates a group. Add children with [`Route::child`] or [`Route::children`].
    pub fn group(path: &str) -> Self {
        Self::path(path)
    }

    /// Creates a GET route.
    pub fn get<F>(path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        Self::new(Method::Get, path, handler)
    }

    /// Creates a POST route.
    pub fn post<F>(path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        Self::new(Method::Post, path, handler)
    }

    /// Creates a PUT route.
    pub fn put<F>(path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        Self::new(Method::Put, path, handler)
    }

    /// Creates a PATCH route.
    pub fn patch<F>(path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        Self::new(Method::Patch, path, handler)
    }

    /// Creates a DELETE route.
    pub fn delete<F>(path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        Self::new(Method::Delete, path, handler)
    }

    /// Creates an OPTIONS route.
    pub fn options<F>(path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        Self::new(Method::Options, path, handler)
    }

    /// Sets the method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the handler.
    #[must_use]
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Adds middleware. A second call nests the new layer inside the first.
    #[must_use]
    pub fn middleware(mut self, mw: impl Middleware + 'static) -> Self {
        self.middleware = compose(self.middleware.take(), Some(Arc::new(mw)));
        self
    }

    /// Adds a nested route.
    #[must_use]
    pub fn child(mut self, route: Route) -> Self {
        self.children.push(route);
        self
    }

    /// Adds nested routes.
    #[must_use]
    pub fn children(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.children.extend(routes);
        self
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("handler", &self.handler.is_some())
            .field("middleware", &self.middleware.is_some())
            .field("children", &self.children)
            .finish()
    }
}

/// How [`Router::serve`] disposed of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A handler ran; carries the flushed status.
    Handled(u16),
    /// No route or catch-all matched; a 404 was flushed.
    NotFound,
    /// The path matched but the method is not bound; a 405 was flushed.
    MethodNotAllowed,
}

/// Fluent router construction.
///
/// ```
/// use trie_router::{Request, Response, Route, Router};
///
/// let router = Router::builder()
///     .get("/ping", |_req: &mut Request, res: &mut Response| res.send_string("pong"))
///     .group(Route::group("/api").child(Route::get("/users/:id", |req: &mut Request, res: &mut Response| {
///         res.send_string(req.param("id").unwrap_or_default().to_string());
///     })))
///     .build()
///     .unwrap();
///
/// let res = router.dispatch(Request::get("/api/users/7")).unwrap();
/// assert_eq!(res.body_string(), Some("7".to_string()));
/// ```
#[derive(Default)]
pub struct RouterBuilder {
    routes: Vec<Route>,
    middleware: Option<SharedMiddleware>,
    config: RouterConfig,
}

impl RouterBuilder {
    /// Adds a GET route.
    #[must_use]
    pub fn get<F>(self, path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.route(Method::Get, path, handler)
    }

    /// Adds a POST route.
    #[must_use]
    pub fn post<F>(self, path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.route(Method::Post, path, handler)
    }

    /// Adds a PUT route.
    #[must_use]
    pub fn put<F>(self, path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.route(Method::Put, path, handler)
    }

    /// Adds a PATCH route.
    #[must_use]
    pub fn patch<F>(self, path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.route(Method::Patch, path, handler)
    }

    /// Adds a DELETE route.
    #[must_use]
    pub fn delete<F>(self, path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.route(Method::Delete, path, handler)
    }

    /// Adds a route with any method.
    #[must_use]
    pub fn route<F>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.routes.push(Route::new(method, path, handler));
        self
    }

    /// Adds a declaration, typically a group.
    #[must_use]
    pub fn group(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds middleware around every route. The first call is the outermost layer.
    #[must_use]
    pub fn middleware(mut self, mw: impl Middleware + 'static) -> Self {
        self.middleware = compose(self.middleware.take(), Some(Arc::new(mw)));
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Compiles the declarations.
    pub fn build(self) -> Result<Router> {
        let tree = Tree::build(&self.routes, self.middleware, &self.config)?;
        Ok(Router {
            tree,
            config: self.config,
        })
    }
}

/// The compiled router.
///
/// Immutable after construction; share it across threads freely.
#[derive(Debug)]
pub struct Router {
    tree: Tree,
    config: RouterConfig,
}

impl Router {
    /// Compiles route declarations with the default configuration.
    pub fn new(routes: Vec<Route>) -> Result<Self> {
        Self::with_config(routes, RouterConfig::default())
    }

    /// Compiles route declarations.
    pub fn with_config(routes: Vec<Route>, config: RouterConfig) -> Result<Self> {
        let tree = Tree::build(&routes, None, &config)?;
        Ok(Self { tree, config })
    }

    /// Starts a fluent builder.
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// The compiled tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Resolves a path to a node, falling back to catch-alls.
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        self.tree.find(path).map(|id| self.tree.node(id))
    }

    /// Runs the handler chain for `request` and returns the buffered response.
    ///
    /// Misses are returned as [`RouterError::NotFound`] or
    /// [`RouterError::MethodNotAllowed`]; nothing is written anywhere.
    pub fn dispatch(&self, request: Request) -> Result<Response> {
        let node = self.lookup(&request.path).ok_or_else(|| {
            debug!(method = %request.method, path = %request.path, "no route matched");
            RouterError::NotFound {
                method: request.method.to_string(),
                path: request.path.clone(),
            }
        })?;
        let handler = node.handler(request.method).ok_or_else(|| {
            debug!(method = %request.method, path = %request.path, "method not bound");
            RouterError::MethodNotAllowed {
                method: request.method.to_string(),
                path: request.path.clone(),
            }
        })?;
        Ok(Self::invoke(node, handler, request))
    }

    /// Dispatches `request` and flushes the result to `transport` exactly once.
    ///
    /// Misses are flushed as 404 or 405 responses. The only error is a
    /// failing transport.
    pub fn serve<T: Transport + ?Sized>(&self, request: Request, transport: &mut T) -> Result<Outcome> {
        let (outcome, response) = match self.lookup(&request.path) {
            None => {
                debug!(method = %request.method, path = %request.path, "no route matched");
                (Outcome::NotFound, Response::not_found())
            }
            Some(node) => match node.handler(request.method) {
                None => {
                    debug!(method = %request.method, path = %request.path, "method not bound");
                    let allowed = if self.config.allow_header {
                        node.methods()
                    } else {
                        Vec::new()
                    };
                    (Outcome::MethodNotAllowed, Response::method_not_allowed(&allowed))
                }
                Some(handler) => {
                    let response = Self::invoke(node, handler, request);
                    (Outcome::Handled(response.status_code()), response)
                }
            },
        };
        response.flush(transport)?;
        Ok(outcome)
    }

    fn invoke(node: &Node, handler: &Handler, mut request: Request) -> Response {
        request.set_route(node.route_template());
        let mut response = Response::ok();
        handler(&mut request, &mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Recorder;

    fn hello_handler(_req: &mut Request, res: &mut Response) {
        res.send_string("Hello, World!");
    }

    fn user_handler(req: &mut Request, res: &mut Response) {
        let id = req.param("id").unwrap_or("unknown").to_string();
        res.send_string(format!("User: {id}"));
    }

    #[test]
    fn test_basic_routing() {
        let router = Router::builder()
            .get("/", hello_handler)
            .get("/users/:id", user_handler)
            .build()
            .unwrap();

        let res = router.dispatch(Request::get("/")).unwrap();
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.body_string(), Some("Hello, World!".to_string()));
    }

    #[test]
    fn test_path_params() {
        let router = Router::builder().get("/users/:id", user_handler).build().unwrap();

        let res = router.dispatch(Request::get("/users/123")).unwrap();
        assert_eq!(res.body_string(), Some("User: 123".to_string()));
    }

    #[test]
    fn test_not_found() {
        let router = Router::builder().get("/", hello_handler).build().unwrap();

        let err = router.dispatch(Request::get("/nonexistent")).unwrap_err();
        assert!(matches!(err, RouterError::NotFound { ref path, .. } if path == "/nonexistent"));
    }

    #[test]
    fn test_method_not_allowed() {
        let router = Router::builder().get("/", hello_handler).build().unwrap();

        let err = router.dispatch(Request::post("/")).unwrap_err();
        assert!(matches!(err, RouterError::MethodNotAllowed { ref method, .. } if method == "POST"));
    }

    #[test]
    fn test_route_group() {
        let api = Route::group("/api/v1").children([
            Route::get("/users", hello_handler),
            Route::get("/users/:id", user_handler),
        ]);
        let router = Router::builder().group(api).build().unwrap();

        let res = router.dispatch(Request::get("/api/v1/users/123")).unwrap();
        assert_eq!(res.status_code(), 200);
        assert_eq!(
            router.lookup("/api/v1/users").and_then(Node::route),
            Some("/api/v1/users")
        );
    }

    #[test]
    fn test_serve_flushes_once() {
        let router = Router::builder().get("/", hello_handler).build().unwrap();
        let mut rec = Recorder::new();

        let outcome = router.serve(Request::get("/"), &mut rec).unwrap();
        assert_eq!(outcome, Outcome::Handled(200));
        assert_eq!(rec.flushes, 1);
        assert_eq!(rec.body_string(), "Hello, World!");
    }

    #[test]
    fn test_serve_405_allow_header_disabled() {
        let router = Router::builder()
            .get("/", hello_handler)
            .config(RouterConfig::default().allow_header(false))
            .build()
            .unwrap();
        let mut rec = Recorder::new();

        let outcome = router.serve(Request::post("/"), &mut rec).unwrap();
        assert_eq!(outcome, Outcome::MethodNotAllowed);
        assert_eq!(rec.status, Some(405));
        assert_eq!(rec.header("Allow"), None);
    }

    #[test]
    fn test_builder_middleware_is_outermost() {
        let router = Router::builder()
            .middleware(|next: Handler| -> Handler {
                Arc::new(move |req: &mut Request, res: &mut Response| {
                    res.set_header("X-Order", "builder");
                    next(req, res);
                })
            })
            .group(Route::get("/", hello_handler).middleware(|next: Handler| -> Handler {
                Arc::new(move |req: &mut Request, res: &mut Response| {
                    let seen = res.get_header("X-Order").unwrap_or_default().to_string();
                    res.set_header("X-Order", format!("{seen},route"));
                    next(req, res);
                })
            }))
            .build()
            .unwrap();

        let res = router.dispatch(Request::get("/")).unwrap();
        assert_eq!(res.get_header("X-Order"), Some("builder,route"));
    }

    #[test]
    fn test_router_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Router>();
    }
}
