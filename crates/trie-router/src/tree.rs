//! Segment trie that route declarations compile into.
//!
//! Nodes are stored in an arena and refer to each other by [`NodeId`].
//! Children are owned downwards through the arena; the parent link is a
//! plain index used only to climb back towards a catch-all when matching
//! stalls.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{ConflictPolicy, RouterConfig};
use crate::error::{Result, RouterError};
use crate::middleware::{compose, SharedMiddleware};
use crate::path::{self, Segment, SegmentKey};
use crate::request::Method;
use crate::router::{Handler, Route};

/// Index of a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One position in the route tree.
pub struct Node {
    children: Vec<(SegmentKey, NodeId)>,
    handlers: HashMap<Method, Handler>,
    route: Option<Arc<str>>,
    catch_all: bool,
    parent: Option<NodeId>,
}

impl Node {
    fn new(parent: Option<NodeId>) -> Self {
        Self {
            children: Vec::new(),
            handlers: HashMap::new(),
            route: None,
            catch_all: false,
            parent,
        }
    }

    /// Full template of the leaf routes ending here, e.g. `/users/:id`.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub(crate) fn route_template(&self) -> Option<Arc<str>> {
        self.route.clone()
    }

    /// Whether unmatched paths below this node fall back to it.
    pub fn is_catch_all(&self) -> bool {
        self.catch_all
    }

    /// Whether any handler is bound here.
    pub fn is_routable(&self) -> bool {
        !self.handlers.is_empty()
    }

    /// Methods with a bound handler, in declaration order of [`Method`].
    pub fn methods(&self) -> Vec<Method> {
        let mut methods: Vec<Method> = self.handlers.keys().copied().collect();
        methods.sort();
        methods
    }

    pub(crate) fn handler(&self, method: Method) -> Option<&Handler> {
        self.handlers.get(&method)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    fn child(&self, key: &SegmentKey) -> Option<NodeId> {
        self.children
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, id)| *id)
    }

    fn literal_child(&self, segment: &str) -> Option<NodeId> {
        self.children.iter().find_map(|(key, id)| match key {
            SegmentKey::Literal(text) if text == segment => Some(*id),
            _ => None,
        })
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("route", &self.route)
            .field("catch_all", &self.catch_all)
            .field("methods", &self.methods())
            .field("children", &self.children)
            .field("parent", &self.parent)
            .finish()
    }
}

/// The compiled route tree. Read-only once built.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    const ROOT: NodeId = NodeId(0);

    /// Compiles route declarations into a tree.
    pub(crate) fn build(
        routes: &[Route],
        middleware: Option<SharedMiddleware>,
        config: &RouterConfig,
    ) -> Result<Self> {
        let mut tree = Self {
            nodes: vec![Node::new(None)],
        };
        tree.insert_routes(Self::ROOT, routes, "", middleware.as_ref(), config)?;
        debug!(
            nodes = tree.nodes.len(),
            routes = tree.routes().len(),
            "route tree built"
        );
        Ok(tree)
    }

    fn insert_routes(
        &mut self,
        at: NodeId,
        routes: &[Route],
        prefix: &str,
        middleware: Option<&SharedMiddleware>,
        config: &RouterConfig,
    ) -> Result<()> {
        for route in routes {
            let node = self.insert_path(at, &route.path)?;
            let template = path::join(prefix, &route.path);
            let layers = compose(middleware.cloned(), route.middleware.clone());

            if !route.children.is_empty() {
                self.insert_routes(node, &route.children, &template, layers.as_ref(), config)?;
                continue;
            }

            let method = route.method.ok_or_else(|| RouterError::MissingMethod {
                path: template.clone(),
            })?;
            let handler = route
                .handler
                .clone()
                .ok_or_else(|| RouterError::MissingHandler {
                    path: template.clone(),
                })?;
            let handler = match layers {
                Some(mw) => mw.wrap(handler),
                None => handler,
            };
            self.bind(node, method, handler, template, config)?;
        }
        Ok(())
    }

    /// Walks `pattern` from `at`, creating nodes as needed.
    fn insert_path(&mut self, at: NodeId, pattern: &str) -> Result<NodeId> {
        let mut current = at;
        for segment in path::parse_pattern(pattern)? {
            current = match segment {
                Segment::Empty => current,
                Segment::CatchAll => {
                    self.nodes[current.0].catch_all = true;
                    current
                }
                Segment::Param(_) => self.child_or_insert(current, SegmentKey::Param),
                Segment::Literal(text) => {
                    self.child_or_insert(current, SegmentKey::Literal(text.to_string()))
                }
            };
        }
        Ok(current)
    }

    fn child_or_insert(&mut self, parent: NodeId, key: SegmentKey) -> NodeId {
        if let Some(id) = self.nodes[parent.0].child(&key) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(Some(parent)));
        self.nodes[parent.0].children.push((key, id));
        id
    }

    fn bind(
        &mut self,
        id: NodeId,
        method: Method,
        handler: Handler,
        template: String,
        config: &RouterConfig,
    ) -> Result<()> {
        let node = &mut self.nodes[id.0];

        if let Some(existing) = node.route.as_deref() {
            if path::param_names(existing) != path::param_names(&template) {
                warn!(
                    existing,
                    incoming = %template,
                    "route templates share a tree node; parameter names of the earlier one are lost"
                );
                if config.param_conflicts == ConflictPolicy::Reject {
                    return Err(RouterError::TemplateConflict {
                        existing: existing.to_string(),
                        incoming: template,
                    });
                }
            } else if existing != template {
                debug!(existing, incoming = %template, "route template replaced");
            }
        }

        if node.handlers.insert(method, handler).is_some() {
            warn!(%method, route = %template, "handler replaced by a later declaration");
        }
        node.route = Some(Arc::from(template));
        Ok(())
    }

    /// Resolves a request path to a node.
    ///
    /// Literal children are preferred over the parameter child. When descent
    /// stalls, or ends on a node without handlers, the nearest catch-all on
    /// the way back to the root is returned instead.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let mut current = Self::ROOT;

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let node = &self.nodes[current.0];
            match node
                .literal_child(segment)
                .or_else(|| node.child(&SegmentKey::Param))
            {
                Some(next) => current = next,
                None => return self.nearest_catch_all(current),
            }
        }

        if self.nodes[current.0].is_routable() {
            Some(current)
        } else {
            self.nearest_catch_all(current)
        }
    }

    fn nearest_catch_all(&self, from: NodeId) -> Option<NodeId> {
        let mut current = Some(from);
        while let Some(id) = current {
            let node = &self.nodes[id.0];
            if node.catch_all {
                return Some(id);
            }
            current = node.parent;
        }
        None
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// Returns a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` came from a different tree with more nodes.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && !self.nodes[0].is_routable()
    }

    /// Every bound `(template, method)` pair, sorted.
    pub fn routes(&self) -> Vec<(&str, Method)> {
        let mut routes: Vec<(&str, Method)> = self
            .nodes
            .iter()
            .filter_map(|node| node.route().map(|route| (route, node)))
            .flat_map(|(route, node)| node.handlers.keys().map(move |m| (route, *m)))
            .collect();
        routes.sort();
        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use crate::response::Response;

    fn noop(_req: &mut Request, _res: &mut Response) {}

    fn build(routes: Vec<Route>) -> Tree {
        Tree::build(&routes, None, &RouterConfig::default()).unwrap()
    }

    fn route_of(tree: &Tree, path: &str) -> Option<String> {
        tree.find(path)
            .and_then(|id| tree.node(id).route().map(str::to_string))
    }

    #[test]
    fn test_literal_and_param() {
        let tree = build(vec![
            Route::get("/users/:id", noop),
            Route::get("/users/me", noop),
        ]);
        assert_eq!(route_of(&tree, "/users/me").as_deref(), Some("/users/me"));
        assert_eq!(route_of(&tree, "/users/42").as_deref(), Some("/users/:id"));
        assert_eq!(route_of(&tree, "/users"), None);
    }

    #[test]
    fn test_param_names_share_child() {
        let tree = build(vec![
            Route::group("/:foo").child(Route::get("/foo", noop)),
            Route::group("/:bar").child(Route::get("/bar", noop)),
        ]);
        // root, param, foo, bar
        assert_eq!(tree.len(), 4);
        assert_eq!(route_of(&tree, "/x/foo").as_deref(), Some("/:foo/foo"));
        assert_eq!(route_of(&tree, "/x/bar").as_deref(), Some("/:bar/bar"));
    }

    #[test]
    fn test_root_route() {
        let tree = build(vec![Route::get("/", noop)]);
        assert_eq!(tree.find("/"), Some(tree.root()));
        assert_eq!(tree.find(""), Some(tree.root()));
    }

    #[test]
    fn test_empty_segments_are_noops() {
        let tree = build(vec![Route::get("/a//b/", noop)]);
        assert_eq!(route_of(&tree, "/a/b").as_deref(), Some("/a/b"));
        assert_eq!(route_of(&tree, "//a/b//").as_deref(), Some("/a/b"));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_catch_all_flags_node() {
        let tree = build(vec![Route::get("/admin/*", noop)]);
        let id = tree.find("/admin/anything/deep").unwrap();
        let node = tree.node(id);
        assert!(node.is_catch_all());
        assert_eq!(node.route(), Some("/admin/*"));
        assert_eq!(tree.find("/admin"), Some(id));
        assert_eq!(tree.find("/other/path"), None);
    }

    #[test]
    fn test_fallback_from_intermediate_node() {
        let tree = build(vec![
            Route::get("/*", noop),
            Route::get("/api/v1/users", noop),
        ]);
        // "/api/v1" exists only as a group boundary.
        assert_eq!(route_of(&tree, "/api/v1").as_deref(), Some("/*"));
        assert_eq!(route_of(&tree, "/api/v1/users").as_deref(), Some("/api/v1/users"));
    }

    #[test]
    fn test_no_backtracking_from_param_to_literal() {
        let tree = build(vec![
            Route::get("/files/:name", noop),
            Route::get("/files/static/index", noop),
        ]);
        // "static" is taken literally; the param child is not retried.
        assert_eq!(route_of(&tree, "/files/static"), None);
    }

    #[test]
    fn test_parent_links() {
        let tree = build(vec![Route::get("/a/b", noop)]);
        let b = tree.find("/a/b").unwrap();
        let a = tree.node(b).parent().unwrap();
        assert_eq!(tree.node(a).parent(), Some(tree.root()));
        assert_eq!(tree.node(tree.root()).parent(), None);
    }

    #[test]
    fn test_missing_method() {
        let routes = vec![Route::path("/x").handler(noop)];
        let err = Tree::build(&routes, None, &RouterConfig::default()).unwrap_err();
        assert!(matches!(err, RouterError::MissingMethod { ref path } if path == "/x"));
        assert!(err.is_config());
    }

    #[test]
    fn test_missing_handler_in_group() {
        let routes = vec![Route::group("/api").child(Route::path("/x").method(Method::Get))];
        let err = Tree::build(&routes, None, &RouterConfig::default()).unwrap_err();
        assert!(matches!(err, RouterError::MissingHandler { ref path } if path == "/api/x"));
    }

    #[test]
    fn test_template_conflict_warn_last_wins() {
        let tree = build(vec![
            Route::get("/users/:id", noop),
            Route::post("/users/:name", noop),
        ]);
        let id = tree.find("/users/1").unwrap();
        assert_eq!(tree.node(id).route(), Some("/users/:name"));
        assert_eq!(tree.node(id).methods(), vec![Method::Get, Method::Post]);
    }

    #[test]
    fn test_template_conflict_reject() {
        let routes = vec![
            Route::get("/users/:id", noop),
            Route::post("/users/:name", noop),
        ];
        let config = RouterConfig::default().param_conflicts(ConflictPolicy::Reject);
        let err = Tree::build(&routes, None, &config).unwrap_err();
        assert!(matches!(
            err,
            RouterError::TemplateConflict { ref existing, ref incoming }
                if existing == "/users/:id" && incoming == "/users/:name"
        ));
    }

    #[test]
    fn test_same_template_is_not_a_conflict() {
        let routes = vec![Route::get("/users/:id", noop), Route::put("/users/:id", noop)];
        let config = RouterConfig::default().param_conflicts(ConflictPolicy::Reject);
        assert!(Tree::build(&routes, None, &config).is_ok());
    }

    #[test]
    fn test_templates_without_param_clash_are_not_conflicts() {
        let routes = vec![
            Route::get("/admin", noop),
            Route::get("/admin/*", noop),
            Route::get("/users/:id", noop),
            Route::put("/users/:id/", noop),
        ];
        let config = RouterConfig::default().param_conflicts(ConflictPolicy::Reject);
        let tree = Tree::build(&routes, None, &config).unwrap();
        assert_eq!(route_of(&tree, "/admin").as_deref(), Some("/admin/*"));
        assert_eq!(route_of(&tree, "/users/1").as_deref(), Some("/users/:id"));
    }

    #[test]
    fn test_group_templates_are_normalized() {
        let tree = build(vec![
            Route::group("/api/").child(Route::get("/users/:id", noop)),
            Route::group("/v2").child(Route::get("posts/:id", noop)),
        ]);
        assert_eq!(route_of(&tree, "/api/users/1").as_deref(), Some("/api/users/:id"));
        assert_eq!(route_of(&tree, "/v2/posts/1").as_deref(), Some("/v2/posts/:id"));
    }

    #[test]
    fn test_routes_listing() {
        let tree = build(vec![
            Route::post("/b", noop),
            Route::get("/a", noop),
            Route::get("/b", noop),
        ]);
        assert_eq!(
            tree.routes(),
            vec![("/a", Method::Get), ("/b", Method::Get), ("/b", Method::Post)]
        );
        assert!(!tree.is_empty());
        assert!(build(vec![]).is_empty());
    }
}
