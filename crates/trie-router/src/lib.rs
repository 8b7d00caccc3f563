//! # trie-router
//!
//! An in-process HTTP request router built on a segment trie.
//!
//! This crate provides:
//! - Nested route declarations (groups) compiled once into a read-only tree
//! - Named parameters (`/users/:id`) and catch-alls (`/admin/*`)
//! - Catch-all fallback from wherever matching stalls, nearest first
//! - Distinct not-found and method-not-allowed outcomes
//! - Onion-ordered middleware declared on groups and leaves
//! - A buffered response that is flushed exactly once per request
//!
//! ## Quick Start
//!
//! ```
//! use trie_router::{Recorder, Request, Response, Route, Router};
//!
//! fn hello(_req: &mut Request, res: &mut Response) {
//!     res.send_string("Hello, World!");
//! }
//!
//! fn user(req: &mut Request, res: &mut Response) {
//!     let id = req.param("id").unwrap_or("unknown").to_string();
//!     res.must_send_json(&serde_json::json!({ "id": id }));
//! }
//!
//! let router = Router::new(vec![
//!     Route::get("/", hello),
//!     Route::group("/api").child(Route::get("/users/:id", user)),
//! ])
//! .unwrap();
//!
//! let mut recorder = Recorder::new();
//! router.serve(Request::get("/api/users/123"), &mut recorder).unwrap();
//! assert_eq!(recorder.body_string(), r#"{"id":"123"}"#);
//! ```
//!
//! ## Matching
//!
//! Paths are split on `/` without percent-decoding; empty segments are
//! skipped, so `/users/1/` matches like `/users/1`. At each segment a literal
//! child wins over the parameter child. If descent stalls, or ends on a node
//! that only exists as a group boundary, the router climbs back towards the
//! root and uses the first node flagged as a catch-all:
//!
//! ```
//! use trie_router::{Request, Response, Route, Router};
//!
//! fn noop(_req: &mut Request, _res: &mut Response) {}
//!
//! let router = Router::new(vec![
//!     Route::get("/*", noop),
//!     Route::get("/admin/*", noop),
//!     Route::get("/admin/users", noop),
//! ])
//! .unwrap();
//!
//! assert_eq!(router.lookup("/admin/users").unwrap().route(), Some("/admin/users"));
//! assert_eq!(router.lookup("/admin/a/b").unwrap().route(), Some("/admin/*"));
//! assert_eq!(router.lookup("/elsewhere").unwrap().route(), Some("/*"));
//! ```
//!
//! A path that matches a route lacking the requested method is a 405, never
//! a catch-all fallback.
//!
//! ## Middleware
//!
//! ```
//! use trie_router::{LoggingMiddleware, RecoverMiddleware, Request, Response, Route, Router};
//!
//! fn ping(_req: &mut Request, res: &mut Response) {
//!     res.send_string("pong");
//! }
//!
//! let router = Router::builder()
//!     .middleware(RecoverMiddleware)
//!     .group(Route::group("/api").middleware(LoggingMiddleware).child(Route::get("/ping", ping)))
//!     .build()
//!     .unwrap();
//! ```

mod config;
mod error;
mod middleware;
mod path;
mod request;
mod response;
mod router;
mod tree;

pub use config::{ConflictPolicy, RouterConfig};
pub use error::{Result, RouterError};
pub use middleware::{
    compose, AuthMiddleware, CorsMiddleware, LoggingMiddleware, Middleware, RecoverMiddleware,
    SharedMiddleware,
};
pub use path::{extract_params, SegmentKey, CATCH_ALL, PARAM_SIGIL};
pub use request::{Body, Method, PathParams, Request};
pub use response::{status_text, Http1Writer, Payload, Recorder, Response, Transport};
pub use router::{Handler, Outcome, Route, Router, RouterBuilder};
pub use tree::{Node, NodeId, Tree};
