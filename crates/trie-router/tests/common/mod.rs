#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use trie_router::{Handler, Middleware, Outcome, Recorder, Request, Response, Route, Router};

/// Writes the matched template as the body and the params as a sorted header.
pub fn echo_route(req: &mut Request, res: &mut Response) {
    let mut params: Vec<String> = req
        .params()
        .iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect();
    params.sort();
    res.set_header("X-Params", params.join(" "));
    res.send_string(req.route().unwrap_or_default().to_string());
}

pub fn noop(_req: &mut Request, _res: &mut Response) {}

pub fn serve(router: &Router, request: Request) -> (Outcome, Recorder) {
    let mut recorder = Recorder::new();
    let outcome = router
        .serve(request, &mut recorder)
        .unwrap_or_else(|e| panic!("serve failed: {e}"));
    assert_eq!(recorder.flushes, 1, "expected exactly one flush");
    (outcome, recorder)
}

pub fn route_of(router: &Router, path: &str) -> Option<String> {
    router
        .lookup(path)
        .and_then(|node| node.route().map(str::to_string))
}

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Middleware appending `"<name> pre"` and `"<name> post"` around the chain.
pub fn logging_layer(log: &Log, name: &'static str) -> impl Middleware + 'static {
    let log = Arc::clone(log);
    move |next: Handler| -> Handler {
        let log = Arc::clone(&log);
        Arc::new(move |req: &mut Request, res: &mut Response| {
            log.lock().unwrap().push(format!("{name} pre"));
            next(req, res);
            log.lock().unwrap().push(format!("{name} post"));
        })
    }
}

pub fn logging_handler(log: &Log) -> impl Fn(&mut Request, &mut Response) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |_req: &mut Request, _res: &mut Response| {
        log.lock().unwrap().push("handler".to_string());
    }
}

/// Route table exercised by the routing tests.
pub fn sample_routes() -> Vec<Route> {
    vec![
        Route::get("/ping", |_req: &mut Request, res: &mut Response| {
            res.send_string("pong");
        }),
        Route::group("/api")
            .middleware(|next: Handler| -> Handler {
                Arc::new(move |req: &mut Request, res: &mut Response| {
                    res.set_header("Content-Type", "application/json");
                    next(req, res);
                })
            })
            .child(
                Route::post("/hello", |req: &mut Request, res: &mut Response| {
                    let body: serde_json::Value = req.must_parse_body().must_bind();
                    res.send_string(body["name"].as_str().unwrap_or_default().to_string());
                })
                .middleware(|next: Handler| -> Handler {
                    Arc::new(move |req: &mut Request, res: &mut Response| {
                        res.set_header("X-Test", "test");
                        next(req, res);
                    })
                }),
            ),
        Route::get("/users/:userId", echo_route),
        Route::get("/users/:userId/blogs/:blogId", echo_route),
        Route::group("/posts/:postId").child(Route::get("/comments/:commentId", echo_route)),
        Route::group("/:foo").child(Route::get("/foo", echo_route)),
        Route::group("/:bar").child(Route::get("/bar", echo_route)),
    ]
}
