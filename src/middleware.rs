//! Stock middlewares

use std::time::Instant;

use tracing::info;

use crate::chain::{middleware, Handler, Middleware};
use crate::context::RoutingContext;
use crate::http::Request;

// Path the router will look up: the routing override, else the request path.
fn routing_path(req: &mut Request) -> String {
    let rctx = RoutingContext::get_or_create(req);
    if rctx.route_path.is_empty() {
        req.path.clone()
    } else {
        rctx.route_path.clone()
    }
}

/// Logs every request on entry and on exit, with the time spent below.
pub fn logger() -> Middleware {
    middleware(|next| {
        Handler::from_fn(move |req, resp| {
            let path = routing_path(req);
            let method = req.method;
            let begin = Instant::now();

            info!(%method, %path, "request started");
            next.serve(req, resp);
            info!(
                %method,
                %path,
                status = resp.status,
                elapsed = ?begin.elapsed(),
                "request finished"
            );
        })
    })
}

/// Routes `/path/` as `/path`.
///
/// Only the routing path is rewritten; the request path is left untouched.
/// The root path `/` is never emptied.
pub fn strip_trailing_slash() -> Middleware {
    middleware(|next| {
        Handler::from_fn(move |req, resp| {
            let path = routing_path(req);
            let route_path = match path.strip_suffix('/') {
                Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
                _ => path.clone(),
            };
            RoutingContext::get_or_create(req).route_path = route_path;
            next.serve(req, resp);
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use crate::route::Method;
    use crate::router::{Mux, Router};

    fn call(mux: &Mux, uri: &str) -> Response {
        let mut req = Request::new(Method::GET, uri);
        let mut resp = Response::new();
        mux.serve(&mut req, &mut resp);
        resp
    }

    #[test]
    fn test_strip_trailing_slash() {
        let mut mux = Mux::new();
        mux.use_middleware(strip_trailing_slash()).unwrap();
        mux.get("/", |_, resp| resp.write("root")).unwrap();
        mux.get("/accounts", |_, resp| resp.write("accounts")).unwrap();

        assert_eq!(call(&mux, "/accounts/").body, "accounts");
        assert_eq!(call(&mux, "/accounts").body, "accounts");
        assert_eq!(call(&mux, "/").body, "root");
    }

    #[test]
    fn test_strip_keeps_request_path() {
        let mut mux = Mux::new();
        mux.use_middleware(strip_trailing_slash()).unwrap();
        mux.get("/a", |req, resp| resp.write(&req.path)).unwrap();

        assert_eq!(call(&mux, "/a/").body, "/a/");
    }

    #[test]
    fn test_logger_passes_through() {
        let mut mux = Mux::new();
        mux.use_middleware(logger()).unwrap();
        mux.get("/ping", |_, resp| resp.write("pong")).unwrap();

        let resp = call(&mux, "/ping");
        assert_eq!(resp.body, "pong");
        assert_eq!(call(&mux, "/missing").status, 404);
    }
}
