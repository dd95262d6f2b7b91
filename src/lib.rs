//! # radix-mux
//!
//! A composable HTTP request router built on a radix trie.
//!
//! Patterns support:
//! - Static segments (`/users/list`)
//! - Named parameters (`/users/{id}`), with a custom delimiter (`/{name}.{ext}`)
//! - Regex constrained parameters (`/items/{id:[0-9]+}`)
//! - A trailing wildcard (`/static/*`)
//!
//! Routers carry a middleware stack, can scope extra middlewares to a group
//! of routes and can mount other routers below a path prefix. Requests that
//! match no route are answered by the not-found handler, requests whose path
//! matches but whose method does not by the method-not-allowed handler.
//!
//! ## Example
//!
//! ```rust
//! use radix_mux::{url_param, Method, Mux, Request, Response, Router};
//!
//! # fn main() -> radix_mux::Result<()> {
//! let mut mux = Mux::new();
//! mux.use_middleware(radix_mux::middleware::strip_trailing_slash())?;
//! mux.get("/users/{id}", |req, resp| {
//!     let id = url_param(req, "id").unwrap_or_default().to_string();
//!     resp.write(&format!("user {id}"));
//! })?;
//! mux.route("/api", |api| {
//!     api.get("/items/{id:[0-9]+}", |req, resp| {
//!         let id = url_param(req, "id").unwrap_or_default().to_string();
//!         resp.write(&format!("item {id}"));
//!     })
//! })?;
//!
//! let mut req = Request::new(Method::GET, "/users/42/");
//! let mut resp = Response::new();
//! mux.serve(&mut req, &mut resp);
//! assert_eq!(resp.body, "user 42");
//!
//! let mut req = Request::new(Method::GET, "/api/items/abc");
//! let mut resp = Response::new();
//! mux.serve(&mut req, &mut resp);
//! assert_eq!(resp.status, 404);
//! # Ok(())
//! # }
//! ```

mod chain;
mod context;
mod error;
mod http;
pub mod middleware;
mod pattern;
mod route;
mod router;
mod tree;

// Re-export public types
pub use chain::{chain, middleware as middleware_fn, ChainHandler, Handler, HandlerFn, Middleware, Middlewares};
pub use context::{url_param, Context, RouteParams, RoutingContext};
pub use error::{Result, RouterError};
pub use http::{status, Request, Response};
pub use pattern::{param_keys, NodeType, WILDCARD_KEY};
pub use route::{Endpoint, Endpoints, Method, Route, RouteEntry};
pub use router::{InlineRouter, Mux, Router};
