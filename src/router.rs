//! Core router implementation

use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{debug, trace};

use crate::chain::{chain, Handler, Middleware, Middlewares};
use crate::context::{collapse_wildcards, RoutingContext};
use crate::error::{Result, RouterError};
use crate::http::{status, Request, Response};
use crate::pattern::{validate, WILDCARD_KEY};
use crate::route::{Method, Route, RouteEntry};
use crate::tree::Node;

/// Route table of one router, shared with its dispatch handler.
pub(crate) struct Routes {
    tree: Node,
    not_found: Option<Handler>,
    method_not_allowed: Option<Handler>,
}

/// Composable HTTP router
///
/// Routes are registered during a build phase through the [`Router`] trait.
/// The first registration freezes the middleware stack; the first request
/// freezes the route table. After that the router only needs `&self`, so it
/// can be shared across threads (e.g. behind an `Arc`) and serve requests
/// concurrently without locking.
pub struct Mux {
    routes: Arc<Routes>,
    middlewares: Middlewares,
    /// Set once routing began; middlewares can no longer be added
    frozen: bool,
    handler: OnceLock<Handler>,
}

impl Default for Mux {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mux")
            .field("middlewares", &self.middlewares.len())
            .field("frozen", &self.frozen)
            .field("routes", &self.routes.tree.routes())
            .finish()
    }
}

impl Mux {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(Routes {
                tree: Node::root(),
                not_found: None,
                method_not_allowed: None,
            }),
            middlewares: Middlewares::new(),
            frozen: false,
            handler: OnceLock::new(),
        }
    }

    /// Dispatches a request through the middleware stack and the route tree.
    pub fn serve(&self, req: &mut Request, resp: &mut Response) {
        let rctx = RoutingContext::get_or_create(req);

        if !self.frozen {
            let handler = self.not_found_for(rctx);
            handler.serve(req, resp);
            return;
        }

        self.handler().serve(req, resp);
    }

    // Stack of the router's middlewares around tree dispatch, built once.
    fn handler(&self) -> &Handler {
        self.handler.get_or_init(|| {
            chain(
                self.middlewares.as_slice(),
                route_http(Arc::clone(&self.routes)),
            )
        })
    }

    /// The router's own not-found handler, or the default one.
    pub fn not_found_handler(&self) -> Handler {
        self.routes
            .not_found
            .clone()
            .unwrap_or_else(default_not_found)
    }

    /// The router's own method-not-allowed handler, or the default one.
    pub fn method_not_allowed_handler(&self) -> Handler {
        self.routes
            .method_not_allowed
            .clone()
            .unwrap_or_else(default_method_not_allowed)
    }

    fn not_found_for(&self, rctx: &RoutingContext) -> Handler {
        self.routes
            .not_found
            .clone()
            .or_else(|| rctx.inherited_not_found.clone())
            .unwrap_or_else(default_not_found)
    }

    /// Middlewares registered with [`Router::use_middleware`].
    pub fn middlewares(&self) -> &Middlewares {
        &self.middlewares
    }

    /// Registered routes, one per pattern, in tree order.
    pub fn routes(&self) -> Vec<Route> {
        self.routes.tree.routes()
    }

    /// Looks up `path` without running any handler, descending into mounted
    /// routers.
    ///
    /// Captured parameters and matched patterns are left in `rctx`.
    pub fn match_route(&self, rctx: &mut RoutingContext, method: Method, path: &str) -> bool {
        if !method.is_valid() {
            return false;
        }

        let Some((node, _)) = self.routes.tree.find_route(rctx, method, path) else {
            return false;
        };

        match &node.subroutes {
            Some(sub) => {
                rctx.route_path = next_route_path(rctx);
                let path = rctx.route_path.clone();
                sub.match_route(rctx, method, &path)
            }
            None => true,
        }
    }

    /// Visits every concrete `(method, pattern)` binding, mounted routers
    /// included.
    ///
    /// Patterns are joined across mount points. The handler passed to `f` is
    /// the registered endpoint, unwrapped from its middleware chain, and the
    /// middleware list holds every middleware that applies to it, outermost
    /// first. Walking stops at the first error.
    pub fn walk<F, E>(&self, mut f: F) -> std::result::Result<(), E>
    where
        F: FnMut(Method, &str, &Handler, &Middlewares) -> std::result::Result<(), E>,
    {
        walk_routes(self, &mut f, "", &Middlewares::new())
    }

    /// Flattened route table.
    pub fn route_table(&self) -> Vec<RouteEntry> {
        let mut entries = Vec::new();
        let _ = self.walk(|method, pattern, _, middlewares| {
            entries.push(RouteEntry {
                method: method.to_string(),
                pattern: pattern.to_string(),
                middlewares: middlewares.len(),
            });
            Ok::<(), Infallible>(())
        });
        entries
    }

    fn routes_mut(&mut self) -> Result<&mut Routes> {
        Arc::get_mut(&mut self.routes).ok_or(RouterError::Frozen)
    }

    fn insert(&mut self, method: Method, pattern: &str, handler: Handler, stub: bool) -> Result<&mut Node> {
        if !pattern.starts_with('/') {
            return Err(RouterError::MissingLeadingSlash(pattern.to_string()));
        }
        if method.is_empty() {
            return Err(RouterError::UnsupportedMethod(String::new()));
        }
        let keys = validate(pattern)?;

        self.frozen = true;
        let routes = self.routes_mut()?;
        let node = routes.tree.insert_route(method, pattern, keys, handler)?;
        if stub {
            node.endpoints.mark_stub(method);
        }

        debug!(method = ?method, pattern, "route registered");
        Ok(node)
    }

    fn mount_with(&mut self, pattern: &str, sub: Mux, middlewares: &Middlewares) -> Result<()> {
        let base = pattern.strip_suffix('*').unwrap_or(pattern);
        if !base.starts_with('/') {
            return Err(RouterError::MissingLeadingSlash(pattern.to_string()));
        }

        let tree = &self.routes.tree;
        if tree.find_pattern(format!("{base}*").as_bytes())
            || tree.find_pattern(format!("{base}/*").as_bytes())
        {
            return Err(RouterError::MountCollision(base.to_string()));
        }

        let sub = Arc::new(sub);
        let handler = wrap(middlewares, mount_handler(Arc::clone(&sub)));

        let mut base = base.to_string();
        if !base.ends_with('/') {
            self.insert(Method::ALL, &base, handler.clone(), true)?;
            base.push('/');
            self.insert(Method::ALL, &base, handler.clone(), true)?;
        }

        let wildcard = format!("{base}{WILDCARD_KEY}");
        let node = self.insert(Method::ALL, &wildcard, handler, false)?;
        node.subroutes = Some(sub);

        debug!(pattern = %wildcard, "router mounted");
        Ok(())
    }
}

/// Registration API shared by [`Mux`] and [`InlineRouter`].
pub trait Router {
    /// Binds `handler` to `pattern` for every method in `method`.
    fn handle_method(&mut self, method: Method, pattern: &str, handler: Handler) -> Result<()>;

    /// Appends a middleware to the router's stack.
    ///
    /// Fails with [`RouterError::MiddlewareAfterRoutes`] once routing began.
    fn use_middleware(&mut self, middleware: Middleware) -> Result<()>;

    /// Returns an inline router sharing this route tree whose routes are
    /// additionally wrapped in `middlewares`.
    fn with(&mut self, middlewares: Vec<Middleware>) -> InlineRouter<'_>;

    /// Attaches `sub` below `pattern`.
    ///
    /// The sub-router sees the remainder of the path after `pattern` and
    /// inherits this router's fallbacks unless it sets its own.
    fn mount(&mut self, pattern: &str, sub: Mux) -> Result<()>;

    fn set_not_found(&mut self, handler: Handler) -> Result<()>;

    fn set_method_not_allowed(&mut self, handler: Handler) -> Result<()>;

    /// Binds `handler` to `pattern` for every method.
    fn handle(&mut self, pattern: &str, handler: Handler) -> Result<()> {
        self.handle_method(Method::ALL, pattern, handler)
    }

    fn handle_func<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.handle(pattern, Handler::from_fn(f))
    }

    /// Binds `handler` for a method given by name, e.g. `"PATCH"`.
    fn method(&mut self, method: &str, pattern: &str, handler: Handler) -> Result<()> {
        let parsed = Method::parse(method);
        if parsed.is_empty() {
            return Err(RouterError::UnsupportedMethod(method.to_string()));
        }
        self.handle_method(parsed, pattern, handler)
    }

    fn method_func<F>(&mut self, method: &str, pattern: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.method(method, pattern, Handler::from_fn(f))
    }

    fn connect<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.handle_method(Method::CONNECT, pattern, Handler::from_fn(f))
    }

    fn delete<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.handle_method(Method::DELETE, pattern, Handler::from_fn(f))
    }

    fn get<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.handle_method(Method::GET, pattern, Handler::from_fn(f))
    }

    fn head<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.handle_method(Method::HEAD, pattern, Handler::from_fn(f))
    }

    fn options<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.handle_method(Method::OPTIONS, pattern, Handler::from_fn(f))
    }

    fn patch<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.handle_method(Method::PATCH, pattern, Handler::from_fn(f))
    }

    fn post<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.handle_method(Method::POST, pattern, Handler::from_fn(f))
    }

    fn put<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.handle_method(Method::PUT, pattern, Handler::from_fn(f))
    }

    fn trace<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        self.handle_method(Method::TRACE, pattern, Handler::from_fn(f))
    }

    /// Runs `f` against a fresh inline router, scoping the middlewares it
    /// adds to the routes it registers.
    fn group<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut InlineRouter<'_>) -> Result<()>,
    {
        let mut inline = self.with(Vec::new());
        f(&mut inline)
    }

    /// Builds a new router with `f` and mounts it at `pattern`.
    fn route<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Mux) -> Result<()>,
    {
        let mut sub = Mux::new();
        f(&mut sub)?;
        self.mount(pattern, sub)
    }
}

impl Router for Mux {
    fn handle_method(&mut self, method: Method, pattern: &str, handler: Handler) -> Result<()> {
        self.insert(method, pattern, handler, false).map(|_| ())
    }

    fn use_middleware(&mut self, middleware: Middleware) -> Result<()> {
        if self.frozen {
            return Err(RouterError::MiddlewareAfterRoutes);
        }
        self.middlewares.push(middleware);
        Ok(())
    }

    fn with(&mut self, middlewares: Vec<Middleware>) -> InlineRouter<'_> {
        self.frozen = true;
        InlineRouter {
            parent: self,
            middlewares: Middlewares::from(middlewares),
            frozen: false,
        }
    }

    fn mount(&mut self, pattern: &str, sub: Mux) -> Result<()> {
        self.mount_with(pattern, sub, &Middlewares::new())
    }

    fn set_not_found(&mut self, handler: Handler) -> Result<()> {
        self.routes_mut()?.not_found = Some(handler);
        debug!("not-found handler installed");
        Ok(())
    }

    fn set_method_not_allowed(&mut self, handler: Handler) -> Result<()> {
        self.routes_mut()?.method_not_allowed = Some(handler);
        debug!("method-not-allowed handler installed");
        Ok(())
    }
}

/// Router view created by [`Router::with`] and [`Router::group`].
///
/// Registrations land in the parent's tree, wrapped in the inline
/// middlewares.
pub struct InlineRouter<'a> {
    parent: &'a mut Mux,
    middlewares: Middlewares,
    frozen: bool,
}

impl InlineRouter<'_> {
    /// Middlewares scoped to this inline router.
    pub fn middlewares(&self) -> &Middlewares {
        &self.middlewares
    }
}

impl fmt::Debug for InlineRouter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineRouter")
            .field("middlewares", &self.middlewares.len())
            .field("frozen", &self.frozen)
            .finish()
    }
}

impl Router for InlineRouter<'_> {
    fn handle_method(&mut self, method: Method, pattern: &str, handler: Handler) -> Result<()> {
        let handler = wrap(&self.middlewares, handler);
        self.frozen = true;
        self.parent.handle_method(method, pattern, handler)
    }

    fn use_middleware(&mut self, middleware: Middleware) -> Result<()> {
        if self.frozen {
            return Err(RouterError::MiddlewareAfterRoutes);
        }
        self.middlewares.push(middleware);
        Ok(())
    }

    fn with(&mut self, middlewares: Vec<Middleware>) -> InlineRouter<'_> {
        let mut stack = self.middlewares.clone();
        stack.extend(middlewares);
        InlineRouter {
            parent: &mut *self.parent,
            middlewares: stack,
            frozen: false,
        }
    }

    fn mount(&mut self, pattern: &str, sub: Mux) -> Result<()> {
        self.frozen = true;
        self.parent.mount_with(pattern, sub, &self.middlewares)
    }

    fn set_not_found(&mut self, handler: Handler) -> Result<()> {
        let handler = wrap(&self.middlewares, handler);
        self.parent.set_not_found(handler)
    }

    fn set_method_not_allowed(&mut self, handler: Handler) -> Result<()> {
        let handler = wrap(&self.middlewares, handler);
        self.parent.set_method_not_allowed(handler)
    }
}

fn wrap(middlewares: &Middlewares, handler: Handler) -> Handler {
    if middlewares.is_empty() {
        handler
    } else {
        middlewares.handler(handler)
    }
}

fn route_http(routes: Arc<Routes>) -> Handler {
    Handler::from_fn(move |req, resp| routes.dispatch(req, resp))
}

impl Routes {
    fn dispatch(&self, req: &mut Request, resp: &mut Response) {
        let req_method = req.method;
        let req_path = if req.path.is_empty() {
            "/".to_string()
        } else {
            req.path.clone()
        };

        let rctx = RoutingContext::get_or_create(req);
        let path = if rctx.route_path.is_empty() {
            req_path
        } else {
            rctx.route_path.clone()
        };
        let method = rctx.route_method.unwrap_or(req_method);

        let not_found = self
            .not_found
            .clone()
            .or_else(|| rctx.inherited_not_found.clone());
        let method_not_allowed = self
            .method_not_allowed
            .clone()
            .or_else(|| rctx.inherited_method_not_allowed.clone());

        if !method.is_valid() {
            trace!(%path, "unsupported request method");
            method_not_allowed
                .unwrap_or_else(default_method_not_allowed)
                .serve(req, resp);
            return;
        }

        let found = self
            .tree
            .find_route(rctx, method, &path)
            .map(|(_, endpoint)| endpoint.handler.clone());

        match found {
            Some(handler) => {
                trace!(%method, %path, pattern = rctx.matched_pattern(), "route matched");
                rctx.inherited_not_found = not_found;
                rctx.inherited_method_not_allowed = method_not_allowed;
                handler.serve(req, resp);
            }
            None if rctx.method_not_allowed => {
                trace!(%method, %path, "method not allowed");
                method_not_allowed
                    .unwrap_or_else(default_method_not_allowed)
                    .serve(req, resp);
            }
            None => {
                trace!(%method, %path, "no route");
                not_found
                    .unwrap_or_else(default_not_found)
                    .serve(req, resp);
            }
        }
    }
}

// Path left for a mounted router: the wildcard capture of the mount pattern.
fn next_route_path(rctx: &RoutingContext) -> String {
    let params = rctx.route_params();
    match params.keys.last() {
        Some(key) if key == WILDCARD_KEY => match params.values.get(params.keys.len() - 1) {
            Some(rest) => format!("/{rest}"),
            None => "/".to_string(),
        },
        _ => "/".to_string(),
    }
}

fn mount_handler(sub: Arc<Mux>) -> Handler {
    Handler::from_fn(move |req, resp| {
        let rctx = RoutingContext::get_or_create(req);
        rctx.route_path = next_route_path(rctx);

        // The sub-router captures its own wildcard
        let url_params = &mut rctx.url_params;
        if url_params.keys.last().is_some_and(|k| k == WILDCARD_KEY) {
            if let Some(value) = url_params.values.last_mut() {
                value.clear();
            }
        }

        sub.serve(req, resp);
    })
}

fn default_not_found() -> Handler {
    Handler::from_fn(|req, resp| {
        resp.status = status::NOT_FOUND;
        resp.write(&format!("Resource ({}) not found", req.path));
    })
}

fn default_method_not_allowed() -> Handler {
    Handler::from_fn(|req, resp| {
        resp.status = status::METHOD_NOT_ALLOWED;
        resp.write(&format!("HTTP Method ({}) not allowed", req.method));
    })
}

fn walk_routes<F, E>(
    mux: &Mux,
    f: &mut F,
    parent_pattern: &str,
    parent_middlewares: &Middlewares,
) -> std::result::Result<(), E>
where
    F: FnMut(Method, &str, &Handler, &Middlewares) -> std::result::Result<(), E>,
{
    for route in mux.routes() {
        let mut middlewares = parent_middlewares.clone();
        middlewares.extend(mux.middlewares.iter().cloned());

        let pattern = format!("{parent_pattern}{}", route.pattern);
        if let Some(sub) = &route.subroutes {
            walk_routes(sub, &mut *f, &pattern, &middlewares)?;
            continue;
        }

        let pattern = collapse_wildcards(&pattern);
        for (name, handler) in &route.handlers {
            // Every method of a match-all binding has its own slot too
            if name == WILDCARD_KEY {
                continue;
            }
            let method = Method::parse(name);
            match handler {
                Handler::Chain(c) => {
                    let mut all = middlewares.clone();
                    all.extend(c.middlewares.iter().cloned());
                    f(method, &pattern, &c.endpoint, &all)?;
                }
                Handler::Func(_) => f(method, &pattern, handler, &middlewares)?,
            }
        }
    }
    Ok(())
}
