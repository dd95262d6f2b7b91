//! Handlers and middleware chains

use std::{fmt, sync::Arc};

use crate::http::{Request, Response};

/// Signature of a request handler function.
pub type HandlerFn = dyn Fn(&mut Request, &mut Response) + Send + Sync;

/// A function that wraps a handler into another handler.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// A request handler.
///
/// Handlers produced by wrapping an endpoint in a middleware list are tagged
/// [`Handler::Chain`] so that route walking can recover the original endpoint
/// and the middlewares applied to it.
#[derive(Clone)]
pub enum Handler {
    /// A plain handler function
    Func(Arc<HandlerFn>),
    /// An endpoint composed with a middleware list
    Chain(Arc<ChainHandler>),
}

impl Handler {
    /// Wraps a closure into a handler.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) + Send + Sync + 'static,
    {
        Handler::Func(Arc::new(f))
    }

    /// Runs the handler.
    #[inline]
    pub fn serve(&self, req: &mut Request, resp: &mut Response) {
        match self {
            Handler::Func(f) => f(req, resp),
            Handler::Chain(c) => c.chain.serve(req, resp),
        }
    }

    pub fn is_chain(&self) -> bool {
        matches!(self, Handler::Chain(_))
    }

    /// Same underlying handler (pointer identity).
    pub fn ptr_eq(&self, other: &Handler) -> bool {
        match (self, other) {
            (Handler::Func(a), Handler::Func(b)) => Arc::ptr_eq(a, b),
            (Handler::Chain(a), Handler::Chain(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Func(_) => f.write_str("Handler::Func"),
            Handler::Chain(c) => f
                .debug_struct("Handler::Chain")
                .field("middlewares", &c.middlewares.len())
                .finish(),
        }
    }
}

/// An endpoint together with the middleware list wrapped around it.
pub struct ChainHandler {
    /// The handler the middlewares were applied to
    pub endpoint: Handler,
    /// The composed handler that actually runs
    pub chain: Handler,
    /// Middlewares, outermost first
    pub middlewares: Middlewares,
}

/// Builds a middleware from a closure taking the next handler.
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Composes `middlewares` around `endpoint`.
///
/// The first middleware is outermost and the endpoint innermost. An empty
/// list returns the endpoint untouched.
pub fn chain(middlewares: &[Middleware], endpoint: Handler) -> Handler {
    middlewares
        .iter()
        .rev()
        .fold(endpoint, |next, mw| mw(next))
}

/// Ordered middleware stack.
#[derive(Clone, Default)]
pub struct Middlewares(Vec<Middleware>);

impl Middlewares {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mw: Middleware) {
        self.0.push(mw);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Middleware>) {
        self.0.extend(other);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Middleware> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Middleware] {
        &self.0
    }

    /// Wraps `endpoint` in this stack, keeping the endpoint and the stack
    /// reachable for introspection.
    pub fn handler(&self, endpoint: Handler) -> Handler {
        let composed = chain(&self.0, endpoint.clone());
        Handler::Chain(Arc::new(ChainHandler {
            endpoint,
            chain: composed,
            middlewares: self.clone(),
        }))
    }
}

impl From<Vec<Middleware>> for Middlewares {
    fn from(v: Vec<Middleware>) -> Self {
        Self(v)
    }
}

impl IntoIterator for Middlewares {
    type Item = Middleware;
    type IntoIter = std::vec::IntoIter<Middleware>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Middlewares {
    type Item = &'a Middleware;
    type IntoIter = std::slice::Iter<'a, Middleware>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Debug for Middlewares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Middlewares({})", self.0.len())
    }
}
