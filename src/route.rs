//! Route definitions and data structures

use bitflags::bitflags;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use crate::chain::Handler;
use crate::router::Mux;

bitflags! {
    /// HTTP methods represented as bit flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Method: u16 {
        const CONNECT = 1 << 0;
        const DELETE  = 1 << 1;
        const GET     = 1 << 2;
        const HEAD    = 1 << 3;
        const OPTIONS = 1 << 4;
        const PATCH   = 1 << 5;
        const POST    = 1 << 6;
        const PUT     = 1 << 7;
        const TRACE   = 1 << 8;

        /// Every routable method; binds the "match all" slot
        const ALL = Self::CONNECT.bits()
            | Self::DELETE.bits()
            | Self::GET.bits()
            | Self::HEAD.bits()
            | Self::OPTIONS.bits()
            | Self::PATCH.bits()
            | Self::POST.bits()
            | Self::PUT.bits()
            | Self::TRACE.bits();
    }
}

impl Method {
    /// The concrete methods, in table order.
    pub const CONCRETE: [Method; 9] = [
        Method::CONNECT,
        Method::DELETE,
        Method::GET,
        Method::HEAD,
        Method::OPTIONS,
        Method::PATCH,
        Method::POST,
        Method::PUT,
        Method::TRACE,
    ];

    /// Parse HTTP method from string.
    ///
    /// Unknown tokens yield the empty set, which never routes.
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "CONNECT" => Method::CONNECT,
            "DELETE" => Method::DELETE,
            "GET" => Method::GET,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "TRACE" => Method::TRACE,
            _ => Method::empty(),
        }
    }

    /// Parse multiple HTTP methods from slice
    pub fn from_slice(methods: &[&str]) -> Self {
        methods
            .iter()
            .fold(Method::empty(), |acc, m| acc | Self::parse(m))
    }

    /// True for exactly one concrete method, the only kind a request can carry.
    pub fn is_valid(&self) -> bool {
        self.bits().count_ones() == 1 && Method::ALL.contains(*self)
    }

    /// Canonical name of a single method, empty for sets.
    pub fn as_str(&self) -> &'static str {
        match *self {
            Method::CONNECT => "CONNECT",
            Method::DELETE => "DELETE",
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::TRACE => "TRACE",
            _ => "",
        }
    }
}

impl Default for Method {
    fn default() -> Self {
        Method::empty()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A method-specific binding of a pattern to a handler.
#[derive(Clone)]
pub struct Endpoint {
    /// Handler invoked on match (possibly a middleware chain)
    pub handler: Handler,
    /// Full routing pattern that produced this binding
    pub pattern: String,
    /// Parameter keys in left-to-right pattern order
    pub param_keys: Vec<String>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("pattern", &self.pattern)
            .field("param_keys", &self.param_keys)
            .field("chained", &self.handler.is_chain())
            .finish()
    }
}

/// Endpoint table of a trie node, keyed by single method or [`Method::ALL`].
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    by_method: BTreeMap<Method, Endpoint>,
    /// Slots filled by a mount rather than by a user route
    stubs: BTreeSet<Method>,
}

impl Endpoints {
    /// Binds `handler` for every method in `method`.
    ///
    /// A mask equal to [`Method::ALL`] also fills the match-all slot.
    pub(crate) fn bind(&mut self, method: Method, endpoint: Endpoint) {
        for slot in Self::slots(method) {
            self.stubs.remove(&slot);
            self.by_method.insert(slot, endpoint.clone());
        }
    }

    /// Marks the slots of `method` as installed by a mount.
    ///
    /// A later [`Endpoints::bind`] on a slot clears its mark again.
    pub(crate) fn mark_stub(&mut self, method: Method) {
        self.stubs.extend(Self::slots(method));
    }

    /// Whether the slot for `method` holds a mount stub.
    pub fn is_stub(&self, method: Method) -> bool {
        self.stubs.contains(&method)
    }

    fn slots(method: Method) -> impl Iterator<Item = Method> {
        let all = (method == Method::ALL).then_some(Method::ALL);
        all.into_iter()
            .chain(Method::CONCRETE.into_iter().filter(move |m| method.contains(*m)))
    }

    /// Endpoint registered for `method`.
    pub fn get(&self, method: Method) -> Option<&Endpoint> {
        self.by_method.get(&method)
    }

    /// Iterate over `(method key, endpoint)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Method, &Endpoint)> {
        self.by_method.iter().map(|(m, e)| (*m, e))
    }

    pub fn is_empty(&self) -> bool {
        self.by_method.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_method.len()
    }
}

/// One pattern of a router with the handlers bound to it.
#[derive(Clone)]
pub struct Route {
    /// Pattern as registered
    pub pattern: String,
    /// Handlers by method name; `"*"` holds the match-all binding
    pub handlers: BTreeMap<String, Handler>,
    /// Router mounted below this pattern, if any
    pub subroutes: Option<Arc<Mux>>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("methods", &self.handlers.keys().collect::<Vec<_>>())
            .field("mounted", &self.subroutes.is_some())
            .finish()
    }
}

/// Flattened, serializable row of a route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub method: String,
    pub pattern: String,
    /// Number of middlewares wrapped around the endpoint, across all routers
    pub middlewares: usize,
}
