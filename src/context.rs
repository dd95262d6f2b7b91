//! Per-request state: the typed value store and the routing context

use std::any::Any;
use std::collections::hash_map::{Entry, HashMap};
use std::fmt;

use crate::chain::Handler;
use crate::http::Request;
use crate::route::Method;

/// String-keyed store of typed values carried by a request.
///
/// Retrieval is checked against the expected type; a missing key and a type
/// mismatch both yield `None`.
#[derive(Default)]
pub struct Context {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set_value<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Returns the value under `key` if it holds a `T`.
    pub fn try_get_value<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Mutable variant of [`Context::try_get_value`].
    pub fn try_get_value_mut<T: Any + Send + Sync>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Removes and returns the value under `key` if it holds a `T`.
    ///
    /// A value of another type is left in place.
    pub fn remove_value<T: Any + Send + Sync>(&mut self, key: &str) -> Option<T> {
        if !self.contains::<T>(key) {
            return None;
        }
        self.values
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }

    pub fn contains<T: Any + Send + Sync>(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|v| v.is::<T>())
    }

    /// Returns the `T` under `key`, storing `f()` first when the slot is
    /// empty or holds another type.
    pub fn get_or_insert_with<T, F>(&mut self, key: &str, f: F) -> &mut T
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let slot = match self.values.entry(key.to_owned()) {
            Entry::Occupied(e) if e.get().is::<T>() => e.into_mut(),
            Entry::Occupied(mut e) => {
                e.insert(Box::new(f()));
                e.into_mut()
            }
            Entry::Vacant(e) => e.insert(Box::new(f())),
        };
        // Invariant: every arm above leaves a `T` in the slot.
        match slot.downcast_mut::<T>() {
            Some(v) => v,
            None => unreachable!("context slot '{key}' does not hold the requested type"),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("Context").field("keys", &keys).finish()
    }
}

/// Parallel stacks of URL parameter keys and values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    pub keys: Vec<String>,
    pub values: Vec<String>,
}

impl RouteParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.keys.push(key.into());
        self.values.push(value.into());
    }

    /// First value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        let idx = self.keys.iter().position(|k| k == key)?;
        self.values.get(idx).map(String::as_str)
    }

    /// Last value recorded for `key`.
    pub fn get_last(&self, key: &str) -> Option<&str> {
        let idx = self.keys.iter().rposition(|k| k == key)?;
        self.values.get(idx).map(String::as_str)
    }

    /// Iterate over `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys
            .iter()
            .zip(&self.values)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
    }

    /// Appends another parameter set.
    pub(crate) fn extend(&mut self, other: &RouteParams) {
        self.keys.extend(other.keys.iter().cloned());
        self.values.extend(other.values.iter().cloned());
    }
}

/// Routing state attached to a request while it travels through routers.
///
/// Created at most once per request and stored in the request context
/// under [`RoutingContext::KEY`].
#[derive(Debug, Clone, Default)]
pub struct RoutingContext {
    /// Path still to be routed; set when delegating into a mounted router
    pub route_path: String,
    /// Method override for the lookup
    pub route_method: Option<Method>,
    /// Parameters captured by every router level, in capture order
    pub url_params: RouteParams,
    /// Patterns matched by every router level
    pub route_patterns: Vec<String>,

    // State of the lookup in progress, reset for every tree search
    pub(crate) route_pattern: String,
    pub(crate) route_params: RouteParams,
    pub(crate) method_not_allowed: bool,

    // Fallbacks handed down by the parent router
    pub(crate) inherited_not_found: Option<Handler>,
    pub(crate) inherited_method_not_allowed: Option<Handler>,
}

impl RoutingContext {
    /// Key of the routing context in [`Request::context`].
    pub const KEY: &'static str = "radix_mux::RoutingContext";

    pub fn new() -> Self {
        Self::default()
    }

    /// Routing context of `req`, if one was created.
    pub fn from_request(req: &Request) -> Option<&RoutingContext> {
        req.context.try_get_value(Self::KEY)
    }

    pub fn from_request_mut(req: &mut Request) -> Option<&mut RoutingContext> {
        req.context.try_get_value_mut(Self::KEY)
    }

    /// Routing context of `req`, created on first use.
    pub fn get_or_create(req: &mut Request) -> &mut RoutingContext {
        req.context.get_or_insert_with(Self::KEY, RoutingContext::new)
    }

    /// Returns the context to its initial state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Most recent value captured for `key` across all router levels.
    pub fn url_param(&self, key: &str) -> Option<&str> {
        self.url_params.get_last(key)
    }

    /// Full matched pattern across nested routers, wildcards of mount
    /// points collapsed.
    pub fn route_pattern(&self) -> String {
        collapse_wildcards(&self.route_patterns.concat())
    }

    /// Pattern matched by the most recent tree lookup.
    pub fn matched_pattern(&self) -> &str {
        &self.route_pattern
    }

    /// Parameters captured by the most recent tree lookup.
    pub fn route_params(&self) -> &RouteParams {
        &self.route_params
    }

    /// Whether the last lookup found the path but not the method.
    pub fn method_not_allowed(&self) -> bool {
        self.method_not_allowed
    }

    /// Clears the per-lookup fields before a tree search.
    pub(crate) fn begin_lookup(&mut self) {
        self.route_pattern.clear();
        self.route_params.clear();
        self.method_not_allowed = false;
    }
}

// "/api/*" + "/users" reads as "/api/users"
pub(crate) fn collapse_wildcards(pattern: &str) -> String {
    let mut pattern = pattern.to_string();
    while pattern.contains("/*/") {
        pattern = pattern.replace("/*/", "/");
    }
    pattern
}

/// URL parameter `key` of `req`, if routing captured one.
pub fn url_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    RoutingContext::from_request(req)?.url_param(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_lookup() {
        let mut ctx = Context::new();
        ctx.set_value("id", 42i64);

        assert_eq!(ctx.try_get_value::<i64>("id"), Some(&42));
        assert_eq!(ctx.try_get_value::<String>("id"), None);
        assert_eq!(ctx.try_get_value::<i64>("missing"), None);
    }

    #[test]
    fn test_mutation_and_removal() {
        let mut ctx = Context::new();
        ctx.set_value("count", 1u32);
        *ctx.try_get_value_mut::<u32>("count").unwrap() += 1;
        assert_eq!(ctx.try_get_value::<u32>("count"), Some(&2));

        assert_eq!(ctx.remove_value::<String>("count"), None);
        assert_eq!(ctx.remove_value::<u32>("count"), Some(2));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_get_or_insert_replaces_other_types() {
        let mut ctx = Context::new();
        ctx.set_value("slot", "text");
        *ctx.get_or_insert_with("slot", || 0u8) += 5;
        assert_eq!(ctx.try_get_value::<u8>("slot"), Some(&5));
        *ctx.get_or_insert_with("slot", || 0u8) += 1;
        assert_eq!(ctx.try_get_value::<u8>("slot"), Some(&6));
    }

    #[test]
    fn test_route_params() {
        let mut params = RouteParams::new();
        params.add("id", "1");
        params.add("name", "a");
        params.add("id", "2");

        assert_eq!(params.get("id"), Some("1"));
        assert_eq!(params.get_last("id"), Some("2"));
        assert_eq!(params.len(), 3);
        assert_eq!(
            params.iter().collect::<Vec<_>>(),
            vec![("id", "1"), ("name", "a"), ("id", "2")]
        );
    }

    #[test]
    fn test_routing_context_lives_in_request() {
        let mut req = Request::new(Method::GET, "/users/7");
        assert!(RoutingContext::from_request(&req).is_none());

        RoutingContext::get_or_create(&mut req)
            .url_params
            .add("id", "7");
        RoutingContext::get_or_create(&mut req)
            .url_params
            .add("id", "8");

        assert_eq!(url_param(&req, "id"), Some("8"));
        assert_eq!(url_param(&req, "nope"), None);
    }

    #[test]
    fn test_route_pattern_joins_mounts() {
        let mut rctx = RoutingContext::new();
        rctx.route_patterns.push("/api/*".to_string());
        rctx.route_patterns.push("/v1/*".to_string());
        rctx.route_patterns.push("/users/{id}".to_string());
        assert_eq!(rctx.route_pattern(), "/api/v1/users/{id}");
    }

    #[test]
    fn test_reset() {
        let mut rctx = RoutingContext::new();
        rctx.route_path = "/x".to_string();
        rctx.url_params.add("a", "b");
        rctx.method_not_allowed = true;
        rctx.reset();
        assert!(rctx.route_path.is_empty());
        assert!(rctx.url_params.is_empty());
        assert!(!rctx.method_not_allowed());
    }
}
