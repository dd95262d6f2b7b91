//! Configuration errors raised while building a router

use thiserror::Error;

/// Errors reported synchronously by the registration API.
///
/// Every variant describes a programming mistake in the route table and is
/// meant to abort startup. Requests that simply do not match a route are not
/// errors; they are answered by the not-found / method-not-allowed handlers.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Routing patterns must be absolute.
    #[error("routing pattern must begin with '/' in '{0}'")]
    MissingLeadingSlash(String),

    /// A `{` without its matching `}`.
    #[error("route param closing delimiter '}}' is missing in '{0}'")]
    UnclosedParam(String),

    /// `*` is only valid as the very last character of a pattern.
    #[error("wildcard '*' must be the last value in route '{0}', otherwise use a '{{param}}'")]
    WildcardNotLast(String),

    /// The same parameter name appears twice in one pattern.
    #[error("routing pattern '{pattern}' contains duplicate param key '{key}'")]
    DuplicateParamKey { pattern: String, key: String },

    /// The regular expression of a `{name:regex}` segment does not compile.
    #[error("invalid regexp '{regex}' in routing pattern")]
    InvalidRegex {
        regex: String,
        #[source]
        source: regex::Error,
    },

    /// A method name outside the routable set.
    #[error("'{0}' http method is not supported")]
    UnsupportedMethod(String),

    /// `use_middleware` was called after routes were registered.
    #[error("all middlewares must be defined before routes on a mux")]
    MiddlewareAfterRoutes,

    /// A sub-router is already mounted on this path.
    #[error("attempting to mount a handler on an existing path, '{0}'")]
    MountCollision(String),

    /// The route table is shared with a running dispatcher and can no longer change.
    #[error("router is already serving requests; routes can no longer be modified")]
    Frozen,
}

/// Result alias for registration operations.
pub type Result<T, E = RouterError> = std::result::Result<T, E>;
