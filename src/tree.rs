//! Radix trie holding the routes of one router
//!
//! Every node owns four child buckets, one per [`NodeType`], searched in
//! bucket order. Static buckets are kept sorted by their first byte so a
//! lookup can binary search them; parameter buckets keep their catch-rest
//! siblings (tail `/`) after the ones with a narrower delimiter.

use regex::bytes::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::chain::Handler;
use crate::context::RoutingContext;
use crate::error::Result;
use crate::pattern::{compile_regex, longest_prefix, next_segment, NodeType};
use crate::route::{Endpoint, Endpoints, Method, Route};
use crate::router::Mux;

pub(crate) struct Node {
    pub typ: NodeType,
    /// Static text, segment text for params, anchored regex source for regexps
    pub prefix: Vec<u8>,
    /// First byte of the key this node was inserted under
    pub label: u8,
    /// Delimiter ending a parameter capture
    pub tail: u8,
    pub rex: Option<Regex>,
    pub endpoints: Endpoints,
    /// Router mounted at this node
    pub subroutes: Option<Arc<Mux>>,
    pub children: [Vec<Node>; 4],
}

impl Node {
    fn new(typ: NodeType, label: u8, tail: u8, prefix: Vec<u8>) -> Self {
        Self {
            typ,
            prefix,
            label,
            tail,
            rex: None,
            endpoints: Endpoints::default(),
            subroutes: None,
            children: Default::default(),
        }
    }

    /// Empty root node.
    pub fn root() -> Self {
        Self::new(NodeType::Static, 0, 0, Vec::new())
    }

    pub fn is_leaf(&self) -> bool {
        !self.endpoints.is_empty()
    }

    /// Binds `handler` to `pattern` for every method in `method` and returns
    /// the node holding the binding.
    pub fn insert_route(
        &mut self,
        method: Method,
        pattern: &str,
        param_keys: Vec<String>,
        handler: Handler,
    ) -> Result<&mut Node> {
        let endpoint = Endpoint {
            handler,
            pattern: pattern.to_string(),
            param_keys,
        };
        self.insert_at(method, pattern.as_bytes(), endpoint)
    }

    fn insert_at(&mut self, method: Method, search: &[u8], endpoint: Endpoint) -> Result<&mut Node> {
        if search.is_empty() {
            self.endpoints.bind(method, endpoint);
            return Ok(self);
        }

        let label = search[0];
        let seg = match label {
            b'{' | b'*' => Some(next_segment(search)?),
            _ => None,
        };
        let (typ, tail) = seg
            .as_ref()
            .map_or((NodeType::Static, 0), |s| (s.node_type, s.tail));
        let rex_src: &[u8] = match &seg {
            Some(s) if s.node_type == NodeType::Regexp => s.regex.as_bytes(),
            _ => &[],
        };

        let Some(idx) = self.edge_index(typ, label, tail, rex_src) else {
            let leaf = self.add_child(Node::new(NodeType::Static, label, tail, search.to_vec()), search)?;
            leaf.endpoints.bind(method, endpoint);
            return Ok(leaf);
        };

        if typ != NodeType::Static {
            let end = seg.map_or(search.len(), |s| s.end);
            return self.children[typ.index()][idx].insert_at(method, &search[end..], endpoint);
        }

        let edge_len = self.children[0][idx].prefix.len();
        let common = longest_prefix(search, &self.children[0][idx].prefix);
        if common == edge_len {
            return self.children[0][idx].insert_at(method, &search[common..], endpoint);
        }

        // Split the edge at the shared prefix
        let split = Node::new(NodeType::Static, label, 0, search[..common].to_vec());
        let mut existing = std::mem::replace(&mut self.children[0][idx], split);
        existing.prefix.drain(..common);
        existing.label = existing.prefix[0];

        let split = &mut self.children[0][idx];
        split.attach(existing);

        let rest = &search[common..];
        if rest.is_empty() {
            split.endpoints.bind(method, endpoint);
            return Ok(split);
        }
        let leaf = split.add_child(Node::new(NodeType::Static, rest[0], 0, rest.to_vec()), rest)?;
        leaf.endpoints.bind(method, endpoint);
        Ok(leaf)
    }

    /// Shapes `child` after the first segment of `search`, attaches it and
    /// returns the leaf for the end of `search`.
    fn add_child(&mut self, mut child: Node, search: &[u8]) -> Result<&mut Node> {
        let seg = next_segment(search)?;
        let mut next: Option<(Node, &[u8])> = None;

        if seg.node_type != NodeType::Static {
            if seg.start == 0 {
                child.typ = seg.node_type;
                child.tail = seg.tail;
                if seg.node_type == NodeType::Regexp {
                    child.prefix = seg.regex.clone().into_bytes();
                    child.rex = Some(compile_regex(&seg.regex)?);
                } else {
                    child.prefix = search[..seg.end].to_vec();
                }

                let rest = &search[seg.end..];
                if !rest.is_empty() {
                    next = Some((Node::new(NodeType::Static, rest[0], 0, rest.to_vec()), rest));
                }
            } else {
                // Static lead, then the parameter
                child.typ = NodeType::Static;
                child.prefix = search[..seg.start].to_vec();
                let rest = &search[seg.start..];
                next = Some((Node::new(seg.node_type, rest[0], seg.tail, Vec::new()), rest));
            }
        }

        let bucket = child.typ.index();
        let idx = self.attach(child);
        let node = &mut self.children[bucket][idx];
        match next {
            Some((grandchild, rest)) => node.add_child(grandchild, rest),
            None => Ok(node),
        }
    }

    // Inserts `child` into its bucket, keeping the bucket ordered.
    fn attach(&mut self, child: Node) -> usize {
        let key = child.sort_key();
        let bucket = &mut self.children[child.typ.index()];
        let idx = bucket.partition_point(|n| n.sort_key() <= key);
        bucket.insert(idx, child);
        idx
    }

    fn sort_key(&self) -> (bool, u8) {
        (self.typ != NodeType::Static && self.tail == b'/', self.label)
    }

    fn edge_index(&self, typ: NodeType, label: u8, tail: u8, prefix: &[u8]) -> Option<usize> {
        self.children[typ.index()].iter().position(|n| {
            n.label == label
                && n.tail == tail
                && (typ != NodeType::Regexp || n.prefix == prefix)
        })
    }

    /// Looks up `path` for `method`.
    ///
    /// On success the captured parameters are appended to
    /// `rctx.url_params` and the matched pattern is recorded. When the path
    /// matched but no endpoint accepts the method, `rctx.method_not_allowed`
    /// is set and `None` is returned.
    pub fn find_route<'n>(
        &'n self,
        rctx: &mut RoutingContext,
        method: Method,
        path: &str,
    ) -> Option<(&'n Node, &'n Endpoint)> {
        rctx.begin_lookup();

        let node = self.find_route_helper(rctx, method, path.as_bytes())?;
        let endpoint = node.endpoints.get(method)?;

        rctx.url_params.extend(&rctx.route_params);
        if !endpoint.pattern.is_empty() {
            rctx.route_pattern = endpoint.pattern.clone();
            rctx.route_patterns.push(endpoint.pattern.clone());
        }
        Some((node, endpoint))
    }

    fn find_route_helper<'n>(
        &'n self,
        rctx: &mut RoutingContext,
        method: Method,
        path: &[u8],
    ) -> Option<&'n Node> {
        for typ in NodeType::ORDERED {
            let nodes = &self.children[typ.index()];
            if nodes.is_empty() {
                continue;
            }

            match typ {
                NodeType::Static => {
                    let Some(&first) = path.first() else { continue };
                    let Some(node) = find_edge(first, nodes) else { continue };
                    if !path.starts_with(&node.prefix) {
                        continue;
                    }
                    if let Some(found) = node.descend(rctx, method, &path[node.prefix.len()..]) {
                        return Some(found);
                    }
                }

                NodeType::Param | NodeType::Regexp => {
                    if path.is_empty() {
                        continue;
                    }
                    for node in nodes {
                        // Without its delimiter a '/' tail takes the rest
                        let end = match path.iter().position(|&b| b == node.tail) {
                            Some(p) => p,
                            None if node.tail == b'/' => path.len(),
                            None => continue,
                        };

                        let (capture, rest) = path.split_at(end);
                        match &node.rex {
                            Some(rex) => {
                                if end == 0 || !rex.is_match(capture) {
                                    continue;
                                }
                            }
                            None => {
                                if capture.contains(&b'/') {
                                    continue;
                                }
                            }
                        }

                        let mark = rctx.route_params.values.len();
                        rctx.route_params
                            .values
                            .push(String::from_utf8_lossy(capture).into_owned());

                        if let Some(found) = node.descend(rctx, method, rest) {
                            return Some(found);
                        }
                        rctx.route_params.values.truncate(mark);
                    }
                }

                NodeType::CatchAll => {
                    let node = &nodes[0];
                    let mark = rctx.route_params.values.len();
                    rctx.route_params
                        .values
                        .push(String::from_utf8_lossy(path).into_owned());

                    if let Some(found) = node.descend(rctx, method, &[]) {
                        return Some(found);
                    }
                    rctx.route_params.values.truncate(mark);
                }
            }
        }
        None
    }

    // Tries to finish the lookup at or below `self` with `rest` left.
    fn descend<'n>(&'n self, rctx: &mut RoutingContext, method: Method, rest: &[u8]) -> Option<&'n Node> {
        if rest.is_empty() && self.is_leaf() {
            if let Some(endpoint) = self.endpoints.get(method) {
                rctx.route_params
                    .keys
                    .extend(endpoint.param_keys.iter().cloned());
                return Some(self);
            }
            rctx.method_not_allowed = true;
        }
        self.find_route_helper(rctx, method, rest)
    }

    /// Whether `pattern` already has a matching branch in the trie.
    ///
    /// Parameter segments match any parameter node regardless of name.
    pub fn find_pattern(&self, pattern: &[u8]) -> bool {
        let Some(&first) = pattern.first() else {
            return false;
        };

        for nodes in &self.children {
            let Some(head) = nodes.first() else { continue };
            let node = match head.typ {
                NodeType::CatchAll => head,
                _ => match find_edge(first, nodes) {
                    Some(n) => n,
                    None => continue,
                },
            };

            let idx = match node.typ {
                NodeType::Static => {
                    let idx = longest_prefix(pattern, &node.prefix);
                    if idx < node.prefix.len() {
                        continue;
                    }
                    idx
                }
                NodeType::Param | NodeType::Regexp => match pattern.iter().position(|&b| b == b'}') {
                    Some(p) => p + 1,
                    None => continue,
                },
                NodeType::CatchAll => longest_prefix(pattern, b"*"),
            };

            let rest = &pattern[idx..];
            if rest.is_empty() {
                return true;
            }
            return node.find_pattern(rest);
        }
        false
    }

    /// Visits nodes depth first, in bucket order, until `f` returns true.
    pub fn walk<F>(&self, f: &mut F) -> bool
    where
        F: FnMut(&Node) -> bool,
    {
        if f(self) {
            return true;
        }
        for child in self.children.iter().flatten() {
            if child.walk(&mut *f) {
                return true;
            }
        }
        false
    }

    /// Routes of this trie grouped by pattern, skipping mount stubs.
    pub fn routes(&self) -> Vec<Route> {
        let mut routes = Vec::new();
        self.walk(&mut |node: &Node| {
            let mut by_pattern: BTreeMap<&str, BTreeMap<String, Handler>> = BTreeMap::new();
            for (method, endpoint) in node.endpoints.iter() {
                if endpoint.pattern.is_empty() || node.endpoints.is_stub(method) {
                    continue;
                }
                let name = if method == Method::ALL { "*" } else { method.as_str() };
                by_pattern
                    .entry(endpoint.pattern.as_str())
                    .or_default()
                    .insert(name.to_string(), endpoint.handler.clone());
            }

            routes.extend(by_pattern.into_iter().map(|(pattern, handlers)| Route {
                pattern: pattern.to_string(),
                handlers,
                subroutes: node.subroutes.clone(),
            }));
            false
        });
        routes
    }
}

fn find_edge(label: u8, nodes: &[Node]) -> Option<&Node> {
    nodes
        .binary_search_by_key(&label, |n| n.label)
        .ok()
        .map(|i| &nodes[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, Response};
    use crate::pattern::param_keys;

    fn tagged(tag: &'static str) -> Handler {
        Handler::from_fn(move |_, resp| resp.write(tag))
    }

    fn add(tree: &mut Node, method: Method, pattern: &str, tag: &'static str) {
        let keys = param_keys(pattern).unwrap();
        tree.insert_route(method, pattern, keys, tagged(tag)).unwrap();
    }

    // Runs the handler found for `path` and returns its body.
    fn lookup(tree: &Node, method: Method, path: &str) -> (Option<String>, RoutingContext) {
        let mut rctx = RoutingContext::new();
        let body = tree.find_route(&mut rctx, method, path).map(|(_, ep)| {
            let mut req = Request::new(method, path);
            let mut resp = Response::new();
            ep.handler.serve(&mut req, &mut resp);
            resp.body
        });
        (body, rctx)
    }

    fn params(rctx: &RoutingContext) -> Vec<(String, String)> {
        rctx.url_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_static_routes_share_prefix() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/foo/bar", "bar");
        add(&mut tree, Method::GET, "/foo/baz", "baz");
        add(&mut tree, Method::GET, "/foo", "foo");

        assert_eq!(lookup(&tree, Method::GET, "/foo/bar").0.as_deref(), Some("bar"));
        assert_eq!(lookup(&tree, Method::GET, "/foo/baz").0.as_deref(), Some("baz"));
        assert_eq!(lookup(&tree, Method::GET, "/foo").0.as_deref(), Some("foo"));
        assert_eq!(lookup(&tree, Method::GET, "/foo/ba").0, None);

        // "/foo" is the single shared edge below the root
        assert_eq!(tree.children[0].len(), 1);
        assert_eq!(tree.children[0][0].prefix, b"/foo");
    }

    #[test]
    fn test_split_keeps_sibling_order() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/zeta", "z");
        add(&mut tree, Method::GET, "/alpha", "a");
        add(&mut tree, Method::GET, "/mid", "m");

        let labels: Vec<u8> = tree.children[0][0].children[0]
            .iter()
            .map(|n| n.label)
            .collect();
        assert_eq!(labels, vec![b'a', b'm', b'z']);
        assert_eq!(lookup(&tree, Method::GET, "/mid").0.as_deref(), Some("m"));
    }

    #[test]
    fn test_param_capture() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/users/{id}", "user");

        let (body, rctx) = lookup(&tree, Method::GET, "/users/42");
        assert_eq!(body.as_deref(), Some("user"));
        assert_eq!(params(&rctx), vec![("id".into(), "42".into())]);
        assert_eq!(rctx.matched_pattern(), "/users/{id}");

        assert_eq!(lookup(&tree, Method::GET, "/users/42/extra").0, None);
        assert_eq!(lookup(&tree, Method::GET, "/users/").0, None);
    }

    #[test]
    fn test_static_beats_param() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/users/{id}", "param");
        add(&mut tree, Method::GET, "/users/me", "static");

        assert_eq!(lookup(&tree, Method::GET, "/users/me").0.as_deref(), Some("static"));
        assert_eq!(lookup(&tree, Method::GET, "/users/mo").0.as_deref(), Some("param"));
    }

    #[test]
    fn test_regexp_constraint() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/items/{id:[0-9]+}", "item");

        let (body, rctx) = lookup(&tree, Method::GET, "/items/7");
        assert_eq!(body.as_deref(), Some("item"));
        assert_eq!(rctx.url_param("id"), Some("7"));

        assert_eq!(lookup(&tree, Method::GET, "/items/abc").0, None);
        assert_eq!(lookup(&tree, Method::GET, "/items/7/x").0, None);
    }

    #[test]
    fn test_regexp_nodes_are_distinct() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/v/{n:[0-9]+}", "num");
        add(&mut tree, Method::GET, "/v/{s:[a-z]+}", "word");

        assert_eq!(tree.children[0][0].children[2].len(), 2);
        assert_eq!(lookup(&tree, Method::GET, "/v/12").0.as_deref(), Some("num"));
        let (body, rctx) = lookup(&tree, Method::GET, "/v/ab");
        assert_eq!(body.as_deref(), Some("word"));
        assert_eq!(rctx.url_param("s"), Some("ab"));
    }

    #[test]
    fn test_catch_all_takes_rest() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/static/*", "files");

        let (body, rctx) = lookup(&tree, Method::GET, "/static/a/b/c");
        assert_eq!(body.as_deref(), Some("files"));
        assert_eq!(params(&rctx), vec![("*".into(), "a/b/c".into())]);

        let (body, rctx) = lookup(&tree, Method::GET, "/static/");
        assert_eq!(body.as_deref(), Some("files"));
        assert_eq!(rctx.url_param("*"), Some(""));
    }

    #[test]
    fn test_custom_tail_delimiter() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/files/{name}.{ext}", "file");

        let (body, rctx) = lookup(&tree, Method::GET, "/files/report.pdf");
        assert_eq!(body.as_deref(), Some("file"));
        assert_eq!(
            params(&rctx),
            vec![("name".into(), "report".into()), ("ext".into(), "pdf".into())]
        );
        assert_eq!(lookup(&tree, Method::GET, "/files/report").0, None);
    }

    #[test]
    fn test_narrow_tail_param_sorts_first() {
        let orders = [
            ["/f/{name}", "/f/{name}.{ext}"],
            ["/f/{name}.{ext}", "/f/{name}"],
        ];
        for patterns in orders {
            let mut tree = Node::root();
            for pattern in patterns {
                add(&mut tree, Method::GET, pattern, "hit");
            }

            let dir = &tree.children[NodeType::Static.index()][0];
            assert_eq!(dir.prefix, b"/f/");
            let tails: Vec<u8> = dir.children[NodeType::Param.index()]
                .iter()
                .map(|n| n.tail)
                .collect();
            assert_eq!(tails, vec![b'.', b'/'], "order {patterns:?}");

            let (_, rctx) = lookup(&tree, Method::GET, "/f/a.b");
            assert_eq!(
                params(&rctx),
                vec![("name".into(), "a".into()), ("ext".into(), "b".into())]
            );
            let (_, rctx) = lookup(&tree, Method::GET, "/f/a");
            assert_eq!(params(&rctx), vec![("name".into(), "a".into())]);
        }
    }

    #[test]
    fn test_backtracking_restores_params() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/a/{x}/b/c", "param");
        add(&mut tree, Method::GET, "/a/{y:[0-9]+}/b/d", "regexp");

        // The param branch captures "1" and dead-ends on "/b/d"
        let (body, rctx) = lookup(&tree, Method::GET, "/a/1/b/d");
        assert_eq!(body.as_deref(), Some("regexp"));
        assert_eq!(params(&rctx), vec![("y".into(), "1".into())]);
    }

    #[test]
    fn test_sibling_params_share_node() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/a/{x}/fixed", "fixed");
        add(&mut tree, Method::GET, "/a/{y}/other", "other");

        let (body, rctx) = lookup(&tree, Method::GET, "/a/v/other");
        assert_eq!(body.as_deref(), Some("other"));
        assert_eq!(params(&rctx), vec![("y".into(), "v".into())]);

        let (body, rctx) = lookup(&tree, Method::GET, "/a/v/fixed");
        assert_eq!(body.as_deref(), Some("fixed"));
        assert_eq!(params(&rctx), vec![("x".into(), "v".into())]);
    }

    #[test]
    fn test_method_not_allowed_hint() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/x", "x");

        let (body, rctx) = lookup(&tree, Method::POST, "/x");
        assert_eq!(body, None);
        assert!(rctx.method_not_allowed());

        let (_, rctx) = lookup(&tree, Method::POST, "/y");
        assert!(!rctx.method_not_allowed());
    }

    #[test]
    fn test_method_mismatch_falls_through_to_other_branch() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/users/{id}", "get");
        add(&mut tree, Method::POST, "/users/*", "post");

        let (body, rctx) = lookup(&tree, Method::POST, "/users/5");
        assert_eq!(body.as_deref(), Some("post"));
        assert_eq!(params(&rctx), vec![("*".into(), "5".into())]);
    }

    #[test]
    fn test_match_all_then_override() {
        let mut tree = Node::root();
        add(&mut tree, Method::ALL, "/any", "all");
        add(&mut tree, Method::DELETE, "/any", "delete");

        assert_eq!(lookup(&tree, Method::GET, "/any").0.as_deref(), Some("all"));
        assert_eq!(lookup(&tree, Method::DELETE, "/any").0.as_deref(), Some("delete"));
    }

    #[test]
    fn test_param_in_middle_of_segment() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/v{version}/status", "status");

        let (body, rctx) = lookup(&tree, Method::GET, "/v2/status");
        assert_eq!(body.as_deref(), Some("status"));
        assert_eq!(rctx.url_param("version"), Some("2"));
    }

    #[test]
    fn test_utf8_paths() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/café", "cafe");
        add(&mut tree, Method::GET, "/caffè", "caffe");
        add(&mut tree, Method::GET, "/tags/{tag}", "tag");

        assert_eq!(lookup(&tree, Method::GET, "/café").0.as_deref(), Some("cafe"));
        assert_eq!(lookup(&tree, Method::GET, "/caffè").0.as_deref(), Some("caffe"));
        assert_eq!(lookup(&tree, Method::GET, "/tags/日本").1.url_param("tag"), Some("日本"));
    }

    #[test]
    fn test_find_pattern() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/api/*", "api");
        add(&mut tree, Method::GET, "/users/{id}", "user");

        assert!(tree.find_pattern(b"/api/*"));
        assert!(tree.find_pattern(b"/users/{name}"));
        assert!(!tree.find_pattern(b"/users/*"));
        assert!(!tree.find_pattern(b"/other/*"));
        assert!(!tree.find_pattern(b""));
    }

    #[test]
    fn test_routes_group_by_pattern() {
        let mut tree = Node::root();
        add(&mut tree, Method::GET, "/a", "a");
        add(&mut tree, Method::POST, "/a", "a");
        add(&mut tree, Method::GET, "/b/{id}", "b");
        tree.insert_route(Method::ALL, "/stub", vec![], tagged("stub"))
            .unwrap()
            .endpoints
            .mark_stub(Method::ALL);

        let routes = tree.routes();
        let patterns: Vec<&str> = routes.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["/a", "/b/{id}"]);
        assert_eq!(
            routes[0].handlers.keys().collect::<Vec<_>>(),
            vec!["GET", "POST"]
        );
    }

    #[test]
    fn test_bad_pattern_is_rejected() {
        let mut tree = Node::root();
        let result = tree.insert_route(Method::GET, "/a/{id", vec![], tagged("x"));
        assert!(result.is_err());
    }
}
