//! Route pattern parsing
//!
//! Patterns follow the grammar `/literal/{name}/{name:regex}/*`. The parser
//! works on bytes so that the trie can split static prefixes at any byte
//! without caring about UTF-8 boundaries.

use regex::bytes::Regex;

use crate::error::{Result, RouterError};

/// Kind of a trie node, in matching priority order.
///
/// The discriminant doubles as the index of the node's child bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeType {
    /// Literal text, e.g. `/home`
    Static = 0,
    /// Named parameter, e.g. `{category}`
    Param = 1,
    /// Regex constrained parameter, e.g. `{id:[0-9]+}`
    Regexp = 2,
    /// Trailing wildcard `*`
    CatchAll = 3,
}

impl NodeType {
    /// All node types in matching order.
    pub const ORDERED: [NodeType; 4] = [
        NodeType::Static,
        NodeType::Param,
        NodeType::Regexp,
        NodeType::CatchAll,
    ];

    /// Child bucket index for this type.
    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Key recorded for a trailing wildcard capture.
pub const WILDCARD_KEY: &str = "*";

/// Description of the next segment of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub node_type: NodeType,
    /// Parameter key (`*` for catch-all, empty for static)
    pub key: String,
    /// Anchored regex source, only for `Regexp`
    pub regex: String,
    /// Delimiter byte that ends the capture, 0 when there is none
    pub tail: u8,
    /// Index where the segment starts
    pub start: usize,
    /// Index just past the segment
    pub end: usize,
}

impl Segment {
    fn static_segment(len: usize) -> Self {
        Self {
            node_type: NodeType::Static,
            key: String::new(),
            regex: String::new(),
            tail: 0,
            start: 0,
            end: len,
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}

/// Returns the next param/regexp/wildcard segment of `pattern`, or a static
/// segment spanning the whole input when it has none.
pub(crate) fn next_segment(pattern: &[u8]) -> Result<Segment> {
    let ps = find_byte(pattern, b'{');
    let ws = find_byte(pattern, b'*');

    let (ps, ws) = match (ps, ws) {
        (None, None) => return Ok(Segment::static_segment(pattern.len())),
        (Some(ps), Some(ws)) if ws < ps => {
            return Err(RouterError::WildcardNotLast(lossy(pattern)));
        }
        (ps, ws) => (ps, ws),
    };

    if let Some(ps) = ps {
        // Read to the matching '}', tracking nested braces of the regex
        let mut depth = 0usize;
        let mut pe = None;
        for (i, &c) in pattern[ps..].iter().enumerate() {
            match c {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        pe = Some(ps + i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let pe = pe.ok_or_else(|| RouterError::UnclosedParam(lossy(pattern)))?;

        let body = &pattern[ps + 1..pe];
        let end = pe + 1;
        let tail = pattern.get(end).copied().unwrap_or(b'/');

        let (node_type, key, regex) = match find_byte(body, b':') {
            Some(idx) => {
                let mut rex = lossy(&body[idx + 1..]);
                if !rex.is_empty() {
                    if !rex.starts_with('^') {
                        rex.insert(0, '^');
                    }
                    if !rex.ends_with('$') {
                        rex.push('$');
                    }
                }
                (NodeType::Regexp, lossy(&body[..idx]), rex)
            }
            None => (NodeType::Param, lossy(body), String::new()),
        };

        return Ok(Segment {
            node_type,
            key,
            regex,
            tail,
            start: ps,
            end,
        });
    }

    // Only a wildcard is left, and it has to be the finale
    let ws = ws.unwrap_or(0);
    if ws + 1 < pattern.len() {
        return Err(RouterError::WildcardNotLast(lossy(pattern)));
    }

    Ok(Segment {
        node_type: NodeType::CatchAll,
        key: WILDCARD_KEY.to_string(),
        regex: String::new(),
        tail: 0,
        start: ws,
        end: pattern.len(),
    })
}

/// Extracts the ordered list of parameter keys declared by `pattern`.
///
/// Fails on malformed segments and on keys that appear twice.
pub fn param_keys(pattern: &str) -> Result<Vec<String>> {
    let mut keys: Vec<String> = Vec::new();
    let mut rest = pattern.as_bytes();

    loop {
        let seg = next_segment(rest).map_err(|err| relabel(err, pattern))?;
        if seg.node_type == NodeType::Static {
            return Ok(keys);
        }

        if keys.contains(&seg.key) {
            return Err(RouterError::DuplicateParamKey {
                pattern: pattern.to_string(),
                key: seg.key,
            });
        }

        keys.push(seg.key);
        rest = &rest[seg.end..];
    }
}

/// Checks every segment of `pattern`, compiles its regexes and returns its
/// parameter keys.
pub(crate) fn validate(pattern: &str) -> Result<Vec<String>> {
    let keys = param_keys(pattern)?;

    let mut rest = pattern.as_bytes();
    loop {
        let seg = next_segment(rest)?;
        match seg.node_type {
            NodeType::Static => return Ok(keys),
            NodeType::Regexp => {
                compile_regex(&seg.regex)?;
            }
            _ => {}
        }
        rest = &rest[seg.end..];
    }
}

/// Compiles the anchored source of a regexp segment.
pub(crate) fn compile_regex(src: &str) -> Result<Regex> {
    Regex::new(src).map_err(|source| RouterError::InvalidRegex {
        regex: src.to_string(),
        source,
    })
}

// Parse errors are raised on a suffix of the pattern; report the whole thing.
fn relabel(err: RouterError, pattern: &str) -> RouterError {
    match err {
        RouterError::UnclosedParam(_) => RouterError::UnclosedParam(pattern.to_string()),
        RouterError::WildcardNotLast(_) => RouterError::WildcardNotLast(pattern.to_string()),
        other => other,
    }
}

/// Length of the shared byte prefix of two keys.
pub(crate) fn longest_prefix(k1: &[u8], k2: &[u8]) -> usize {
    k1.iter().zip(k2).take_while(|(a, b)| a == b).count()
}
