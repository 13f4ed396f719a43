//! The per-domain trie (component B) and the compiled route record it
//! indexes (spec.md §3 CompiledRoute / TrieNode, §4.1 Trie Builder).

use crate::pipeline::Middleware;
use crate::routing::segment::Segment;
use crate::value::Handler;
use http::Method;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An immutable compiled route. One exists per `(domain, method, path,
/// locale)` tuple produced by the compiler.
pub struct CompiledRoute {
    pub domain: String,
    pub method: Method,
    pub path_template: String,
    pub segments: Vec<Segment>,
    pub handler: Handler,
    pub name: Option<String>,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub constraints: HashMap<String, Regex>,
    pub locale: Option<String>,
    pub param_names: Vec<String>,
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("domain", &self.domain)
            .field("method", &self.method)
            .field("path_template", &self.path_template)
            .field("name", &self.name)
            .field("locale", &self.locale)
            .finish()
    }
}

/// A single node of a domain's trie. Three distinct child slots — literal
/// map, single param child, single wildcard child — rather than a
/// homogeneous child list, per spec.md §9: this makes the literal >
/// param > wildcard tie-break O(1) with no scoring or sorting.
#[derive(Default)]
pub struct TrieNode {
    pub literal_children: HashMap<String, TrieNode>,
    pub param_child: Option<(String, Box<TrieNode>)>,
    /// A wildcard node is always terminal — it owns its own `handlers` map
    /// and traversal never descends past it.
    pub wildcard_child: Option<(Option<String>, Box<TrieNode>)>,
    pub handlers: HashMap<Method, Arc<CompiledRoute>>,
}

impl TrieNode {
    pub fn is_terminal(&self) -> bool {
        !self.handlers.is_empty()
    }

    /// Insert a compiled route, descending/creating nodes for its segments
    /// and attaching it at the leaf under its method.
    pub fn insert(&mut self, route: Arc<CompiledRoute>) {
        self.insert_at(&route.segments, route);
    }

    fn insert_at(&mut self, segments: &[Segment], route: Arc<CompiledRoute>) {
        match segments.first() {
            None => {
                self.handlers.insert(route.method.clone(), route);
            }
            Some(Segment::Literal(text)) => {
                let child = self.literal_children.entry(text.clone()).or_default();
                child.insert_at(&segments[1..], route);
            }
            Some(Segment::Param(name)) => {
                let child = self
                    .param_child
                    .get_or_insert_with(|| (name.clone(), Box::new(TrieNode::default())));
                child.1.insert_at(&segments[1..], route);
            }
            Some(Segment::Wildcard(name)) => {
                let child = self
                    .wildcard_child
                    .get_or_insert_with(|| (name.clone(), Box::new(TrieNode::default())));
                // Wildcard is terminal: whatever segments follow in the
                // template (there should be none — the compiler rejects
                // segments after a wildcard) are ignored here.
                child.1.handlers.insert(route.method.clone(), route);
            }
        }
    }
}

/// Per-domain tries plus the two auxiliary lookup structures used for
/// domain resolution (spec.md §3 DomainTable, §4.2).
#[derive(Default)]
pub struct DomainTable {
    pub exact_domains: HashMap<String, TrieNode>,
    /// Ordered `(suffix, node)` pairs for `*.suffix` patterns, matched by
    /// `host.ends_with("." + suffix)` in declaration order.
    pub wildcard_subdomain_patterns: Vec<(String, TrieNode)>,
    pub wildcard_domain: Option<TrieNode>,
}

impl DomainTable {
    pub fn domain_root_mut(&mut self, domain: &str) -> &mut TrieNode {
        if domain == "*" {
            self.wildcard_domain.get_or_insert_with(TrieNode::default)
        } else if let Some(suffix) = domain.strip_prefix("*.") {
            if let Some(idx) = self
                .wildcard_subdomain_patterns
                .iter()
                .position(|(s, _)| s == suffix)
            {
                &mut self.wildcard_subdomain_patterns[idx].1
            } else {
                self.wildcard_subdomain_patterns
                    .push((suffix.to_string(), TrieNode::default()));
                &mut self.wildcard_subdomain_patterns.last_mut().unwrap().1
            }
        } else {
            self.exact_domains.entry(domain.to_string()).or_default()
        }
    }
}
