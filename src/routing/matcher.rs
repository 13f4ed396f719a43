//! The Matcher (component D, spec.md §4.2): given `(domain, method, path)`,
//! normalize, traverse the domain's trie, apply constraints, and select by
//! method. Pure — never fails, never does I/O.

use crate::config::{RouterConfig, TrailingSlashPolicy};
use crate::pipeline::Middleware;
use crate::routing::segment::{normalize_request_path, split_path};
use crate::routing::trie::{DomainTable, TrieNode};
use crate::value::{MatchOutcome, RouteMatch};
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolve a request's domain key against the compiled `DomainTable`,
/// per spec.md §4.2 "Domain resolution order".
pub fn resolve_domain<'a>(table: &'a DomainTable, host: &str) -> Option<(&'a TrieNode, String, Option<String>)> {
    let host = host.to_lowercase();

    if let Some(node) = table.exact_domains.get(&host) {
        return Some((node, host.clone(), None));
    }

    for (suffix, node) in &table.wildcard_subdomain_patterns {
        let pattern_suffix = format!(".{suffix}");
        if host.ends_with(&pattern_suffix) {
            let subdomain = host[..host.len() - pattern_suffix.len()].to_string();
            return Some((node, format!("*.{suffix}"), Some(subdomain)));
        }
    }

    table
        .wildcard_domain
        .as_ref()
        .map(|node| (node, "*".to_string(), None))
}

/// Traverse segments starting at `root`, applying the literal > param >
/// wildcard priority tie-break at every node (spec.md §4.2, §9).
fn traverse<'a>(
    root: &'a TrieNode,
    segments: &[&str],
) -> Option<(&'a TrieNode, HashMap<String, String>)> {
    let mut node = root;
    let mut captured = HashMap::new();

    let mut i = 0;
    while i < segments.len() {
        let seg = segments[i];
        if let Some(child) = node.literal_children.get(seg) {
            node = child;
            i += 1;
            continue;
        }
        if let Some((name, child)) = &node.param_child {
            captured.insert(name.clone(), seg.to_string());
            node = child;
            i += 1;
            continue;
        }
        if let Some((name, child)) = &node.wildcard_child {
            let tail = segments[i..].join("/");
            if let Some(name) = name {
                captured.insert(name.clone(), tail);
            }
            return Some((child, captured));
        }
        return None;
    }

    Some((node, captured))
}

/// Run the full match: domain resolution, request-time path normalization
/// (including the trailing-slash policy), trie traversal, method dispatch,
/// and constraint validation.
pub fn match_route(
    table: &DomainTable,
    config: &RouterConfig,
    host: &str,
    method: &Method,
    raw_path: &str,
) -> MatchOutcome {
    let (root, domain_key, subdomain) = match resolve_domain(table, host) {
        Some(found) => found,
        None => return MatchOutcome::Miss,
    };

    let decoded = normalize_request_path(raw_path);

    let path = match config.trailing_slash {
        TrailingSlashPolicy::Redirect if decoded.len() > 1 && decoded.ends_with('/') => {
            let target = decoded.trim_end_matches('/').to_string();
            let target = if target.is_empty() { "/".to_string() } else { target };
            return MatchOutcome::Redirect {
                location: target,
                status: config.trailing_slash_status,
            };
        }
        TrailingSlashPolicy::Ignore if decoded.len() > 1 && decoded.ends_with('/') => {
            decoded.trim_end_matches('/').to_string()
        }
        _ => decoded,
    };

    let segments = split_path(&path);

    let (leaf, params) = match traverse(root, &segments) {
        Some(found) => found,
        None => return MatchOutcome::Miss,
    };

    let route = match leaf.handlers.get(method) {
        Some(route) => route.clone(),
        None => return MatchOutcome::Miss,
    };

    for (param, regex) in &route.constraints {
        let Some(value) = params.get(param) else {
            continue;
        };
        if !regex.is_match(value) {
            return MatchOutcome::Miss;
        }
    }

    let middleware: Vec<Arc<dyn Middleware>> = route.middleware.clone();

    MatchOutcome::Matched(RouteMatch {
        name: route.name.clone(),
        locale: route.locale.clone(),
        domain: domain_key,
        subdomain,
        params,
        middleware,
        route,
    })
}
