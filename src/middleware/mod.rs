//! Built-in middleware implementations and the symbol registry the
//! compiler resolves `use:` names against (spec.md §4.1 "Middleware
//! resolution").
//!
//! A symbolic name maps to one *or more* concrete plugin references —
//! "multi-class plugins expand to several entries in order" — hence
//! `Vec<Arc<dyn Middleware>>` per name rather than a single entry.

pub mod rate_limit;

use crate::pipeline::Middleware;
use std::collections::HashMap;
use std::sync::Arc;

pub type MiddlewareRegistry = HashMap<String, Vec<Arc<dyn Middleware>>>;

/// Register one middleware under a symbolic name the spec can reference
/// via `use: ["name"]`.
pub fn register(registry: &mut MiddlewareRegistry, name: impl Into<String>, middleware: Arc<dyn Middleware>) {
    registry.entry(name.into()).or_default().push(middleware);
}

/// Register several middleware under one symbolic name — the "multi-class
/// plugin" case from spec.md §4.1.
pub fn register_group(registry: &mut MiddlewareRegistry, name: impl Into<String>, middleware: Vec<Arc<dyn Middleware>>) {
    registry.entry(name.into()).or_default().extend(middleware);
}
