//! The pipeline runner (component E, spec.md §4.3): executes a matched
//! route's middleware chain followed by its handler, with short-circuit
//! semantics and guaranteed ambient-context cleanup on every exit path.

pub mod context;

use crate::value::{HandlerResult, Request, Response, RouteIdentifier, RouteMatch};
use context::ContextGuard;
use std::fmt;

/// What a middleware returns after inspecting (and possibly mutating) the
/// request/response: either let the chain continue, or halt it and supply
/// the final result.
pub enum MiddlewareOutcome {
    Continue,
    Halt(HandlerResult),
}

/// A middleware is a callable `call(request, response) -> Continue | Halt`.
/// Implementations may freely mutate `response` and attach request-scoped
/// data to `request.extensions`.
pub trait Middleware: Send + Sync {
    fn call(&self, request: &mut Request, response: &mut Response) -> MiddlewareOutcome;

    /// A human-readable name, used only for diagnostics (admin introspection,
    /// logging) — not for identity comparisons. Deduplication is by `Arc`
    /// pointer identity (see `dedup_middleware`), not by this name.
    fn name(&self) -> &str {
        "middleware"
    }
}

impl fmt::Debug for dyn Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Middleware({})", self.name())
    }
}

/// Run a matched route's middleware chain then its handler.
///
/// This is the sole authority over the ambient domain/locale slots: it
/// establishes them before the first middleware runs and they are
/// released — via `ContextGuard`'s `Drop` — no matter how this function
/// returns, including through a panic unwinding past it.
pub fn run_pipeline(route_match: &RouteMatch, request: &mut Request, response: &mut Response) -> Response {
    let _scope = ContextGuard::enter(Some(route_match.domain.clone()), route_match.locale.clone());

    let route_id = route_match
        .name
        .clone()
        .unwrap_or_else(|| route_match.route.path_template.clone());
    request.extensions.insert(RouteIdentifier(route_id));

    for mw in &route_match.middleware {
        match mw.call(request, response) {
            MiddlewareOutcome::Continue => continue,
            MiddlewareOutcome::Halt(result) => return result.into_response(),
        }
    }

    let handler_result = (route_match.route.handler)(request, &route_match.params);
    handler_result.into_response()
}

/// Deduplicate a middleware list by `Arc` pointer identity, preserving
/// first-occurrence order (spec.md §3 invariants, §8 invariant 4).
pub fn dedup_middleware(
    list: &mut Vec<std::sync::Arc<dyn Middleware>>,
) {
    let mut seen: Vec<*const ()> = Vec::with_capacity(list.len());
    list.retain(|mw| {
        let ptr = std::sync::Arc::as_ptr(mw) as *const ();
        if seen.contains(&ptr) {
            false
        } else {
            seen.push(ptr);
            true
        }
    });
}
