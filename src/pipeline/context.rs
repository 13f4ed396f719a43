//! Ambient request-scoped context: the "current domain" and "locale"
//! slots that reverse URL helpers read without explicit domain passing
//! (spec.md §4.3, §9 "Ambient request-scoped slots... explicit context").
//!
//! Each OS thread gets its own stack of active scopes, so concurrent
//! requests served on independent threads never observe each other's
//! domain/locale (spec.md §8 invariant 8). The pipeline runner is the sole
//! authority that pushes and pops a scope, and it does so with an RAII
//! guard so every exit path — normal return, middleware short-circuit, or
//! unwind through a panic — pops it.

use std::cell::RefCell;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<AmbientContext>> = const { RefCell::new(Vec::new()) };
}

#[derive(Clone, Default)]
struct AmbientContext {
    domain: Option<String>,
    locale: Option<String>,
}

/// A scoped acquisition of the ambient domain/locale slots. Dropping it
/// (normal return, early return, or unwind) restores the previous scope.
pub struct ContextGuard {
    _private: (),
}

impl ContextGuard {
    /// Push a new ambient scope for the duration of the current request.
    pub fn enter(domain: Option<String>, locale: Option<String>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(AmbientContext { domain, locale });
        });
        ContextGuard { _private: () }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// The ambient current-domain slot, if a pipeline is currently running on
/// this thread.
pub fn current_domain() -> Option<String> {
    CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|c| c.domain.clone()))
}

/// The ambient locale slot, if a pipeline is currently running on this
/// thread and the matched route was localized.
pub fn current_locale() -> Option<String> {
    CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|c| c.locale.clone()))
}

/// Scoped override of just the ambient domain, for `with_domain(domain) { ... }`
/// callers (spec.md §6 reverse helper surface) outside of an active
/// pipeline — e.g. background jobs that still want to build URLs.
pub fn with_domain<R>(domain: impl Into<String>, f: impl FnOnce() -> R) -> R {
    let _guard = ContextGuard::enter(Some(domain.into()), current_locale());
    f()
}
