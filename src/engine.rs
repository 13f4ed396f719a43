//! The compiled router as a single atomically-swappable unit (spec.md §5
//! "Atomic, all-or-nothing installation"), grounded on the teacher's
//! `server::state::RoutingState` — an `ArcSwap<T>` so readers never block
//! on a recompile and a torn half-installed table is never observable.

use crate::config::RouterConfig;
use crate::error::CompileError;
use crate::names::NameIndex;
use crate::redirects::RedirectTable;
use crate::reverse::ReverseGenerator;
use crate::routing::trie::DomainTable;
use crate::routing::matcher::{match_route, resolve_domain};
use crate::routing::segment::normalize_request_path;
use crate::spec::compiler::{self, CompilerInputs};
use crate::spec::RouteSpec;
use crate::value::{Handler, MatchOutcome};
use arc_swap::ArcSwap;
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything produced by one successful `compile()` call, installed as a
/// unit. Never constructed piecemeal outside of `compiler::compile`.
pub struct CompiledTable {
    pub domains: DomainTable,
    pub names: NameIndex,
    pub redirects: RedirectTable,
    pub domain_default_locales: HashMap<String, String>,
    pub domain_root_locale_redirect: HashMap<String, bool>,
    pub domain_locales: HashMap<String, Vec<String>>,
    pub route_count: usize,
}

impl CompiledTable {
    fn empty() -> Self {
        Self {
            domains: DomainTable::default(),
            names: NameIndex::new(),
            redirects: RedirectTable::default(),
            domain_default_locales: HashMap::new(),
            domain_root_locale_redirect: HashMap::new(),
            domain_locales: HashMap::new(),
            route_count: 0,
        }
    }
}

/// The live, swappable router state: a compiled table plus its config.
/// Cloning an `Engine` is cheap — it's just two `Arc`s — so adapters can
/// hold their own handle without sharing a lock.
#[derive(Clone)]
pub struct Engine {
    table: Arc<ArcSwap<CompiledTable>>,
    config: Arc<ArcSwap<RouterConfig>>,
}

impl Engine {
    /// An engine with no routes and a default config, ready to have
    /// `compile` called on it once handlers/middleware are registered.
    pub fn empty(config: RouterConfig) -> Self {
        Self {
            table: Arc::new(ArcSwap::from_pointee(CompiledTable::empty())),
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Compile `spec` against `inputs` and, on success, atomically install
    /// the result. On failure the currently installed table is left
    /// completely untouched (spec.md §5 invariant).
    pub fn compile(&self, spec: &RouteSpec, inputs: &CompilerInputs) -> Result<(), CompileError> {
        let output = compiler::compile(spec, inputs)?;
        let table = CompiledTable {
            domains: output.table,
            names: output.names,
            redirects: output.redirects,
            domain_default_locales: output.domain_default_locales,
            domain_root_locale_redirect: output.domain_root_locale_redirect,
            domain_locales: output.domain_locales,
            route_count: output.route_count,
        };
        let route_count = table.route_count;
        self.table.store(Arc::new(table));
        tracing::info!(route_count, "installed compiled route table");
        Ok(())
    }

    /// Swap in an already-compiled table directly, bypassing `compile()`.
    /// Used by controlled-maintenance reloads that recompile off the hot
    /// path (e.g. in a background task) and only need to publish the
    /// result here.
    pub fn install(&self, table: CompiledTable) {
        let route_count = table.route_count;
        self.table.store(Arc::new(table));
        tracing::info!(route_count, "installed compiled route table");
    }

    pub fn replace_config(&self, config: RouterConfig) {
        self.config.store(Arc::new(config));
    }

    pub fn config(&self) -> Arc<RouterConfig> {
        self.config.load_full()
    }

    pub fn table(&self) -> Arc<CompiledTable> {
        self.table.load_full()
    }

    /// Match `(host, method, path)` against the currently installed table.
    /// This is the hot path: one atomic load, no locks.
    ///
    /// Root-locale redirect (spec.md §3/§6) is checked first: when a
    /// domain enables it, a request to `/` redirects to `/<default_locale>/`
    /// before the matcher ever runs, since no compiled route for `/` need
    /// exist on such a domain.
    pub fn match_route(&self, host: &str, method: &Method, path: &str) -> MatchOutcome {
        let table = self.table.load();
        let config = self.config.load();

        if let Some(redirect) = root_locale_redirect(&table, host, path) {
            return redirect;
        }

        match_route(&table.domains, &config, host, method, path)
    }

    /// Build a `ReverseGenerator` snapshotting the currently installed
    /// name index. Cheap to call per-request: `NameIndex` is plain data
    /// cloned out of the `Arc`-shared table, not re-derived from the spec.
    pub fn reverse_generator(&self) -> ReverseGenerator {
        let table = self.table.load();
        ReverseGenerator::new(
            table.names.clone(),
            table.domain_default_locales.clone(),
            self.config().default_domain.clone(),
        )
    }
}

/// If `host` resolves to a domain with `root_locale_redirect` enabled and
/// `path` normalizes to `/`, produce the 302 redirect to `/<default_locale>/`
/// mandated by spec.md §6. Returns `None` when the redirect doesn't apply,
/// leaving the caller to fall through to the ordinary matcher.
fn root_locale_redirect(table: &CompiledTable, host: &str, raw_path: &str) -> Option<MatchOutcome> {
    let (_, domain_key, _) = resolve_domain(&table.domains, host)?;

    if !*table.domain_root_locale_redirect.get(&domain_key).unwrap_or(&false) {
        return None;
    }

    if normalize_request_path(raw_path) != "/" {
        return None;
    }

    let locale = table.domain_default_locales.get(&domain_key)?;
    Some(MatchOutcome::Redirect {
        location: format!("/{locale}/"),
        status: 302,
    })
}

/// Convenience constructor bundling `handlers`/`middleware_registry` the
/// way `bin/demo.rs` and tests wire them up.
pub fn inputs<'a>(
    handlers: &'a HashMap<String, Handler>,
    middleware_registry: &'a HashMap<String, Vec<Arc<dyn crate::pipeline::Middleware>>>,
) -> CompilerInputs<'a> {
    CompilerInputs {
        handlers,
        middleware_registry,
    }
}
