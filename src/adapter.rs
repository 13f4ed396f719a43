//! The Adapter Contract (spec.md §4.7) and an in-memory reference adapter
//! (spec.md §2 row G): the seam between a concrete transport and the
//! transport-agnostic core (`Engine`, `run_pipeline`, `StaticAssets`,
//! `RedirectTable`). Grounded on the teacher's `proxy::handler::handle_request`
//! phase pipeline (route match -> filters -> upstream -> response), replacing
//! "upstream" with "static assets / pipeline runner".

use crate::engine::Engine;
use crate::pipeline::run_pipeline;
use crate::static_assets::StaticAssets;
use crate::value::{apply_method_override, HandlerResult, MatchOutcome, Request, Response};
use http::Method;
use std::panic::{self, AssertUnwindSafe};

/// What an adapter calls when the matcher misses and no static asset or
/// redirect applies. Configured once at construction.
pub type NotFoundHandler = Box<dyn Fn(&Request) -> Response + Send + Sync>;

/// What an adapter calls when the pipeline panics. Receives no route
/// context since a panic can occur before or during dispatch; always
/// falls back to a hard-coded 500 if this itself fails to produce a body.
pub type ErrorHandler = Box<dyn Fn(&Request) -> Response + Send + Sync>;

fn default_not_found(_request: &Request) -> Response {
    Response {
        status: 404,
        headers: [("content-type".to_string(), "text/plain".to_string())].into(),
        body: b"not found".to_vec(),
    }
}

fn default_error(_request: &Request) -> Response {
    Response {
        status: 500,
        headers: [("content-type".to_string(), "text/plain".to_string())].into(),
        body: b"internal error".to_vec(),
    }
}

/// Transport-agnostic request dispatch: redirects, then static assets,
/// then route matching, then the middleware/handler pipeline. Holds no
/// transport state of its own — `Engine` carries the swappable route
/// table, `StaticAssets` is re-derived from config on construction.
pub struct Adapter {
    engine: Engine,
    static_assets: Option<StaticAssets>,
    not_found: NotFoundHandler,
    on_error: ErrorHandler,
}

impl Adapter {
    pub fn new(engine: Engine) -> Self {
        let static_assets = StaticAssets::from_config(&engine.config());
        Self {
            engine,
            static_assets,
            not_found: Box::new(default_not_found),
            on_error: Box::new(default_error),
        }
    }

    pub fn with_not_found(mut self, handler: NotFoundHandler) -> Self {
        self.not_found = handler;
        self
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.on_error = handler;
        self
    }

    /// Dispatch one request end to end. Never panics across this boundary:
    /// a panicking handler or middleware is caught and converted to the
    /// configured error response, with a last-resort hard-coded 500 if
    /// even that handler panics.
    ///
    /// Order: redirects, then method-override, then route matching, then
    /// static assets — spec.md §4.5: "a defined route always wins over a
    /// static file at the same path — static serving is consulted only
    /// after the matcher misses."
    pub fn dispatch(&self, mut request: Request) -> Response {
        let table = self.engine.table();

        if let Some((target, status)) = table.redirects.lookup(&request.path) {
            return Response::redirect(target.to_string(), status);
        }

        apply_method_override(&mut request, &self.engine.config());

        let outcome = self.engine.match_route(&request.host, &request.method, &request.path);

        if matches!(outcome, MatchOutcome::Miss) && request.method == Method::GET {
            if let Some(assets) = &self.static_assets {
                if let Some((body, mime)) = assets.serve(&request.path) {
                    return Response {
                        status: 200,
                        headers: [("content-type".to_string(), mime)].into(),
                        body,
                    };
                }
            }
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| match outcome {
            MatchOutcome::Matched(route_match) => {
                populate_locale_fields(&mut request, &table, &route_match);
                let mut response = Response::new();
                run_pipeline(&route_match, &mut request, &mut response)
            }
            MatchOutcome::Redirect { location, status } => Response::redirect(location, status),
            MatchOutcome::Miss => (self.not_found)(&request),
        }));

        match result {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(message, "panic while dispatching request");
                let fallback = panic::catch_unwind(AssertUnwindSafe(|| (self.on_error)(&request)));
                fallback.unwrap_or_else(|_| default_error(&request))
            }
        }
    }
}

/// Populate the Request fields a matched route exposes for localized /
/// wildcard-subdomain routing (spec.md §3): `locale`, `subdomain`,
/// `available_locales`, `default_locale`. Drawn from the matched route
/// plus the domain-level config carried in the compiled table, since
/// the route match alone doesn't know a domain's full locale set.
fn populate_locale_fields(request: &mut Request, table: &crate::engine::CompiledTable, route_match: &crate::value::RouteMatch) {
    request.locale = route_match.locale.clone();
    request.subdomain = route_match.subdomain.clone();
    request.default_locale = table.domain_default_locales.get(&route_match.domain).cloned();
    request.available_locales = table
        .domain_locales
        .get(&route_match.domain)
        .cloned()
        .unwrap_or_default();
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Convenience `HandlerResult` for a JSON 404 body, usable as a custom
/// `not_found` handler body builder.
pub fn json_not_found(message: &str) -> HandlerResult {
    HandlerResult::Triple {
        status: 404,
        headers: [("content-type".to_string(), "application/json".to_string())].into(),
        body: serde_json::json!({ "error": message }).to_string().into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::middleware::MiddlewareRegistry;
    use crate::value::Handler;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn hello_handler() -> Handler {
        Arc::new(|_req, _params| HandlerResult::Text("hello".into()))
    }

    fn build_engine() -> Engine {
        let engine = Engine::empty(RouterConfig::default());
        let mut handlers: HashMap<String, Handler> = HashMap::new();
        handlers.insert("hello".to_string(), hello_handler());
        let middleware_registry: MiddlewareRegistry = HashMap::new();
        let inputs = crate::engine::inputs(&handlers, &middleware_registry);

        let spec = json!({
            "example.com": {
                "home": { "to": "hello", "as": "home" }
            }
        })
        .as_object()
        .unwrap()
        .clone();

        engine.compile(&spec, &inputs).unwrap();
        engine
    }

    #[test]
    fn matched_route_runs_handler() {
        let engine = build_engine();
        let adapter = Adapter::new(engine);
        let request = Request::new(Method::GET, "example.com", "/home");
        let response = adapter.dispatch(request);
        assert_eq!(response.body, b"hello".to_vec());
    }

    #[test]
    fn miss_falls_back_to_not_found_handler() {
        let engine = build_engine();
        let adapter = Adapter::new(engine);
        let request = Request::new(Method::GET, "example.com", "/does-not-exist");
        let response = adapter.dispatch(request);
        assert_eq!(response.status, 404);
    }

    #[test]
    fn panicking_handler_is_caught_and_converted() {
        let engine = Engine::empty(RouterConfig::default());
        let mut handlers: HashMap<String, Handler> = HashMap::new();
        handlers.insert(
            "boom".to_string(),
            Arc::new(|_req, _params| panic!("boom")) as Handler,
        );
        let middleware_registry: MiddlewareRegistry = HashMap::new();
        let inputs = crate::engine::inputs(&handlers, &middleware_registry);
        let spec = json!({
            "example.com": {
                "boom": { "to": "boom", "as": "boom" }
            }
        })
        .as_object()
        .unwrap()
        .clone();
        engine.compile(&spec, &inputs).unwrap();

        let adapter = Adapter::new(engine);
        let request = Request::new(Method::GET, "example.com", "/boom");
        let response = adapter.dispatch(request);
        assert_eq!(response.status, 500);
    }

    fn temp_static_root() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("waypoint-adapter-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("home"), b"static file").unwrap();
        dir
    }

    #[test]
    fn matched_route_wins_over_static_file_at_same_path() {
        let dir = temp_static_root();
        let mut config = RouterConfig::default();
        config.serve_static = true;
        config.static_root = Some(dir.to_string_lossy().into_owned());

        let engine = Engine::empty(config);
        let mut handlers: HashMap<String, Handler> = HashMap::new();
        handlers.insert("hello".to_string(), hello_handler());
        let middleware_registry: MiddlewareRegistry = HashMap::new();
        let inputs = crate::engine::inputs(&handlers, &middleware_registry);
        let spec = json!({
            "example.com": { "home": { "to": "hello", "as": "home" } }
        })
        .as_object()
        .unwrap()
        .clone();
        engine.compile(&spec, &inputs).unwrap();

        let adapter = Adapter::new(engine);
        let response = adapter.dispatch(Request::new(Method::GET, "example.com", "/home"));
        assert_eq!(response.body, b"hello".to_vec());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn static_file_serves_only_on_matcher_miss() {
        let dir = temp_static_root();
        let mut config = RouterConfig::default();
        config.serve_static = true;
        config.static_root = Some(dir.to_string_lossy().into_owned());

        let engine = Engine::empty(config);
        let adapter = Adapter::new(engine);
        let response = adapter.dispatch(Request::new(Method::GET, "example.com", "/home"));
        assert_eq!(response.body, b"static file".to_vec());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn method_override_is_applied_before_matching() {
        let mut config = RouterConfig::default();
        config.method_override = true;

        let engine = Engine::empty(config);
        let mut handlers: HashMap<String, Handler> = HashMap::new();
        handlers.insert("hello".to_string(), hello_handler());
        let middleware_registry: MiddlewareRegistry = HashMap::new();
        let inputs = crate::engine::inputs(&handlers, &middleware_registry);
        let spec = json!({
            "example.com": { "widgets": { "delete": { "to": "hello", "as": "delete_widget" } } }
        })
        .as_object()
        .unwrap()
        .clone();
        engine.compile(&spec, &inputs).unwrap();

        let adapter = Adapter::new(engine);
        let request = Request::new(Method::POST, "example.com", "/widgets?_method=DELETE");
        let response = adapter.dispatch(request);
        assert_eq!(response.body, b"hello".to_vec());
    }

    #[test]
    fn matched_route_exposes_locale_and_subdomain_on_request() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc as StdArc;

        let saw_locale = StdArc::new(AtomicBool::new(false));
        let saw_locale_clone = saw_locale.clone();
        let saw_subdomain = StdArc::new(AtomicBool::new(false));
        let saw_subdomain_clone = saw_subdomain.clone();

        let engine = Engine::empty(RouterConfig::default());
        let mut handlers: HashMap<String, Handler> = HashMap::new();
        handlers.insert(
            "home".to_string(),
            Arc::new(move |req: &Request, _params: &HashMap<String, String>| {
                if req.locale.as_deref() == Some("en") {
                    saw_locale_clone.store(true, Ordering::SeqCst);
                }
                if req.subdomain.as_deref() == Some("tenant1") {
                    saw_subdomain_clone.store(true, Ordering::SeqCst);
                }
                HandlerResult::Text("ok".into())
            }) as Handler,
        );
        let middleware_registry: MiddlewareRegistry = HashMap::new();
        let inputs = crate::engine::inputs(&handlers, &middleware_registry);
        let spec = json!({
            "*.example.com": {
                "locales": ["en", "fr"],
                "default_locale": "en",
                "home": {
                    "to": "home",
                    "as": "home",
                    "localized": { "en": "/home", "fr": "/accueil" }
                }
            }
        })
        .as_object()
        .unwrap()
        .clone();
        engine.compile(&spec, &inputs).unwrap();

        let adapter = Adapter::new(engine);
        let request = Request::new(Method::GET, "tenant1.example.com", "/en/home");
        let response = adapter.dispatch(request);
        assert_eq!(response.body, b"ok".to_vec());
        assert!(saw_locale.load(Ordering::SeqCst));
        assert!(saw_subdomain.load(Ordering::SeqCst));
    }

    #[test]
    fn root_locale_redirect_short_circuits_before_matching() {
        let engine = Engine::empty(RouterConfig::default());
        let handlers: HashMap<String, Handler> = HashMap::new();
        let middleware_registry: MiddlewareRegistry = HashMap::new();
        let inputs = crate::engine::inputs(&handlers, &middleware_registry);
        let spec = json!({
            "example.com": {
                "locales": ["en"],
                "default_locale": "en",
                "root_locale_redirect": true
            }
        })
        .as_object()
        .unwrap()
        .clone();
        engine.compile(&spec, &inputs).unwrap();

        let adapter = Adapter::new(engine);
        let request = Request::new(Method::GET, "example.com", "/");
        let response = adapter.dispatch(request);
        assert_eq!(response.status, 302);
        assert_eq!(response.headers.get("location").map(String::as_str), Some("/en/"));
    }
}
