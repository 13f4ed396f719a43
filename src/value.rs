//! The value types that flow across the Matcher / Pipeline Runner boundary:
//! `Request`, `Response`, and the matcher's output `RouteMatch` / `MatchOutcome`.
//!
//! These are deliberately plain data — no behavior beyond small constructors
//! and conversions. Adapters (`crate::adapter`) are responsible for
//! translating to and from their transport's native request/response types.

use crate::config::RouterConfig;
use crate::routing::trie::CompiledRoute;
use crate::pipeline::Middleware;
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;

/// An immutable-with-respect-to-wire-fields request value.
///
/// `params` holds the parsed query string map (not the captured route
/// params — those are passed to the handler as a separate argument, per
/// the Handler contract). `extensions` is the opaque, plugin-populated
/// slot bag mentioned in the design notes: middleware attach arbitrary
/// typed data here instead of the core knowing about it.
pub struct Request {
    pub method: Method,
    pub path: String,
    pub host: String,
    pub query: String,
    pub params: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub client_ip: Option<std::net::IpAddr>,

    pub locale: Option<String>,
    pub available_locales: Vec<String>,
    pub default_locale: Option<String>,
    pub subdomain: Option<String>,

    pub extensions: http::Extensions,
}

impl Request {
    pub fn new(method: Method, host: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (path, String::new()),
        };
        let params = parse_query(&query);
        Self {
            method,
            path,
            host: host.into(),
            query,
            params,
            headers: HashMap::new(),
            body: Vec::new(),
            client_ip: None,
            locale: None,
            available_locales: Vec::new(),
            default_locale: None,
            subdomain: None,
            extensions: http::Extensions::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if query.is_empty() {
        return out;
    }
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        let decode = |s: &str| {
            percent_encoding::percent_decode_str(s)
                .decode_utf8_lossy()
                .into_owned()
        };
        out.insert(decode(k), decode(v));
    }
    out
}

/// Methods a `_method` override may rewrite a `POST` into (spec.md §4.6:
/// "restricted to a safe subset"). `POST` itself is excluded since that's
/// already the unoverridden method, and `GET`/`HEAD`/`OPTIONS` are excluded
/// since a body-bearing request overriding into one of those is almost
/// always a mistake rather than an intentional override.
const OVERRIDABLE_METHODS: &[&str] = &["PUT", "PATCH", "DELETE"];

/// Apply the method-override config rule (spec.md §4.6, §9): when enabled,
/// a `_method` value in the query string or an `application/x-www-form-urlencoded`
/// body rewrites `request.method`, restricted to `OVERRIDABLE_METHODS`.
/// Takes effect before matching — callers (adapters) must call this before
/// `Engine::match_route`.
pub fn apply_method_override(request: &mut Request, config: &RouterConfig) {
    if !config.method_override || request.method != Method::POST {
        return;
    }

    let candidate = request
        .params
        .get("_method")
        .cloned()
        .or_else(|| form_body_method(&request.body, request.header("content-type")));

    let Some(candidate) = candidate else {
        return;
    };

    let upper = candidate.to_ascii_uppercase();
    if !OVERRIDABLE_METHODS.contains(&upper.as_str()) {
        return;
    }
    if let Ok(method) = Method::from_bytes(upper.as_bytes()) {
        request.method = method;
    }
}

fn form_body_method(body: &[u8], content_type: Option<&str>) -> Option<String> {
    let content_type = content_type?;
    if !content_type.starts_with("application/x-www-form-urlencoded") {
        return None;
    }
    let text = std::str::from_utf8(body).ok()?;
    for pair in text.split('&') {
        let Some((k, v)) = pair.split_once('=') else {
            continue;
        };
        if k == "_method" {
            return Some(percent_encoding::percent_decode_str(v).decode_utf8_lossy().into_owned());
        }
    }
    None
}

/// A mutable response value built up by middleware and the handler.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        Self {
            status: 200,
            headers,
            body: Vec::new(),
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect(location: impl Into<String>, status: u16) -> Self {
        let mut headers = HashMap::new();
        headers.insert("location".to_string(), location.into());
        Self {
            status,
            headers,
            body: Vec::new(),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());
        Self {
            status: 200,
            headers,
            body: body.into().into_bytes(),
        }
    }

    pub fn json(value: &serde_json::Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status: 200,
            headers,
            body: serde_json::to_vec(value).unwrap_or_default(),
        }
    }
}

/// The outcome of a handler invocation, normalized by the pipeline runner
/// per the Handler contract in spec.md §4.3.
pub enum HandlerResult {
    Response(Response),
    Json(serde_json::Value),
    Text(String),
    Triple {
        status: u16,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    },
}

impl HandlerResult {
    pub fn into_response(self) -> Response {
        match self {
            HandlerResult::Response(r) => r,
            HandlerResult::Json(v) => Response::json(&v),
            HandlerResult::Text(s) => Response::text(s),
            HandlerResult::Triple {
                status,
                headers,
                body,
            } => Response {
                status,
                headers,
                body,
            },
        }
    }
}

/// Opaque callable reference: `call(request, params) -> HandlerResult`.
/// Resolved once at compile time (spec.md §9: "Method-name dispatch
/// strings... are resolved once at compile time into a concrete reference").
pub type Handler =
    Arc<dyn Fn(&Request, &HashMap<String, String>) -> HandlerResult + Send + Sync>;

/// The matcher's successful output (component D / §3 RouteMatch).
pub struct RouteMatch {
    pub route: Arc<CompiledRoute>,
    pub params: HashMap<String, String>,
    pub name: Option<String>,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub locale: Option<String>,
    pub domain: String,
    /// The captured prefix of a `*.suffix` wildcard-subdomain match, e.g.
    /// `tenant1` for host `tenant1.example.com` against domain pattern
    /// `*.example.com` (spec.md §3: Request exposes `subdomain`).
    pub subdomain: Option<String>,
}

/// The matcher's full output space: a match, a miss, or a pseudo-match
/// carrying redirect intent (trailing-slash policy `:redirect`, spec.md §4.2).
pub enum MatchOutcome {
    Matched(RouteMatch),
    Redirect { location: String, status: u16 },
    Miss,
}

/// Stashed into `Request::extensions` by the pipeline runner before the
/// middleware chain runs, so middleware (e.g. a rate limiter keyed by
/// route) can identify the matched route without the core handing out a
/// stringly-typed API for it.
#[derive(Clone)]
pub struct RouteIdentifier(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_override() -> RouterConfig {
        RouterConfig {
            method_override: true,
            ..RouterConfig::default()
        }
    }

    #[test]
    fn query_string_override_rewrites_method() {
        let mut request = Request::new(Method::POST, "example.com", "/widgets/1?_method=DELETE");
        apply_method_override(&mut request, &config_with_override());
        assert_eq!(request.method, Method::DELETE);
    }

    #[test]
    fn form_body_override_rewrites_method() {
        let mut request = Request::new(Method::POST, "example.com", "/widgets/1");
        request.headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        request.body = b"name=widget&_method=put".to_vec();
        apply_method_override(&mut request, &config_with_override());
        assert_eq!(request.method, Method::PUT);
    }

    #[test]
    fn disallowed_override_target_is_ignored() {
        let mut request = Request::new(Method::POST, "example.com", "/widgets/1?_method=TRACE");
        apply_method_override(&mut request, &config_with_override());
        assert_eq!(request.method, Method::POST);
    }

    #[test]
    fn override_disabled_in_config_is_ignored() {
        let mut request = Request::new(Method::POST, "example.com", "/widgets/1?_method=DELETE");
        apply_method_override(&mut request, &RouterConfig::default());
        assert_eq!(request.method, Method::POST);
    }

    #[test]
    fn override_only_applies_to_post() {
        let mut request = Request::new(Method::GET, "example.com", "/widgets/1?_method=DELETE");
        apply_method_override(&mut request, &config_with_override());
        assert_eq!(request.method, Method::GET);
    }
}
