//! The Route Spec Parser / Compiler (component A, spec.md §4.1): a
//! depth-first walk over the `RouteSpec` tree that flattens it into a
//! `DomainTable`, a `NameIndex`, and a compiled redirect table.

use crate::error::CompileError;
use crate::names::NameIndex;
use crate::pipeline::{dedup_middleware, Middleware};
use crate::redirects::RedirectTable;
use crate::routing::segment::{parse_segments, Segment};
use crate::routing::trie::{CompiledRoute, DomainTable};
use crate::value::Handler;
use http::Method;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const DOMAIN_CONFIG_KEYS: &[&str] = &["locales", "default_locale", "root_locale_redirect"];
const METHOD_KEYS: &[(&str, Method)] = &[
    ("get", Method::GET),
    ("post", Method::POST),
    ("put", Method::PUT),
    ("patch", Method::PATCH),
    ("delete", Method::DELETE),
    ("options", Method::OPTIONS),
    ("head", Method::HEAD),
];
const MODIFIER_KEYS: &[&str] = &["use", "constraints"];

/// External references the compiler resolves symbolic names against.
/// Both maps are populated at boot and only ever read during compilation
/// (spec.md §5: "the plugin registry is... mutated at boot, read at
/// compile/match time").
pub struct CompilerInputs<'a> {
    pub handlers: &'a HashMap<String, Handler>,
    pub middleware_registry: &'a HashMap<String, Vec<Arc<dyn Middleware>>>,
}

pub struct CompileOutput {
    pub table: DomainTable,
    pub names: NameIndex,
    pub redirects: RedirectTable,
    pub domain_default_locales: HashMap<String, String>,
    pub domain_root_locale_redirect: HashMap<String, bool>,
    pub domain_locales: HashMap<String, Vec<String>>,
    pub route_count: usize,
}

struct Compiler<'a> {
    inputs: &'a CompilerInputs<'a>,
    table: DomainTable,
    names: NameIndex,
    redirects: RedirectTable,
    claimed_names: HashSet<String>,
    domain_default_locales: HashMap<String, String>,
    domain_root_locale_redirect: HashMap<String, bool>,
    domain_locales: HashMap<String, Vec<String>>,
    route_count: usize,
}

/// Compile a `RouteSpec` tree into a ready-to-serve immutable table.
/// Fails atomically: on any error, no partial state escapes this call.
pub fn compile(spec: &crate::spec::RouteSpec, inputs: &CompilerInputs) -> Result<CompileOutput, CompileError> {
    let mut compiler = Compiler {
        inputs,
        table: DomainTable::default(),
        names: NameIndex::new(),
        redirects: RedirectTable::default(),
        claimed_names: HashSet::new(),
        domain_default_locales: HashMap::new(),
        domain_root_locale_redirect: HashMap::new(),
        domain_locales: HashMap::new(),
        route_count: 0,
    };

    for (domain_key, node) in spec {
        compiler.compile_domain(domain_key, node)?;
    }

    Ok(CompileOutput {
        table: compiler.table,
        names: compiler.names,
        redirects: compiler.redirects,
        domain_default_locales: compiler.domain_default_locales,
        domain_root_locale_redirect: compiler.domain_root_locale_redirect,
        domain_locales: compiler.domain_locales,
        route_count: compiler.route_count,
    })
}

impl<'a> Compiler<'a> {
    fn compile_domain(&mut self, domain_key: &str, node: &Value) -> Result<(), CompileError> {
        let domain = domain_key.to_lowercase();
        let obj = as_object(node, "domain node")?;

        let locales: Vec<String> = match obj.get("locales") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            Some(_) => {
                return Err(CompileError::MalformedSpec {
                    detail: format!("domain {domain}: locales must be an array"),
                })
            }
            None => Vec::new(),
        };

        if let Some(default_locale) = obj.get("default_locale").and_then(|v| v.as_str()) {
            self.domain_default_locales
                .insert(domain.clone(), default_locale.to_string());
        }

        let root_redirect = obj
            .get("root_locale_redirect")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        self.domain_root_locale_redirect
            .insert(domain.clone(), root_redirect);
        self.domain_locales.insert(domain.clone(), locales.clone());

        // Guarantee a trie entry exists for every configured domain, even
        // one with no routes yet, so domain resolution (used to look up
        // `root_locale_redirect` etc.) doesn't depend on route presence.
        self.table.domain_root_mut(&domain);

        let base_middleware = self.resolve_use(obj, &[])?;

        self.walk(&domain, &locales, obj, Vec::new(), base_middleware)
    }

    /// The recursive DFS walk described in spec.md §4.1 steps 2-4.
    fn walk(
        &mut self,
        domain: &str,
        locales: &[String],
        node: &serde_json::Map<String, Value>,
        current_path: Vec<String>,
        inherited_middleware: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), CompileError> {
        // Node-level `use:` has already been folded into `inherited_middleware`
        // by the caller for the domain root; for deeper nodes we must apply
        // this node's own `use:` before recursing further or emitting routes.
        let node_middleware = self.resolve_use(node, &inherited_middleware)?;

        for (method_name, method) in METHOD_KEYS {
            if let Some(def) = node.get(*method_name) {
                self.compile_route_def(domain, locales, &current_path, method.clone(), def, &node_middleware)?;
            }
        }

        for (key, child) in node {
            if DOMAIN_CONFIG_KEYS.contains(&key.as_str())
                || MODIFIER_KEYS.contains(&key.as_str())
                || METHOD_KEYS.iter().any(|(m, _)| m == key)
            {
                continue;
            }
            let child_obj = as_object(child, &format!("path node {key}"))?;
            let mut next_path = current_path.clone();
            next_path.push(key.trim_start_matches('/').to_string());
            self.walk(domain, locales, child_obj, next_path, node_middleware.clone())?;
        }

        Ok(())
    }

    /// Apply a node's own `use:` key against an already-inherited list.
    /// `use: nil` clears; `use: [..]` resolves and appends, deduplicated;
    /// absent leaves the inherited list untouched.
    fn resolve_use(
        &self,
        node: &serde_json::Map<String, Value>,
        inherited: &[Arc<dyn Middleware>],
    ) -> Result<Vec<Arc<dyn Middleware>>, CompileError> {
        match node.get("use") {
            None => Ok(inherited.to_vec()),
            Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(names)) => {
                let mut list = inherited.to_vec();
                for entry in names {
                    let name = entry.as_str().ok_or_else(|| CompileError::MalformedSpec {
                        detail: "use: entries must be strings".to_string(),
                    })?;
                    let resolved = self
                        .inputs
                        .middleware_registry
                        .get(name)
                        .ok_or_else(|| CompileError::UnknownMiddleware {
                            name: name.to_string(),
                        })?;
                    list.extend(resolved.iter().cloned());
                }
                dedup_middleware(&mut list);
                Ok(list)
            }
            Some(_) => Err(CompileError::MalformedSpec {
                detail: "use: must be an array or null".to_string(),
            }),
        }
    }

    fn compile_route_def(
        &mut self,
        domain: &str,
        locales: &[String],
        current_path: &[String],
        method: Method,
        def: &Value,
        node_middleware: &[Arc<dyn Middleware>],
    ) -> Result<(), CompileError> {
        let obj = as_object(def, "route definition")?;

        let to = obj
            .get("to")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CompileError::MalformedSpec {
                detail: "route definition missing required `to`".to_string(),
            })?;
        let handler = self
            .inputs
            .handlers
            .get(to)
            .cloned()
            .ok_or_else(|| CompileError::MalformedSpec {
                detail: format!("unknown handler reference: {to}"),
            })?;

        let name = obj.get("as").and_then(|v| v.as_str()).map(|s| s.to_string());

        let route_middleware = self.resolve_use(obj, node_middleware)?;

        let constraints = match obj.get("constraints") {
            Some(Value::Object(map)) => {
                let mut compiled = HashMap::new();
                for (param, pattern) in map {
                    let pattern_str = pattern.as_str().ok_or_else(|| CompileError::MalformedSpec {
                        detail: format!("constraint for {param} must be a string pattern"),
                    })?;
                    let regex = Regex::new(pattern_str).map_err(|e| CompileError::InvalidConstraint {
                        param: param.clone(),
                        pattern: pattern_str.to_string(),
                        reason: e.to_string(),
                    })?;
                    compiled.insert(param.clone(), regex);
                }
                compiled
            }
            Some(_) => {
                return Err(CompileError::MalformedSpec {
                    detail: "constraints must be a mapping".to_string(),
                })
            }
            None => HashMap::new(),
        };

        if let Some(name) = &name {
            if !self.claimed_names.insert(name.clone()) {
                return Err(CompileError::DuplicateRouteName { name: name.clone() });
            }
        }

        let redirects_from: Vec<String> = match obj.get("redirects_from") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            _ => Vec::new(),
        };
        let redirect_status = obj
            .get("redirect_status")
            .and_then(|v| v.as_u64())
            .map(|n| n as u16)
            .unwrap_or(301);

        match obj.get("localized") {
            Some(Value::Object(map)) => {
                for (locale, template) in map {
                    if !locales.iter().any(|l| l == locale) {
                        return Err(CompileError::LocaleError {
                            domain: domain.to_string(),
                            locale: locale.clone(),
                        });
                    }
                }
                for declared in locales {
                    if !map.contains_key(declared) {
                        tracing::warn!(
                            "route compiler: domain {domain} locale {declared} has no localized template for {:?}",
                            name
                        );
                    }
                }

                let mut first_path = None;
                for (locale, template) in map {
                    let template_str = template.as_str().ok_or_else(|| CompileError::MalformedSpec {
                        detail: format!("localized template for {locale} must be a string"),
                    })?;
                    let path_template = format!("/{locale}/{}", template_str.trim_matches('/'));
                    let segments = parse_segments(&path_template);
                    validate_segments(&segments)?;
                    let param_names = param_names_of(&segments);

                    if first_path.is_none() {
                        first_path = Some(path_template.clone());
                    }

                    let route = Arc::new(CompiledRoute {
                        domain: domain.to_string(),
                        method: method.clone(),
                        path_template: path_template.clone(),
                        segments: segments.clone(),
                        handler: handler.clone(),
                        name: name.clone(),
                        middleware: route_middleware.clone(),
                        constraints: constraints.clone(),
                        locale: Some(locale.clone()),
                        param_names: param_names.clone(),
                    });
                    self.table.domain_root_mut(domain).insert(route);
                    self.route_count += 1;

                    if let Some(name) = &name {
                        self.names.insert_template(
                            name.clone(),
                            domain.to_string(),
                            Some(locale.clone()),
                            segments,
                            param_names,
                        );
                    }
                }

                for raw in &redirects_from {
                    if let Some(target) = &first_path {
                        self.redirects.insert(raw.clone(), target.clone(), redirect_status);
                    }
                }
            }
            Some(_) => {
                return Err(CompileError::MalformedSpec {
                    detail: "localized must be a mapping of locale to template".to_string(),
                })
            }
            None => {
                let path_template = if current_path.is_empty() {
                    "/".to_string()
                } else {
                    format!("/{}", current_path.join("/"))
                };
                let segments = parse_segments(&path_template);
                validate_segments(&segments)?;
                let param_names = param_names_of(&segments);

                let route = Arc::new(CompiledRoute {
                    domain: domain.to_string(),
                    method,
                    path_template: path_template.clone(),
                    segments: segments.clone(),
                    handler,
                    name: name.clone(),
                    middleware: route_middleware,
                    constraints,
                    locale: None,
                    param_names: param_names.clone(),
                });
                self.table.domain_root_mut(domain).insert(route);
                self.route_count += 1;

                if let Some(name) = &name {
                    self.names
                        .insert_template(name.clone(), domain.to_string(), None, segments, param_names);
                }

                for raw in &redirects_from {
                    self.redirects.insert(raw.clone(), path_template.clone(), redirect_status);
                }
            }
        }

        Ok(())
    }
}

fn as_object<'v>(value: &'v Value, what: &str) -> Result<&'v serde_json::Map<String, Value>, CompileError> {
    value.as_object().ok_or_else(|| CompileError::MalformedSpec {
        detail: format!("{what} must be a mapping"),
    })
}

fn validate_segments(segments: &[Segment]) -> Result<(), CompileError> {
    if let Some(pos) = segments.iter().position(|s| matches!(s, Segment::Wildcard(_))) {
        if pos != segments.len() - 1 {
            return Err(CompileError::MalformedSpec {
                detail: "a wildcard segment must be the last segment in a path".to_string(),
            });
        }
    }
    Ok(())
}

fn param_names_of(segments: &[Segment]) -> Vec<String> {
    segments
        .iter()
        .filter_map(|s| match s {
            Segment::Param(name) => Some(name.clone()),
            Segment::Wildcard(Some(name)) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::HandlerResult;
    use serde_json::json;

    fn noop_handler() -> Handler {
        Arc::new(|_req, _params| HandlerResult::Text(String::new()))
    }

    struct TrackingMiddleware(&'static str);

    impl Middleware for TrackingMiddleware {
        fn call(
            &self,
            _request: &mut crate::value::Request,
            _response: &mut crate::value::Response,
        ) -> crate::pipeline::MiddlewareOutcome {
            crate::pipeline::MiddlewareOutcome::Continue
        }
    }

    fn handlers_with(names: &[&str]) -> HashMap<String, Handler> {
        names.iter().map(|n| (n.to_string(), noop_handler())).collect()
    }

    fn middleware_registry_with(names: &[&str]) -> HashMap<String, Vec<Arc<dyn Middleware>>> {
        names
            .iter()
            .map(|n| (n.to_string(), vec![Arc::new(TrackingMiddleware(n)) as Arc<dyn Middleware>]))
            .collect()
    }

    #[test]
    fn use_nil_clears_inherited_middleware() {
        let handlers = handlers_with(&["home", "child"]);
        let registry = middleware_registry_with(&["auth"]);
        let inputs = CompilerInputs {
            handlers: &handlers,
            middleware_registry: &registry,
        };

        let spec = json!({
            "example.com": {
                "use": ["auth"],
                "home": { "to": "home", "as": "home" },
                "admin": {
                    "use": null,
                    "dashboard": { "to": "child", "as": "dashboard" }
                }
            }
        })
        .as_object()
        .unwrap()
        .clone();

        let output = compile(&spec, &inputs).unwrap();

        let home = output
            .table
            .exact_domains
            .get("example.com")
            .unwrap()
            .literal_children
            .get("home")
            .unwrap()
            .handlers
            .get(&Method::GET);
        assert!(home.is_none());

        let home_route = output
            .table
            .exact_domains
            .get("example.com")
            .unwrap()
            .literal_children
            .get("home")
            .unwrap()
            .handlers
            .values()
            .next()
            .unwrap();
        assert_eq!(home_route.middleware.len(), 1);

        let dashboard_route = output
            .table
            .exact_domains
            .get("example.com")
            .unwrap()
            .literal_children
            .get("admin")
            .unwrap()
            .literal_children
            .get("dashboard")
            .unwrap()
            .handlers
            .values()
            .next()
            .unwrap();
        assert!(dashboard_route.middleware.is_empty());
    }

    #[test]
    fn localized_route_expands_per_declared_locale() {
        let handlers = handlers_with(&["home"]);
        let registry = HashMap::new();
        let inputs = CompilerInputs {
            handlers: &handlers,
            middleware_registry: &registry,
        };

        let spec = json!({
            "example.com": {
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

        let output = compile(&spec, &inputs).unwrap();
        assert_eq!(output.route_count, 2);
        assert_eq!(
            output.domain_locales.get("example.com"),
            Some(&vec!["en".to_string(), "fr".to_string()])
        );

        let en_root = output.table.exact_domains.get("example.com").unwrap();
        assert!(en_root
            .literal_children
            .get("en")
            .unwrap()
            .literal_children
            .get("home")
            .unwrap()
            .handlers
            .contains_key(&Method::GET));
        assert!(en_root
            .literal_children
            .get("fr")
            .unwrap()
            .literal_children
            .get("accueil")
            .unwrap()
            .handlers
            .contains_key(&Method::GET));
    }

    #[test]
    fn undeclared_locale_is_a_compile_error() {
        let handlers = handlers_with(&["home"]);
        let registry = HashMap::new();
        let inputs = CompilerInputs {
            handlers: &handlers,
            middleware_registry: &registry,
        };

        let spec = json!({
            "example.com": {
                "locales": ["en"],
                "home": {
                    "to": "home",
                    "as": "home",
                    "localized": { "en": "/home", "de": "/zuhause" }
                }
            }
        })
        .as_object()
        .unwrap()
        .clone();

        let err = compile(&spec, &inputs).unwrap_err();
        match err {
            CompileError::LocaleError { domain, locale } => {
                assert_eq!(domain, "example.com");
                assert_eq!(locale, "de");
            }
            other => panic!("expected LocaleError, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_route_name_is_rejected() {
        let handlers = handlers_with(&["home", "other"]);
        let registry = HashMap::new();
        let inputs = CompilerInputs {
            handlers: &handlers,
            middleware_registry: &registry,
        };

        let spec = json!({
            "example.com": {
                "home": { "to": "home", "as": "shared_name" },
                "about": { "to": "other", "as": "shared_name" }
            }
        })
        .as_object()
        .unwrap()
        .clone();

        let err = compile(&spec, &inputs).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateRouteName { name } if name == "shared_name"));
    }

    #[test]
    fn unknown_middleware_reference_is_rejected() {
        let handlers = handlers_with(&["home"]);
        let registry: HashMap<String, Vec<Arc<dyn Middleware>>> = HashMap::new();
        let inputs = CompilerInputs {
            handlers: &handlers,
            middleware_registry: &registry,
        };

        let spec = json!({
            "example.com": {
                "home": { "to": "home", "use": ["ghost"] }
            }
        })
        .as_object()
        .unwrap()
        .clone();

        let err = compile(&spec, &inputs).unwrap_err();
        assert!(matches!(err, CompileError::UnknownMiddleware { name } if name == "ghost"));
    }

    #[test]
    fn invalid_constraint_pattern_is_rejected() {
        let handlers = handlers_with(&["show"]);
        let registry = HashMap::new();
        let inputs = CompilerInputs {
            handlers: &handlers,
            middleware_registry: &registry,
        };

        let spec = json!({
            "example.com": {
                "users": {
                    ":id": {
                        "to": "show",
                        "constraints": { "id": "(" }
                    }
                }
            }
        })
        .as_object()
        .unwrap()
        .clone();

        let err = compile(&spec, &inputs).unwrap_err();
        assert!(matches!(err, CompileError::InvalidConstraint { param, .. } if param == "id"));
    }
}
