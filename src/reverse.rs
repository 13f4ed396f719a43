//! The Reverse URL Generator (component F, spec.md §4.4): reconstructs a
//! path or absolute URL from a named route plus parameters.

use crate::error::ReverseError;
use crate::names::{NameEntry, NameIndex};
use crate::pipeline::context;
use crate::routing::segment::Segment;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::HashMap;

const PATH_ENCODE: &AsciiSet = &CONTROLS.add(b' ').add(b'?').add(b'#').add(b'%');
const QUERY_ENCODE: &AsciiSet = &CONTROLS.add(b' ').add(b'&').add(b'=').add(b'#').add(b'%');

pub struct ReverseGenerator {
    names: NameIndex,
    domain_default_locales: HashMap<String, String>,
    default_domain: Option<String>,
}

impl ReverseGenerator {
    pub fn new(
        names: NameIndex,
        domain_default_locales: HashMap<String, String>,
        default_domain: Option<String>,
    ) -> Self {
        Self {
            names,
            domain_default_locales,
            default_domain,
        }
    }

    /// `path(name, params)` / `path(domain, name, params)` from spec.md §6.
    pub fn path(
        &self,
        name: &str,
        params: &HashMap<String, String>,
        locale: Option<&str>,
        domain: Option<&str>,
    ) -> Result<String, ReverseError> {
        let entry = self
            .names
            .get(name)
            .ok_or_else(|| ReverseError::RouteNotFound {
                route_name: name.to_string(),
            })?;

        let domain = self.resolve_domain(name, domain)?;
        let template = self.resolve_template(name, entry, &domain, locale)?;

        let mut consumed: Vec<&str> = Vec::new();
        let mut out = String::new();
        for seg in &template.segments {
            out.push('/');
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Param(p) => {
                    let value = params.get(p).ok_or_else(|| ReverseError::MissingParam {
                        route_name: name.to_string(),
                        param: p.clone(),
                    })?;
                    consumed.push(p.as_str());
                    out.push_str(&utf8_percent_encode(value, PATH_ENCODE).to_string());
                }
                Segment::Wildcard(Some(w)) => {
                    let value = params.get(w).ok_or_else(|| ReverseError::MissingParam {
                        route_name: name.to_string(),
                        param: w.clone(),
                    })?;
                    consumed.push(w.as_str());
                    out.push_str(&utf8_percent_encode(value, PATH_ENCODE).to_string());
                }
                Segment::Wildcard(None) => {}
            }
        }
        if out.is_empty() {
            out.push('/');
        }

        let mut leftover: Vec<(&String, &String)> = params
            .iter()
            .filter(|(k, _)| !consumed.contains(&k.as_str()))
            .collect();
        leftover.sort_by(|a, b| a.0.cmp(b.0));

        if !leftover.is_empty() {
            out.push('?');
            let parts: Vec<String> = leftover
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{}={}",
                        utf8_percent_encode(k, QUERY_ENCODE),
                        utf8_percent_encode(v, QUERY_ENCODE)
                    )
                })
                .collect();
            out.push_str(&parts.join("&"));
        }

        Ok(out)
    }

    /// `url(name, params, protocol?)` / `url(domain, name, params, protocol?)`.
    pub fn url(
        &self,
        name: &str,
        params: &HashMap<String, String>,
        locale: Option<&str>,
        domain: Option<&str>,
        protocol: Option<&str>,
    ) -> Result<String, ReverseError> {
        let domain = self.resolve_domain(name, domain)?;
        let domain = strip_scheme(&domain);
        let path = self.path(name, params, locale, Some(domain))?;
        let protocol = protocol.unwrap_or("https");
        Ok(format!("{protocol}://{domain}{path}"))
    }

    fn resolve_domain(&self, route_name: &str, explicit: Option<&str>) -> Result<String, ReverseError> {
        explicit
            .map(|d| d.to_string())
            .or_else(context::current_domain)
            .or_else(|| self.default_domain.clone())
            .ok_or_else(|| ReverseError::DomainRequired {
                route_name: route_name.to_string(),
            })
    }

    fn resolve_template<'a>(
        &self,
        route_name: &str,
        entry: &'a NameEntry,
        domain: &str,
        explicit_locale: Option<&str>,
    ) -> Result<&'a crate::names::TemplateEntry, ReverseError> {
        let is_localized = entry.templates.keys().any(|k| k.is_some());
        if !is_localized {
            return entry
                .templates
                .get(&None)
                .ok_or_else(|| ReverseError::RouteNotFound {
                    route_name: route_name.to_string(),
                });
        }

        let resolved = explicit_locale
            .map(|s| s.to_string())
            .or_else(context::current_locale)
            .or_else(|| self.domain_default_locales.get(domain).cloned());

        let resolved = resolved.ok_or_else(|| ReverseError::LocaleError {
            route_name: route_name.to_string(),
            locale: String::new(),
        })?;

        entry
            .templates
            .get(&Some(resolved.clone()))
            .ok_or_else(|| ReverseError::LocaleError {
                route_name: route_name.to_string(),
                locale: resolved,
            })
    }
}

fn strip_scheme(domain: &str) -> &str {
    domain
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(domain)
}
