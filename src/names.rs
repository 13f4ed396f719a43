//! The Name Index (component C, spec.md §3, §4.1): maps every named route
//! to the data the reverse URL generator needs — its domain, its
//! per-locale templates, and its required parameter set.

use crate::routing::segment::Segment;
use std::collections::HashMap;

/// One locale's (or the non-localized default's) path template.
#[derive(Clone)]
pub struct TemplateEntry {
    pub segments: Vec<Segment>,
    pub required_params: Vec<String>,
}

/// Everything the reverse URL generator needs for a named route.
/// Keyed by `Option<locale>` — `None` is the non-localized template.
#[derive(Clone)]
pub struct NameEntry {
    pub domain: String,
    pub templates: HashMap<Option<String>, TemplateEntry>,
}

/// Global name → route-template mapping. Names are unique across the
/// entire compiled table; localized expansions of the same route share
/// one entry with multiple templates (spec.md §4.1 "Name uniqueness").
#[derive(Default, Clone)]
pub struct NameIndex {
    entries: HashMap<String, NameEntry>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&NameEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a template for `name`, merging into an existing entry for
    /// locale expansions of the same route. The caller (the compiler) is
    /// responsible for rejecting true duplicate registrations — i.e. two
    /// *different* routes claiming the same name — before calling this for
    /// anything but locale siblings.
    pub fn insert_template(
        &mut self,
        name: String,
        domain: String,
        locale: Option<String>,
        segments: Vec<Segment>,
        required_params: Vec<String>,
    ) {
        let entry = self.entries.entry(name).or_insert_with(|| NameEntry {
            domain,
            templates: HashMap::new(),
        });
        entry.templates.insert(
            locale,
            TemplateEntry {
                segments,
                required_params,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}
