//! The redirect short circuit (spec.md §4.5): a compiled map from literal
//! request paths to `(targetPath, status)`, derived from `redirects_from`
//! declarations at compile time. Consulted by the adapter before the
//! matcher runs; a hit never runs middleware.

use std::collections::HashMap;

#[derive(Default, Clone)]
pub struct RedirectTable {
    entries: HashMap<String, (String, u16)>,
}

impl RedirectTable {
    pub fn insert(&mut self, from: String, to: String, status: u16) {
        self.entries.insert(from, (to, status));
    }

    pub fn lookup(&self, path: &str) -> Option<(&str, u16)> {
        self.entries.get(path).map(|(to, status)| (to.as_str(), *status))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_returns_target_and_status() {
        let mut table = RedirectTable::default();
        table.insert("/old".into(), "/new".into(), 301);
        assert_eq!(table.lookup("/old"), Some(("/new", 301)));
    }

    #[test]
    fn miss_returns_none() {
        let table = RedirectTable::default();
        assert_eq!(table.lookup("/nope"), None);
    }
}
