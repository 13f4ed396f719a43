//! The static-asset short circuit (spec.md §4.5), gated by config. Consulted
//! only after the matcher misses — a defined route always wins over a
//! static file at the same path. Files are read in full and closed before
//! the response is returned; there is no streaming at this layer
//! (spec.md §5 "Resource discipline").

use crate::config::RouterConfig;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

pub struct StaticAssets {
    root: PathBuf,
    mime_overrides: HashMap<String, String>,
}

impl StaticAssets {
    pub fn from_config(config: &RouterConfig) -> Option<Self> {
        if !config.serve_static {
            return None;
        }
        let root = config.static_root.clone()?;
        Some(Self {
            root: PathBuf::from(root),
            mime_overrides: config.mime_types.clone(),
        })
    }

    /// Resolve a GET request path to file bytes + MIME type, refusing any
    /// path that would escape `root` via `..` components.
    pub fn serve(&self, request_path: &str) -> Option<(Vec<u8>, String)> {
        let relative = request_path.trim_start_matches('/');
        let candidate = self.root.join(relative);
        if !is_contained(&self.root, &candidate) {
            return None;
        }

        let bytes = std::fs::read(&candidate).ok()?;
        let mime = self.resolve_mime(&candidate);
        Some((bytes, mime))
    }

    fn resolve_mime(&self, path: &Path) -> String {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if let Some(custom) = self.mime_overrides.get(ext) {
                return custom.clone();
            }
        }
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

/// Reject `..`/absolute components so a crafted request path can never
/// read outside the configured static root.
fn is_contained(root: &Path, candidate: &Path) -> bool {
    let mut depth: i32 = 0;
    for component in candidate.strip_prefix(root).unwrap_or(candidate).components() {
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return false,
        }
        if depth < 0 {
            return false;
        }
    }
    true
}
