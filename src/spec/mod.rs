//! The RouteSpec input tree (spec.md §3) and its loader.
//!
//! The tree has dynamic keys at every level (domain names, path segments),
//! so it is carried as `serde_json::Value` rather than a fixed struct —
//! the same way a declarative DSL config would be walked in the source
//! language. `compiler` below does the actual classification of keys.

pub mod compiler;

use crate::error::CompileError;
use serde_json::Value;
use std::path::Path;

/// The root of a RouteSpec: domain name (or `"*"` / `"*.suffix"`) to its
/// node.
pub type RouteSpec = serde_json::Map<String, Value>;

/// Load a RouteSpec from a JSON or TOML file, chosen by extension — the
/// same convention `RouterConfig::load` uses.
pub fn load_spec_file(path: &Path) -> Result<RouteSpec, CompileError> {
    let raw = std::fs::read_to_string(path).map_err(|e| CompileError::MalformedSpec {
        detail: format!("reading {}: {e}", path.display()),
    })?;

    let value = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => {
            let toml_value: toml::Value = toml::from_str(&raw).map_err(|e| CompileError::MalformedSpec {
                detail: format!("parsing {} as toml: {e}", path.display()),
            })?;
            serde_json::to_value(toml_value).map_err(|e| CompileError::MalformedSpec {
                detail: format!("converting toml to json: {e}"),
            })?
        }
        _ => serde_json::from_str(&raw).map_err(|e| CompileError::MalformedSpec {
            detail: format!("parsing {} as json: {e}", path.display()),
        })?,
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(CompileError::MalformedSpec {
            detail: "route spec root must be a mapping of domain keys".to_string(),
        }),
    }
}
