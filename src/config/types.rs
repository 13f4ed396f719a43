use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Deserialize a `T` that implements `Default` — treats JSON `null` the same as
/// a missing field (returns `T::default()`). Use with:
///   `#[serde(default, deserialize_with = "deserialize_null_default")]`
fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Trailing-slash policy applied at match time (spec.md §4.2, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingSlashPolicy {
    Strict,
    Ignore,
    Redirect,
}

impl Default for TrailingSlashPolicy {
    fn default() -> Self {
        TrailingSlashPolicy::Strict
    }
}

/// Process-wide configuration (spec.md §4.6). Set once at boot; read
/// freely at request time via `Engine`'s `ArcSwap`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub trailing_slash: TrailingSlashPolicy,

    #[serde(default = "default_trailing_slash_status")]
    pub trailing_slash_status: u16,

    #[serde(default)]
    pub default_domain: Option<String>,

    #[serde(default)]
    pub serve_static: bool,

    #[serde(default)]
    pub static_root: Option<String>,

    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub mime_types: HashMap<String, String>,

    #[serde(default)]
    pub method_override: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            trailing_slash: TrailingSlashPolicy::Strict,
            trailing_slash_status: default_trailing_slash_status(),
            default_domain: None,
            serve_static: false,
            static_root: None,
            mime_types: HashMap::new(),
            method_override: false,
        }
    }
}

fn default_trailing_slash_status() -> u16 {
    301
}
