pub mod matcher;
pub mod segment;
pub mod trie;

pub use matcher::{match_route, resolve_domain};
pub use segment::Segment;
pub use trie::{CompiledRoute, DomainTable, TrieNode};
