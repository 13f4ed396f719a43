//! Path segments and the normalization rules applied at both compile time
//! and request time (spec.md §4.1, §4.2).

use std::fmt;

/// One parsed component of a path template.
///
/// A node has at most one `Param` child and at most one `Wildcard` child
/// (spec.md §3 TrieNode, §9 design notes) — the tie-break is structural,
/// not a priority score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    Wildcard(Option<String>),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(s) => write!(f, "{s}"),
            Segment::Param(name) => write!(f, ":{name}"),
            Segment::Wildcard(Some(name)) => write!(f, "*{name}"),
            Segment::Wildcard(None) => write!(f, "*"),
        }
    }
}

/// Split a path template into segments, classifying each by its leading
/// sigil. Empty segments (leading/trailing/doubled slashes) are dropped —
/// this is the compile-time normalization rule in spec.md §4.1.
pub fn parse_segments(path: &str) -> Vec<Segment> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(classify_segment)
        .collect()
}

fn classify_segment(raw: &str) -> Segment {
    if let Some(name) = raw.strip_prefix(':') {
        Segment::Param(name.to_string())
    } else if let Some(name) = raw.strip_prefix('*') {
        if name.is_empty() {
            Segment::Wildcard(None)
        } else {
            Segment::Wildcard(Some(name.to_string()))
        }
    } else {
        Segment::Literal(raw.to_string())
    }
}

/// Join path segments with `/`, always producing an absolute path rooted
/// with a leading slash (used by the reverse URL generator and by the
/// compiler to build canonical templates).
pub fn join_path(segments: &[&str]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(segments.iter().map(|s| s.len() + 1).sum());
    for s in segments {
        out.push('/');
        out.push_str(s);
    }
    out
}

/// Decode percent-encoding and lowercase a request path, per spec.md §4.2.
/// Does not touch trailing-slash handling — that's policy-dependent and
/// handled by the caller (the matcher).
pub fn normalize_request_path(raw: &str) -> String {
    percent_encoding::percent_decode_str(raw)
        .decode_utf8_lossy()
        .to_lowercase()
}

/// Split an already-normalized path into non-empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_literal_param_wildcard() {
        let segs = parse_segments("/users/:id/*rest");
        assert_eq!(
            segs,
            vec![
                Segment::Literal("users".into()),
                Segment::Param("id".into()),
                Segment::Wildcard(Some("rest".into())),
            ]
        );
    }

    #[test]
    fn bare_wildcard_has_no_name() {
        let segs = parse_segments("/files/*");
        assert_eq!(segs[1], Segment::Wildcard(None));
    }

    #[test]
    fn drops_empty_segments() {
        let segs = parse_segments("//users//42/");
        assert_eq!(
            segs,
            vec![Segment::Literal("users".into()), Segment::Literal("42".into())]
        );
    }

    #[test]
    fn normalizes_percent_encoding_and_case() {
        assert_eq!(normalize_request_path("/USERS/%4Ane"), "/users/jne");
    }
}
