use std::fmt;

/// Errors raised synchronously from route-table compilation.
///
/// Compilation is all-or-nothing: any of these aborts the whole `compile()`
/// call; the previously installed table (if any) is left untouched.
#[derive(Debug, Clone)]
pub enum CompileError {
    DuplicateRouteName { name: String },
    UnknownMiddleware { name: String },
    LocaleError { domain: String, locale: String },
    MalformedSpec { detail: String },
    InvalidConstraint {
        param: String,
        pattern: String,
        reason: String,
    },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::DuplicateRouteName { name } => {
                write!(f, "duplicate route name: {name}")
            }
            CompileError::UnknownMiddleware { name } => {
                write!(f, "unknown middleware: {name}")
            }
            CompileError::LocaleError { domain, locale } => {
                write!(f, "locale {locale} not declared for domain {domain}")
            }
            CompileError::MalformedSpec { detail } => {
                write!(f, "malformed route spec: {detail}")
            }
            CompileError::InvalidConstraint {
                param,
                pattern,
                reason,
            } => write!(f, "invalid constraint for param {param} ({pattern}): {reason}"),
        }
    }
}

impl std::error::Error for CompileError {}

/// Errors raised from the reverse URL generator. These surface to the
/// caller as ordinary errors; the core does not translate them into HTTP
/// responses automatically.
#[derive(Debug, Clone)]
pub enum ReverseError {
    MissingParam { route_name: String, param: String },
    RouteNotFound { route_name: String },
    LocaleError { route_name: String, locale: String },
    DomainRequired { route_name: String },
}

impl fmt::Display for ReverseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReverseError::MissingParam { route_name, param } => {
                write!(f, "missing required param {param} for route {route_name}")
            }
            ReverseError::RouteNotFound { route_name } => {
                write!(f, "no route named {route_name}")
            }
            ReverseError::LocaleError { route_name, locale } => {
                write!(f, "locale {locale} has no template for route {route_name}")
            }
            ReverseError::DomainRequired { route_name } => write!(
                f,
                "no domain given, no ambient domain set, and no default_domain configured (route {route_name})"
            ),
        }
    }
}

impl std::error::Error for ReverseError {}
