//! `waypoint`: a declarative, multi-domain HTTP routing and dispatch
//! library. It matches requests to compiled routes and runs their
//! middleware/handler pipeline — it does not speak any transport itself;
//! see [`adapter`] for the seam to a concrete one.

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod names;
pub mod pipeline;
pub mod redirects;
pub mod reverse;
pub mod routing;
pub mod spec;
pub mod static_assets;
pub mod value;

pub use adapter::Adapter;
pub use config::RouterConfig;
pub use engine::Engine;
pub use error::{CompileError, ReverseError};
pub use pipeline::{run_pipeline, Middleware, MiddlewareOutcome};
pub use reverse::ReverseGenerator;
pub use value::{Handler, HandlerResult, MatchOutcome, Request, Response, RouteMatch};
