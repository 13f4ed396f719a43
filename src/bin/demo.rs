//! A minimal hyper-based demo binary wiring an [`Engine`] and [`Adapter`]
//! to a real listener, grounded on the teacher's `server::run_proxy_server`
//! accept loop — trimmed to a single-phase request/response translation
//! since there is no upstream to dial here.

use anyhow::{Context, Result};
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use waypoint::value::{Handler, HandlerResult, Request, Response};
use waypoint::{Adapter, Engine, RouterConfig};

#[derive(Parser)]
struct Args {
    /// Path to a JSON or TOML RouteSpec file.
    #[arg(long)]
    spec: std::path::PathBuf,

    /// Path to a JSON or TOML RouterConfig file; defaults are used if absent.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,
}

/// The sample handler set this demo registers `to:` references against.
/// A real embedder supplies its own map built from its application code.
fn sample_handlers() -> HashMap<String, Handler> {
    let mut handlers: HashMap<String, Handler> = HashMap::new();
    handlers.insert(
        "home".to_string(),
        Arc::new(|_req: &Request, _params: &HashMap<String, String>| {
            HandlerResult::Text("welcome".to_string())
        }),
    );
    handlers.insert(
        "show_item".to_string(),
        Arc::new(|_req: &Request, params: &HashMap<String, String>| {
            HandlerResult::Json(serde_json::json!({ "id": params.get("id") }))
        }),
    );
    handlers
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RouterConfig::load(path)?,
        None => RouterConfig::default(),
    };

    let spec = waypoint::spec::load_spec_file(&args.spec).context("loading route spec")?;

    let engine = Engine::empty(config);
    let handlers = sample_handlers();
    let middleware_registry: waypoint::middleware::MiddlewareRegistry = HashMap::new();
    let inputs = waypoint::engine::inputs(&handlers, &middleware_registry);
    engine.compile(&spec, &inputs).context("compiling route spec")?;

    let adapter = Arc::new(Adapter::new(engine));

    let addr: SocketAddr = args.listen.parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "waypoint-demo listening");

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                continue;
            }
        };

        let adapter = adapter.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let svc = service_fn(move |req: hyper::Request<Incoming>| {
                let adapter = adapter.clone();
                async move { Ok::<_, std::convert::Infallible>(handle(req, &adapter, peer_addr).await) }
            });

            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .http1()
                .serve_connection(io, svc)
                .await
            {
                tracing::warn!(peer = %peer_addr, error = %e, "connection error");
            }
        });
    }
}

async fn handle(
    req: hyper::Request<Incoming>,
    adapter: &Adapter,
    peer_addr: SocketAddr,
) -> hyper::Response<Full<Bytes>> {
    let request = match to_request(req, peer_addr).await {
        Ok(r) => r,
        Err(_) => {
            return to_hyper_response(Response {
                status: 400,
                headers: [("content-type".to_string(), "text/plain".to_string())].into(),
                body: b"malformed request".to_vec(),
            })
        }
    };

    let response = adapter.dispatch(request);
    to_hyper_response(response)
}

async fn to_request(
    req: hyper::Request<Incoming>,
    peer_addr: SocketAddr,
) -> Result<Request> {
    let method = req.method().clone();
    let host = req
        .headers()
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let path_and_query = req.uri().path_and_query().map(|p| p.as_str()).unwrap_or("/").to_string();

    let mut headers = HashMap::new();
    for (name, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            headers.insert(name.as_str().to_string(), v.to_string());
        }
    }

    let body = req.into_body().collect().await?.to_bytes().to_vec();

    let mut request = Request::new(method, host, path_and_query);
    request.headers = headers;
    request.body = body;
    request.client_ip = Some(peer_addr.ip());
    Ok(request)
}

fn to_hyper_response(response: Response) -> hyper::Response<Full<Bytes>> {
    let mut builder = hyper::Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name, value);
    }
    builder
        .body(Full::new(Bytes::from(response.body)))
        .unwrap_or_else(|_| hyper::Response::new(Full::new(Bytes::from_static(b"response build failed"))))
}
