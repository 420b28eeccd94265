//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the next-stage handler
//! - Wire up middleware (form2json, timeout, tracing, request ID)
//! - Serve on a bound listener until shutdown
//! - Apply reloaded form limits without restarting
//! - Forward converted requests upstream, or echo them when no upstream is set

use axum::{
    body::Body,
    extract::State,
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::str::FromStr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Form2JsonConfig;
use crate::form::{Form2Json, CONTENT_TYPE_CLASS_HEADER};
use crate::http::middleware::form2json;
use crate::http::request::{MakeRequestUuid, RequestIdExt};

/// State for the next-stage handler.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Option<Authority>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server hosting the form2json middleware.
pub struct HttpServer {
    router: Router,
    config: Form2JsonConfig,
    converter: Form2Json,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// The configuration is expected to be validated; an upstream address
    /// that does not parse as an authority is ignored with an error log.
    pub fn new(config: Form2JsonConfig) -> Self {
        let converter = Form2Json::new(config.form.clone());

        let upstream = config.upstream.address.as_deref().and_then(|addr| {
            Authority::from_str(addr)
                .map_err(|e| tracing::error!(upstream = %addr, error = %e, "Invalid upstream address"))
                .ok()
        });

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState { upstream, client };
        let router = Self::build_router(&config, state, converter.clone());

        Self {
            router,
            config,
            converter,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &Form2JsonConfig, state: AppState, converter: Form2Json) -> Router {
        Router::new()
            .route("/{*path}", any(next_stage))
            .route("/", any(next_stage))
            .with_state(state)
            .layer(from_fn_with_state(converter, form2json))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// New configurations received on `config_updates` replace the form
    /// limits; the server stops when `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<Form2JsonConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = ?self.config.upstream.address,
            memory_limit = self.config.form.memory_limit,
            "HTTP server starting"
        );

        let converter = self.converter.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                converter.reload(config.form);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &Form2JsonConfig {
        &self.config
    }

    /// The converter shared by all requests.
    pub fn converter(&self) -> &Form2Json {
        &self.converter
    }
}

/// Next pipeline stage: forward upstream, or echo the request body.
async fn next_stage(State(state): State<AppState>, request: Request<Body>) -> Response {
    match &state.upstream {
        Some(authority) => forward(&state, authority.clone(), request).await,
        None => echo(request),
    }
}

/// Reflect the (possibly converted) body and its content headers.
fn echo(request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let mut response = Response::new(body);
    for name in [header::CONTENT_TYPE, header::CONTENT_LENGTH] {
        if let Some(value) = parts.headers.get(&name) {
            response.headers_mut().insert(name, value.clone());
        }
    }
    if let Some(value) = parts.headers.get(CONTENT_TYPE_CLASS_HEADER) {
        response.headers_mut().insert(CONTENT_TYPE_CLASS_HEADER, value.clone());
    }
    response
}

async fn forward(state: &AppState, authority: Authority, request: Request<Body>) -> Response {
    let request_id = request.request_id().to_owned();
    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(authority.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    tracing::debug!(request_id = %request_id, upstream = %authority, uri = %parts.uri, "Forwarding request");

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body): (_, Incoming) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, upstream = %authority, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
