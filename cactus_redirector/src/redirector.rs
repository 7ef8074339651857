//! HTTP redirector entry points.
//!
//! Each entry point turns the inbound HTTP request into the implicit objects
//! of its flavour and hands them to a fresh [`TestController`]. Faults are
//! answered with the fault's status, the [`FAULT_HEADER`] marker and the
//! diagnostic text as body; otherwise the reply is whatever the service (or
//! the test) put on the response.

use crate::controller::TestController;
use crate::error::{RedirectorError, Result};
use crate::implicit::ejb::{EjbBean, EjbContext, EjbImplicitObjects, EjbRequest};
use crate::implicit::jsp::JspImplicitObjects;
use crate::implicit::web::{
    RequestParts, ResponseCookie, ResponseParts, ServletConfig, ServletContext, ServletRequest,
    ServletResponse, WebImplicitObjects,
};
use crate::implicit::{Flavor, ImplicitObjects};
use crate::resolver::ClassResolver;
use crate::session::{DEFAULT_SESSION_TIMEOUT, SessionStore};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use cactus_common::VERSION;
use cactus_common::wire::{FAULT_HEADER, SESSION_COOKIE_NAME};
use serde_json::json;
use std::{collections::BTreeMap, net::SocketAddr, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Configuration of a redirector server.
///
/// ```rust
/// use cactus_redirector::RedirectorConfig;
///
/// let config = RedirectorConfig {
///     bind_addr: "127.0.0.1:0".parse().unwrap(),
///     context_path: "/myapp".into(),
///     ..Default::default()
/// };
/// assert_eq!(config.servlet_path(), "/myapp/ServletRedirector");
/// ```
#[derive(Debug, Clone)]
pub struct RedirectorConfig {
    /// Address to bind. Port 0 picks a free port.
    pub bind_addr: SocketAddr,

    /// Context path of the web application, `""` or starting with `/`.
    pub context_path: String,

    pub servlet_redirector_name: String,
    pub jsp_redirector_name: String,
    pub ejb_redirector_name: String,

    /// Init parameters every servlet config starts from.
    pub init_parameters: BTreeMap<String, String>,

    /// Idle time after which a session expires.
    pub session_timeout: Duration,
}

impl Default for RedirectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            context_path: "/test".to_string(),
            servlet_redirector_name: "ServletRedirector".to_string(),
            jsp_redirector_name: "JspRedirector".to_string(),
            ejb_redirector_name: "EjbRedirector".to_string(),
            init_parameters: BTreeMap::new(),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }
}

impl RedirectorConfig {
    fn context(&self) -> &str {
        self.context_path.trim_end_matches('/')
    }

    pub fn servlet_path(&self) -> String {
        format!("{}/{}", self.context(), self.servlet_redirector_name)
    }

    pub fn jsp_path(&self) -> String {
        format!("{}/{}", self.context(), self.jsp_redirector_name)
    }

    pub fn ejb_path(&self) -> String {
        format!("{}/{}", self.context(), self.ejb_redirector_name)
    }
}

/// Container state shared by every request.
struct RedirectorState {
    config: RedirectorConfig,
    resolver: Arc<dyn ClassResolver>,
    sessions: Arc<SessionStore>,
    context: Arc<ServletContext>,
    ejb_bean: Arc<EjbBean>,
}

/// Builds the redirector router. No socket is bound.
pub fn router(config: RedirectorConfig, resolver: Arc<dyn ClassResolver>) -> Router {
    let servlet_path = config.servlet_path();
    let jsp_path = config.jsp_path();
    let ejb_path = config.ejb_path();
    let state = Arc::new(RedirectorState {
        context: Arc::new(ServletContext::new(config.context())),
        ejb_bean: Arc::new(EjbBean::new(config.init_parameters.clone())),
        sessions: Arc::new(SessionStore::with_max_inactive(config.session_timeout)),
        resolver,
        config,
    });

    Router::new()
        .route("/health", get(health_check))
        .route(&servlet_path, get(servlet_redirector).post(servlet_redirector))
        .route(&jsp_path, get(jsp_redirector).post(jsp_redirector))
        .route(&ejb_path, get(ejb_redirector).post(ejb_redirector))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A redirector serving in a background task.
#[derive(Debug)]
pub struct RedirectorHandle {
    local_addr: SocketAddr,
    config: RedirectorConfig,
    shutdown: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl RedirectorHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `http://host:port` plus the context path.
    pub fn context_url(&self) -> String {
        format!("http://{}{}", self.local_addr, self.config.context())
    }

    /// Stops serving and waits for the server task.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|e| RedirectorError::HttpServer(format!("Server task failed: {}", e)))?
    }
}

async fn bind(config: &RedirectorConfig) -> Result<(tokio::net::TcpListener, SocketAddr)> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| RedirectorError::HttpServer(format!("Failed to bind: {}", e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| RedirectorError::HttpServer(format!("Failed to get local addr: {}", e)))?;
    info!("Redirector listening on http://{}", local_addr);
    info!("Servlet redirector: http://{}{}", local_addr, config.servlet_path());
    info!("JSP redirector: http://{}{}", local_addr, config.jsp_path());
    info!("EJB redirector: http://{}{}", local_addr, config.ejb_path());
    Ok((listener, local_addr))
}

async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| RedirectorError::HttpServer(format!("Server error: {}", e)))
}

/// Serves until `shutdown` is cancelled.
pub async fn start_redirector(
    config: RedirectorConfig,
    resolver: Arc<dyn ClassResolver>,
    shutdown: CancellationToken,
) -> Result<()> {
    let (listener, _) = bind(&config).await?;
    serve(listener, router(config, resolver), shutdown).await
}

/// Binds and serves in a background task.
pub async fn spawn_redirector(
    config: RedirectorConfig,
    resolver: Arc<dyn ClassResolver>,
) -> Result<RedirectorHandle> {
    let (listener, local_addr) = bind(&config).await?;
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(serve(
        listener,
        router(config.clone(), resolver),
        shutdown.clone(),
    ));
    Ok(RedirectorHandle {
        local_addr,
        config,
        shutdown,
        task,
    })
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": VERSION }))
}

async fn servlet_redirector(
    State(state): State<Arc<RedirectorState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    redirect(&state, Flavor::Servlet, method, uri, headers, body).await
}

async fn jsp_redirector(
    State(state): State<Arc<RedirectorState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    redirect(&state, Flavor::Jsp, method, uri, headers, body).await
}

async fn ejb_redirector(
    State(state): State<Arc<RedirectorState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    redirect(&state, Flavor::Ejb, method, uri, headers, body).await
}

/// Splits a `Host` value into name and port, keeping bracketed IPv6 names
/// whole.
fn split_host(host: &str) -> (&str, Option<u16>) {
    match host.rfind(':') {
        Some(i) if !host[i..].contains(']') => match host[i + 1..].parse() {
            Ok(port) => (&host[..i], Some(port)),
            Err(_) => (host, None),
        },
        _ => (host, None),
    }
}

fn request_parts(
    state: &RedirectorState,
    flavor: Flavor,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> RequestParts {
    let redirector_name = match flavor {
        Flavor::Jsp => &state.config.jsp_redirector_name,
        Flavor::Ejb => &state.config.ejb_redirector_name,
        _ => &state.config.servlet_redirector_name,
    };
    let mut parts = RequestParts::new(method.as_str(), uri.query())
        .at(state.config.context(), &format!("/{redirector_name}"))
        .with_body(body);

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()));
    if let Some(host) = host {
        let (name, port) = split_host(&host);
        parts.server_name = name.to_string();
        if let Some(port) = port {
            parts.server_port = port;
        }
    }

    for (name, value) in headers {
        match value.to_str() {
            Ok(value) => parts.headers.push((name.as_str().to_string(), value.to_string())),
            Err(_) => warn!(header = %name, "Dropping non-text request header"),
        }
    }
    parts
}

fn implicit_objects(state: &RedirectorState, flavor: Flavor, parts: RequestParts) -> ImplicitObjects {
    let redirector_name = match flavor {
        Flavor::Jsp => state.config.jsp_redirector_name.clone(),
        Flavor::Ejb => state.config.ejb_redirector_name.clone(),
        _ => state.config.servlet_redirector_name.clone(),
    };
    let request = Arc::new(ServletRequest::new(parts, state.sessions.clone()));
    let response = Arc::new(ServletResponse::new());
    match flavor {
        Flavor::Ejb => ImplicitObjects::Ejb(EjbImplicitObjects {
            request: Arc::new(EjbRequest::new(
                request.wire_params().clone(),
                request.remote_user(),
            )),
            context: Arc::new(EjbContext::new(state.ejb_bean.clone())),
            response,
        }),
        _ => {
            let web = WebImplicitObjects {
                config: Arc::new(ServletConfig::new(
                    redirector_name,
                    state.config.init_parameters.clone(),
                    state.context.clone(),
                )),
                context: state.context.clone(),
                request,
                response,
            };
            if flavor == Flavor::Jsp {
                ImplicitObjects::Jsp(JspImplicitObjects::new(web))
            } else {
                ImplicitObjects::Web(web)
            }
        }
    }
}

async fn redirect(
    state: &RedirectorState,
    flavor: Flavor,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let parts = request_parts(state, flavor, method, &uri, &headers, body);
    let objects = implicit_objects(state, flavor, parts);
    let controller = TestController::new(state.resolver.clone());
    match controller.handle_request(objects.clone()).await {
        Ok(_) => reply(state, &objects),
        Err(err) => fault_response(&err),
    }
}

/// Fault reply: status, marker header and the diagnostic as body.
pub fn fault_response(err: &RedirectorError) -> Response {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(FAULT_HEADER, err.fault_kind())], err.to_string()).into_response()
}

fn reply(state: &RedirectorState, objects: &ImplicitObjects) -> Response {
    let response = match objects {
        ImplicitObjects::Web(web) => &web.response,
        ImplicitObjects::Jsp(jsp) => &jsp.web.response,
        ImplicitObjects::Ejb(ejb) => &ejb.response,
        ImplicitObjects::MessageDriven(_) => {
            return fault_response(&RedirectorError::Internal(
                "message-driven objects reached the HTTP redirector".to_string(),
            ));
        }
    };
    let mut parts = response.parts();
    if let Some(session_id) = objects.web().and_then(|web| web.request.created_session_id()) {
        let path = if state.config.context().is_empty() {
            "/".to_string()
        } else {
            state.config.context().to_string()
        };
        parts
            .cookies
            .push(ResponseCookie::new(SESSION_COOKIE_NAME, session_id).with_path(path));
    }
    into_http(parts)
}

fn into_http(parts: ResponseParts) -> Response {
    let mut response = Response::new(axum::body::Body::from(parts.body));
    *response.status_mut() = StatusCode::from_u16(parts.status).unwrap_or(StatusCode::OK);
    let headers = response.headers_mut();
    for (name, value) in parts.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(header = %name, "Dropping invalid response header set by the test"),
        }
    }
    for cookie in parts.cookies {
        match HeaderValue::from_str(&cookie.header_value()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(_) => warn!(cookie = %cookie.name, "Dropping invalid cookie set by the test"),
        }
    }
    response
}
