//! Core server: HTTP routes, shared state and the listener loop.
//!
//! Owns the access token, profiles, client settings and the geometry slot.
//! Everything is read-only after startup except the active profile name,
//! the geometry slot and the live-session counter.

use crate::auth::{self, first_param, QueryPairs};
use crate::config::{ServerConfig, Settings};
use crate::geometry::GeometryChannel;
use crate::page;
use crate::session::relay;
use anyhow::Context;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Router};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use webtty_core::{AccessToken, ClientConfig, Geometry, Profiles, DEFAULT_PROFILE};

/// The webtty server instance.
pub struct WebttyServer {
    config: ServerConfig,
    client: ClientConfig,
    profiles: Profiles,
    token: AccessToken,
    geometry: GeometryChannel,
    /// Profile chosen by the most recent page load; the next session uses it.
    active_profile: RwLock<String>,
    live_sessions: AtomicUsize,
}

impl WebttyServer {
    pub fn new(settings: Settings, token: AccessToken) -> Self {
        Self {
            config: settings.server,
            client: settings.client,
            profiles: settings.profiles,
            token,
            geometry: GeometryChannel::default(),
            active_profile: RwLock::new(DEFAULT_PROFILE.to_string()),
            live_sessions: AtomicUsize::new(0),
        }
    }

    pub fn profiles(&self) -> &Profiles {
        &self.profiles
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    pub fn geometry(&self) -> &GeometryChannel {
        &self.geometry
    }

    pub async fn set_active_profile(&self, name: &str) {
        *self.active_profile.write().await = name.to_string();
    }

    pub async fn active_profile(&self) -> String {
        self.active_profile.read().await.clone()
    }

    pub fn session_opened(&self) {
        self.live_sessions.fetch_add(1, Ordering::SeqCst);
    }

    pub fn session_closed(&self) {
        self.live_sessions.fetch_sub(1, Ordering::SeqCst);
    }

    /// Number of sessions currently relaying.
    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::SeqCst)
    }

    /// Serve plain HTTP on an already-bound listener.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        axum::serve(listener, router(self))
            .await
            .context("HTTP server failed")
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(
        self: Arc<Self>,
        tls: Option<Arc<rustls::ServerConfig>>,
    ) -> anyhow::Result<()> {
        let addr = resolve_addr(&self.config.addr()).await?;
        match tls {
            Some(tls) => {
                info!(%addr, "listening (TLS)");
                axum_server::bind_rustls(addr, RustlsConfig::from_config(tls))
                    .serve(router(self).into_make_service())
                    .await
                    .context("HTTPS server failed")
            }
            None => {
                let listener = TcpListener::bind(addr)
                    .await
                    .with_context(|| format!("cannot bind {addr}"))?;
                info!(%addr, "listening");
                self.serve(listener).await
            }
        }
    }
}

/// Resolve `host:port`, preferring an IPv4 address.
async fn resolve_addr(addr: &str) -> anyhow::Result<SocketAddr> {
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host(addr)
        .await
        .with_context(|| format!("cannot resolve {addr}"))?
        .collect();
    candidates
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .with_context(|| format!("{addr} resolved to no addresses"))
}

/// Build the HTTP router. Every route sits behind the access-token guard.
pub fn router(server: Arc<WebttyServer>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/size", post(set_size))
        .route("/ws", get(ws_upgrade))
        .route_layer(middleware::from_fn_with_state(
            server.clone(),
            auth::require_token,
        ))
        .with_state(server)
}

async fn index(
    State(server): State<Arc<WebttyServer>>,
    Query(params): Query<QueryPairs>,
) -> Html<String> {
    let requested = first_param(&params, "profile").unwrap_or_default();
    let profile = server.profiles.resolve_or_default(requested);
    if !requested.is_empty() && profile.name != requested {
        warn!(profile = %requested, "unknown profile, using default");
    }
    server.set_active_profile(&profile.name).await;
    debug!(profile = %profile.name, "serving page");
    Html(page::render(&server.client, &server.config, &profile.title))
}

async fn set_size(
    State(server): State<Arc<WebttyServer>>,
    Query(params): Query<QueryPairs>,
) -> StatusCode {
    let geometry =
        Geometry::from_params(first_param(&params, "cols"), first_param(&params, "rows"));
    server.geometry.set(geometry).await;
    StatusCode::OK
}

async fn ws_upgrade(
    State(server): State<Arc<WebttyServer>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    if !auth::origin_allowed(origin, host, &server.config.bind_host) {
        warn!(origin = ?origin, "rejecting cross-origin websocket");
        return StatusCode::FORBIDDEN.into_response();
    }
    ws.on_upgrade(move |socket| relay::run(server, socket))
}
