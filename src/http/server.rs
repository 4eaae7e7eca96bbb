//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the gateway router once from configuration
//! - Wire up middleware (tracing, request id, body limit)
//! - Serve on a plain or TLS listener with graceful shutdown

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{
    AccessPolicy, AuthorizationGate, CodecIdentityResolver, IdentityResolver, WorkerIdentityResolver,
};
use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::http::request::ListenerTls;
use crate::http::response::redirect;
use crate::http::{pcp, webhook};
use crate::lifecycle::shutdown;
use crate::net::load_tls_config;
use crate::oauth::{self, OAuthProvider, WorkerOAuthProvider};
use crate::pool::{HttpWorkerPool, WorkerPool};
use crate::session::{SessionCodec, SessionCookies};

/// Time given to in-flight requests once shutdown starts on the TLS listener.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthorizationGate>,
    pub dispatcher: Dispatcher,
    pub sessions: Arc<SessionCookies>,
}

/// The gateway HTTP server.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Build the server around an existing worker pool.
    pub fn new(config: GatewayConfig, pool: Arc<dyn WorkerPool>) -> Self {
        let codec = Arc::new(SessionCodec::new(&config.session.secret_key));
        let sessions = Arc::new(SessionCookies::new(codec, &config.session));

        let resolver: Arc<dyn IdentityResolver> = match &config.session.identity_service {
            Some(target) => {
                tracing::info!(service = %target.service, "Resolving identities through worker");
                Arc::new(WorkerIdentityResolver::new(pool.clone(), target.clone()))
            }
            None => Arc::new(CodecIdentityResolver::new(sessions.clone())),
        };

        let gate = Arc::new(AuthorizationGate::new(
            AccessPolicy::from_config(&config.policy),
            config.session.cookie_name.clone(),
            resolver,
        ));

        let providers: Vec<Arc<dyn OAuthProvider>> = config
            .oauth
            .iter()
            .map(|entry| {
                Arc::new(WorkerOAuthProvider::new(pool.clone(), entry.clone())) as Arc<dyn OAuthProvider>
            })
            .collect();

        let state = AppState {
            gate,
            dispatcher: Dispatcher::new(pool.clone()),
            sessions: sessions.clone(),
        };

        let router = Router::new()
            .route("/api/pcp", get(pcp::get_pcp).post(pcp::post_pcp))
            .route("/logout", get(logout))
            .route("/healthz", get(healthz))
            .with_state(state)
            .merge(oauth::routes(&providers, sessions))
            .merge(webhook::routes(&config.webhooks, pool));

        let router = Self::apply_middleware(router, &config);

        tracing::info!(
            public = config.policy.public.len(),
            private = config.policy.private.len(),
            oauth_providers = providers.len(),
            webhooks = config.webhooks.len(),
            "Gateway router built"
        );

        Self { router, config }
    }

    /// Build the server with the HTTP worker pool described by `config`.
    pub fn from_config(config: GatewayConfig) -> Self {
        let pool = Arc::new(HttpWorkerPool::new(&config.workers, &config.pool));
        Self::new(config, pool)
    }

    fn apply_middleware(router: Router, config: &GatewayConfig) -> Router {
        let router = router
            .layer(DefaultBodyLimit::disable())
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes)),
            );

        if config.listener.tls.is_some() {
            router.layer(Extension(ListenerTls))
        } else {
            router
        }
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve plain HTTP until `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::notified(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` with the configured certificate.
    pub async fn run_tls(self, addr: SocketAddr, shutdown: broadcast::Receiver<()>) -> io::Result<()> {
        let Some(tls) = self.config.listener.tls.as_ref() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "listener.tls is not configured"));
        };
        let rustls = load_tls_config(tls).await?;

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            shutdown::notified(shutdown).await;
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Clear the session cookie. Safe to call with or without a session.
async fn logout(State(state): State<AppState>) -> Response {
    match state.sessions.removal().to_header_value() {
        Ok(cookie) => redirect("/", Some(cookie)),
        Err(e) => e.to_string().into_response(),
    }
}

async fn healthz() -> &'static str {
    "ok"
}
