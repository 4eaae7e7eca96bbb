//! Login and callback endpoints, one pair per provider.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::http::request::RequestContext;
use crate::http::response::redirect;
use crate::oauth::provider::OAuthProvider;
use crate::observability::metrics;
use crate::session::{SessionCookies, SessionPayload};

#[derive(Clone)]
struct FlowState {
    provider: Arc<dyn OAuthProvider>,
    sessions: Arc<SessionCookies>,
}

/// Register the login and callback endpoint of every provider.
pub fn routes(providers: &[Arc<dyn OAuthProvider>], sessions: Arc<SessionCookies>) -> Router {
    providers.iter().fold(Router::new(), |router, provider| {
        let state = FlowState {
            provider: provider.clone(),
            sessions: sessions.clone(),
        };
        router.merge(
            Router::new()
                .route(provider.login_endpoint(), get(login))
                .route(provider.callback_endpoint(), get(callback))
                .with_state(state),
        )
    })
}

async fn login(State(state): State<FlowState>, ctx: RequestContext) -> Response {
    let host = ctx.redirect_host();
    tracing::info!(
        request_id = %ctx.request_id,
        endpoint = %state.provider.login_endpoint(),
        login_type = %state.provider.login_type(),
        "OAuth login"
    );

    match state.provider.construct_login_url(&host).await {
        Ok(url) => {
            metrics::record_oauth("login", true);
            tracing::debug!(request_id = %ctx.request_id, url = %url, "Redirecting to provider");
            redirect(&url, None)
        }
        Err(e) => {
            metrics::record_oauth("login", false);
            tracing::warn!(request_id = %ctx.request_id, error = %e, "OAuth login failed");
            e.to_string().into_response()
        }
    }
}

async fn callback(State(state): State<FlowState>, ctx: RequestContext) -> Response {
    let host = ctx.redirect_host();

    let user = match state.provider.resolve_user(&host, &ctx.request_url()).await {
        Ok(user) => user,
        Err(e) => {
            metrics::record_oauth("callback", false);
            tracing::warn!(request_id = %ctx.request_id, error = %e, "OAuth callback failed");
            return e.to_string().into_response();
        }
    };

    let payload = SessionPayload {
        source: state.provider.login_type().to_string(),
        user,
    };
    let cookie = match state.sessions.issue_payload(&payload) {
        Ok(cookie) => cookie,
        Err(e) => {
            metrics::record_oauth("callback", false);
            tracing::error!(request_id = %ctx.request_id, error = %e, "Could not issue session");
            return e.to_string().into_response();
        }
    };
    let set_cookie = match cookie.map(|c| c.to_header_value()).transpose() {
        Ok(value) => value,
        Err(e) => return e.to_string().into_response(),
    };

    metrics::record_oauth("callback", true);
    tracing::info!(
        request_id = %ctx.request_id,
        login_type = %state.provider.login_type(),
        "Session issued"
    );
    redirect("/", set_cookie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::oauth::provider::ProviderError;
    use crate::pool::BackendError;
    use crate::session::{parse_cookie, SessionCodec};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
    use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct FakeProvider {
        fail: bool,
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl OAuthProvider for FakeProvider {
        fn login_type(&self) -> &str {
            "github"
        }

        fn login_endpoint(&self) -> &str {
            "/oauth/github/login"
        }

        fn callback_endpoint(&self) -> &str {
            "/oauth/github/callback"
        }

        async fn construct_login_url(&self, host: &str) -> Result<String, ProviderError> {
            if self.fail {
                return Err(ProviderError::Backend(BackendError::Remote("provider down".into())));
            }
            Ok(format!("https://github.example/authorize?redirect={}/oauth/github/callback", host))
        }

        async fn resolve_user(&self, host: &str, request_url: &str) -> Result<Value, ProviderError> {
            self.seen.lock().unwrap().push((host.to_string(), request_url.to_string()));
            if self.fail {
                return Err(ProviderError::Backend(BackendError::Remote("bad code".into())));
            }
            Ok(json!({"id": "gh-1"}))
        }
    }

    fn app(fail: bool) -> (Router, Arc<FakeProvider>, Arc<SessionCookies>) {
        let provider = Arc::new(FakeProvider {
            fail,
            seen: Mutex::new(Vec::new()),
        });
        let config = SessionConfig::default();
        let sessions = Arc::new(SessionCookies::new(
            Arc::new(SessionCodec::new(&config.secret_key)),
            &config,
        ));
        let providers: Vec<Arc<dyn OAuthProvider>> = vec![provider.clone()];
        (routes(&providers, sessions.clone()), provider, sessions)
    }

    #[tokio::test]
    async fn test_login_redirects_with_host_override() {
        let (app, _, _) = app(false);
        let response = app
            .oneshot(
                Request::get("/oauth/github/login?host=https://a.com")
                    .header("host", "gateway.local")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[LOCATION],
            "https://github.example/authorize?redirect=https://a.com/oauth/github/callback"
        );
    }

    #[tokio::test]
    async fn test_callback_sets_session_and_redirects_home() {
        let (app, provider, sessions) = app(false);
        let response = app
            .oneshot(
                Request::get("/oauth/github/callback?code=xyz")
                    .header("host", "gateway.local")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[LOCATION], "/");
        assert_eq!(
            provider.seen.lock().unwrap()[0],
            ("http://gateway.local".to_string(), "/oauth/github/callback?code=xyz".to_string())
        );

        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(pair).unwrap());
        let raw = parse_cookie(&headers, sessions.cookie_name()).unwrap();

        let payload = sessions.open_payload(&raw).unwrap();
        assert_eq!(payload.source, "github");
        assert_eq!(payload.user, json!({"id": "gh-1"}));
    }

    #[tokio::test]
    async fn test_failures_write_raw_text() {
        let (app, _, _) = app(true);

        let login = app
            .clone()
            .oneshot(Request::get("/oauth/github/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::OK);
        assert!(login.headers().get(LOCATION).is_none());
        let body = to_bytes(login.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"provider down");

        let callback = app
            .oneshot(Request::get("/oauth/github/callback?code=1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(callback.headers().get(SET_COOKIE).is_none());
        let body = to_bytes(callback.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"bad code");
    }
}
