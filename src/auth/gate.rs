//! The authorization chokepoint between parsing and dispatch.

use std::sync::Arc;

use crate::auth::identity::{Identity, IdentityError, IdentityResolver};
use crate::auth::policy::{AccessPolicy, ServiceClass};
use crate::command::CommandRequest;
use crate::error::GatewayError;
use crate::http::request::RequestContext;

/// How the call was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Standard,
    /// `proxyAdmin`: for unclassified services the identity must be in the
    /// admin set, and nothing is injected.
    Admin,
}

pub struct AuthorizationGate {
    policy: AccessPolicy,
    cookie_name: String,
    resolver: Arc<dyn IdentityResolver>,
}

impl AuthorizationGate {
    pub fn new(
        policy: AccessPolicy,
        cookie_name: impl Into<String>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            policy,
            cookie_name: cookie_name.into(),
            resolver,
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Allow, augment, or reject a parsed call.
    ///
    /// Public and private classification wins over the requested mode; the
    /// admin check only applies to services in neither set. On success the
    /// returned request is ready for dispatch, and for private services its
    /// first parameter is the caller's identity.
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        mut request: CommandRequest,
        mode: AccessMode,
    ) -> Result<CommandRequest, GatewayError> {
        match self.policy.classify(&request.service_name) {
            Some(ServiceClass::Public) => Ok(request),
            Some(ServiceClass::Private) => {
                if !self.policy.private_access() {
                    self.session_text(ctx)?;
                    return Err(GatewayError::Unauthorized(
                        "access to private services is disabled".to_string(),
                    ));
                }
                let identity = self.resolve(ctx, &request).await?;
                request.params.insert(0, identity.into_value());
                Ok(request)
            }
            None if mode == AccessMode::Admin => {
                let identity = self.resolve(ctx, &request).await?;
                let is_admin = identity.id().is_some_and(|id| self.policy.is_admin(&id));
                if !is_admin {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        service = %request.service_name,
                        "Admin call rejected"
                    );
                    return Err(GatewayError::Forbidden(format!(
                        "identity is not allowed to call admin service `{}`",
                        request.service_name
                    )));
                }
                Ok(request)
            }
            None => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    service = %request.service_name,
                    "Call to unclassified service"
                );
                Err(GatewayError::UnknownService(request.service_name))
            }
        }
    }

    fn session_text(&self, ctx: &RequestContext) -> Result<String, GatewayError> {
        ctx.cookie(&self.cookie_name).ok_or_else(|| {
            tracing::debug!(request_id = %ctx.request_id, "Session cookie missing");
            GatewayError::Unauthorized(format!("session cookie `{}` not present", self.cookie_name))
        })
    }

    async fn resolve(
        &self,
        ctx: &RequestContext,
        request: &CommandRequest,
    ) -> Result<Identity, GatewayError> {
        let session_text = self.session_text(ctx)?;
        self.resolver
            .resolve(&session_text, request.timeout)
            .await
            .map_err(|e| {
                tracing::debug!(request_id = %ctx.request_id, error = %e, "Session rejected");
                match e {
                    IdentityError::Codec(codec) => GatewayError::Codec(codec),
                    other => GatewayError::Unauthorized(format!("invalid session: {}", other)),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CodecError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Accepts cookie values of the form `ok:<id>`.
    #[derive(Default)]
    struct PrefixResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityResolver for PrefixResolver {
        async fn resolve(&self, session_text: &str, _timeout: Duration) -> Result<Identity, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            session_text
                .strip_prefix("ok:")
                .map(|id| Identity::new(json!(id)))
                .ok_or(IdentityError::Codec(CodecError::Verification))
        }
    }

    fn gate(resolver: Arc<PrefixResolver>) -> AuthorizationGate {
        let policy = AccessPolicy::new(
            ["user-service"].into_iter().collect(),
            ["orders"].into_iter().collect(),
            ["root"].into_iter().collect(),
        );
        AuthorizationGate::new(policy, "sid", resolver)
    }

    fn ctx(cookie: Option<&str>) -> RequestContext {
        let mut builder = Request::builder().uri("/api/pcp");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", format!("sid={}", cookie));
        }
        let (parts, _) = builder.body(Body::empty()).unwrap().into_parts();
        RequestContext::from_parts(&parts, false)
    }

    fn request(service: &str, params: Vec<serde_json::Value>) -> CommandRequest {
        CommandRequest {
            service_name: service.into(),
            function_name: "f".into(),
            params,
            timeout: Duration::from_secs(5),
            download: None,
        }
    }

    #[tokio::test]
    async fn test_public_skips_resolution() {
        let resolver = Arc::new(PrefixResolver::default());
        let gate = gate(resolver.clone());
        let out = gate
            .authorize(&ctx(None), request("user-service", vec![json!("42")]), AccessMode::Standard)
            .await
            .unwrap();
        assert_eq!(out.params, vec![json!("42")]);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_private_prepends_identity_once() {
        let gate = gate(Arc::new(PrefixResolver::default()));
        let out = gate
            .authorize(
                &ctx(Some("ok:u1")),
                request("orders", vec![json!(1), json!("b")]),
                AccessMode::Standard,
            )
            .await
            .unwrap();
        assert_eq!(out.params, vec![json!("u1"), json!(1), json!("b")]);

        let empty = gate
            .authorize(&ctx(Some("ok:u1")), request("orders", vec![]), AccessMode::Standard)
            .await
            .unwrap();
        assert_eq!(empty.params, vec![json!("u1")]);
    }

    #[tokio::test]
    async fn test_private_without_valid_cookie() {
        let resolver = Arc::new(PrefixResolver::default());
        let gate = gate(resolver.clone());

        let missing = gate
            .authorize(&ctx(None), request("orders", vec![]), AccessMode::Standard)
            .await
            .unwrap_err();
        assert_eq!(missing, GatewayError::Unauthorized("session cookie `sid` not present".into()));
        assert_eq!(missing.errno(), 403);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);

        let invalid = gate
            .authorize(&ctx(Some("forged")), request("orders", vec![]), AccessMode::Standard)
            .await
            .unwrap_err();
        assert_eq!(invalid, GatewayError::Codec(CodecError::Verification));
        assert_eq!(invalid.errno(), 403);
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let gate = gate(Arc::new(PrefixResolver::default()));
        let err = gate
            .authorize(&ctx(Some("ok:u1")), request("ghost", vec![]), AccessMode::Standard)
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::UnknownService("ghost".into()));
        assert_eq!(err.errno(), 530);
    }

    #[tokio::test]
    async fn test_admin_mode() {
        let gate = gate(Arc::new(PrefixResolver::default()));

        let allowed = gate
            .authorize(&ctx(Some("ok:root")), request("ops", vec![json!(1)]), AccessMode::Admin)
            .await
            .unwrap();
        assert_eq!(allowed.params, vec![json!(1)]);

        let denied = gate
            .authorize(&ctx(Some("ok:alice")), request("ops", vec![]), AccessMode::Admin)
            .await
            .unwrap_err();
        assert!(matches!(denied, GatewayError::Forbidden(_)));

        let anonymous = gate
            .authorize(&ctx(None), request("ops", vec![]), AccessMode::Admin)
            .await
            .unwrap_err();
        assert!(matches!(anonymous, GatewayError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_private_access_disabled() {
        let resolver = Arc::new(PrefixResolver::default());
        let policy = AccessPolicy::new(
            ["user-service"].into_iter().collect(),
            ["orders"].into_iter().collect(),
            Default::default(),
        )
        .with_private_access(false);
        let gate = AuthorizationGate::new(policy, "sid", resolver.clone());

        let err = gate
            .authorize(&ctx(Some("ok:u1")), request("orders", vec![]), AccessMode::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized(_)));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);

        let missing = gate
            .authorize(&ctx(None), request("orders", vec![]), AccessMode::Standard)
            .await
            .unwrap_err();
        assert_eq!(missing, GatewayError::Unauthorized("session cookie `sid` not present".into()));
    }

    #[tokio::test]
    async fn test_admin_mode_follows_classification() {
        let resolver = Arc::new(PrefixResolver::default());
        let gate = gate(resolver.clone());

        let public = gate
            .authorize(&ctx(None), request("user-service", vec![json!("42")]), AccessMode::Admin)
            .await
            .unwrap();
        assert_eq!(public.params, vec![json!("42")]);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);

        let private = gate
            .authorize(&ctx(Some("ok:alice")), request("orders", vec![json!(1)]), AccessMode::Admin)
            .await
            .unwrap();
        assert_eq!(private.params, vec![json!("alice"), json!(1)]);

        let anonymous = gate
            .authorize(&ctx(None), request("orders", vec![]), AccessMode::Admin)
            .await
            .unwrap_err();
        assert!(matches!(anonymous, GatewayError::Unauthorized(_)));
    }
}
