// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated transaction scopes.
//!
//! ```text
//! Unopened ─► TransactionOpen ─► TokenVerified ─► GroupsChecked ─► Ready
//!                  │                  │                 │
//!                  └──────────────────┴─────────────────┴─► Released
//! ```
//!
//! Only a `Ready` scope reaches the caller. Every failed step closes the
//! scope (rollback + cancel) before the error is returned.

use super::claims::{has_any_group, ClaimError, Claims, GROUPS_CLAIM};
use super::dial;
use super::error::{ConnectError, VerifyError};
use super::verifier::{RemoteVerifier, TokenVerifier};
use super::AuthenticatorClient;
use crate::context::Context;
use crate::error::{ScopeError, ERR_GROUP};
use crate::scope::TransactionScope;
use crate::storage::{Pool, Transaction};

/// Opens transaction scopes for verified callers.
#[derive(Debug, Clone)]
pub struct Authenticator<V = RemoteVerifier> {
    verifier: V,
}

impl Authenticator<RemoteVerifier> {
    /// Dial the identity service at `target`, retrying until `ctx` ends, and
    /// accept tokens issued for any of `audiences`.
    pub async fn connect<I, S>(ctx: &Context, target: &str, audiences: I) -> Result<Self, ConnectError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channel = dial::attempt_connect(ctx, target).await?;
        let verifier = RemoteVerifier::new(
            AuthenticatorClient::new(channel),
            audiences.into_iter().map(Into::into).collect(),
        );
        Ok(Self { verifier })
    }
}

impl<V: TokenVerifier> Authenticator<V> {
    pub fn with_verifier(verifier: V) -> Self {
        Self { verifier }
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Open a transaction scope for the holder of `token`.
    ///
    /// With non-empty `groups`, the token must claim at least one of them.
    /// The caller owns the returned scope and must commit and/or close it.
    #[allow(clippy::too_many_arguments)]
    pub async fn new_scope<P, G>(
        &self,
        ctx: &Context,
        log: &tracing::Span,
        pool: &P,
        read_only: bool,
        concurrency: Option<usize>,
        token: &str,
        groups: &[G],
    ) -> Result<TransactionScope<P::Tx>, ScopeError>
    where
        P: Pool,
        G: AsRef<str>,
    {
        let mut scope = TransactionScope::open(ctx, log, pool, read_only, concurrency).await?;

        let claims = match self.verifier.verify_token(scope.context(), token).await {
            Ok(claims) => claims,
            Err(err) => {
                scope.span().in_scope(|| {
                    tracing::error!(error = %err, token = %redact(token), "Check token")
                });
                return Err(release(scope, classify_verify_error(err)));
            }
        };

        if let Err(err) = authorize_groups(groups, &claims) {
            let required: Vec<&str> = groups.iter().map(|g| g.as_ref()).collect();
            scope.span().in_scope(|| {
                tracing::error!(
                    required = ?required,
                    claimed = ?claims.get(GROUPS_CLAIM),
                    subject = ?claims.subject(),
                    error_code = err.error_code(),
                    "{}",
                    ERR_GROUP
                )
            });
            return Err(release(scope, err));
        }

        scope.set_claims(claims);
        Ok(scope)
    }
}

/// Check the claimed groups against the required ones.
///
/// No required groups means no check. A missing `groups` claim is a
/// mismatch; a `groups` claim that is not a list of strings is malformed.
pub fn authorize_groups<G: AsRef<str>>(required: &[G], claims: &Claims) -> Result<(), ScopeError> {
    if required.is_empty() {
        return Ok(());
    }
    let claimed = match claims.groups() {
        Ok(claimed) => claimed,
        Err(ClaimError::Missing(_)) => return Err(ScopeError::GroupMismatch),
        Err(ClaimError::Malformed(_)) => return Err(ScopeError::GroupClaimMalformed),
    };
    if has_any_group(required, &claimed) {
        Ok(())
    } else {
        Err(ScopeError::GroupMismatch)
    }
}

fn classify_verify_error(err: VerifyError) -> ScopeError {
    match err {
        VerifyError::Context(ctx_err) => ScopeError::Context(ctx_err),
        err if err.is_token_fault() => ScopeError::Unauthenticated(Box::new(err)),
        err => ScopeError::AuthServer(Box::new(err)),
    }
}

/// Close a scope that will not be handed out and pass the error through.
fn release<T: Transaction>(mut scope: TransactionScope<T>, err: ScopeError) -> ScopeError {
    scope.close();
    err
}

/// Keep enough of a token to correlate log lines without leaking it.
fn redact(token: &str) -> String {
    let head: String = token.chars().take(8).collect();
    format!("{head}… ({} chars)", token.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::error::TokenFault;
    use crate::context::ContextError;
    use crate::storage::mock::{MockPool, TxOutcome};
    use serde_json::{json, Value};

    /// Verifier that maps fixed tokens to fixed outcomes.
    struct StaticVerifier;

    const GOOD: &str = "good-token";
    const EXPIRED: &str = "expired-token";
    const BROKEN_SERVICE: &str = "service-down";
    const BAD_GROUPS: &str = "bad-groups-token";
    const NO_GROUPS: &str = "no-groups-token";

    fn claims(value: Value) -> Claims {
        match value {
            Value::Object(map) => Claims::new(map),
            _ => panic!("claims must be an object"),
        }
    }

    impl TokenVerifier for StaticVerifier {
        async fn verify_token(&self, ctx: &Context, token: &str) -> Result<Claims, VerifyError> {
            if let Some(err) = ctx.err() {
                return Err(err.into());
            }
            match token {
                GOOD => Ok(claims(json!({"sub": "admin", "groups": ["primary", "ops"]}))),
                BAD_GROUPS => Ok(claims(json!({"sub": "admin", "groups": "primary"}))),
                NO_GROUPS => Ok(claims(json!({"sub": "admin"}))),
                EXPIRED => Err(TokenFault::Expired.into()),
                BROKEN_SERVICE => Err(tonic::Status::unavailable("down").into()),
                _ => Err(TokenFault::Malformed.into()),
            }
        }
    }

    async fn scope_for(
        pool: &MockPool,
        token: &str,
        groups: &[&str],
    ) -> Result<TransactionScope<crate::storage::mock::MockTx>, ScopeError> {
        Authenticator::with_verifier(StaticVerifier)
            .new_scope(
                &Context::background(),
                &tracing::Span::none(),
                pool,
                true,
                Some(2),
                token,
                groups,
            )
            .await
    }

    #[tokio::test]
    async fn success_without_groups_attaches_claims() {
        let pool = MockPool::new();
        let scope = scope_for(&pool, GOOD, &[]).await.unwrap();
        assert_eq!(scope.claims().unwrap().subject(), Some("admin"));
        assert_eq!(pool.records()[0].nodes, 2);
        assert_eq!(pool.open_count(), 1);
    }

    #[tokio::test]
    async fn success_with_overlapping_groups() {
        let pool = MockPool::new();
        let scope = scope_for(&pool, GOOD, &["primary", "spanac"]).await.unwrap();
        assert!(scope.claims().is_some());
    }

    #[tokio::test]
    async fn bad_token_is_unauthenticated_and_released() {
        let pool = MockPool::new();
        let err = scope_for(&pool, "Fooo", &["primary"]).await.unwrap_err();
        assert!(matches!(err, ScopeError::Unauthenticated(_)));
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
        assert_eq!(err.to_string(), "Unauthorized");
        assert_eq!(pool.open_count(), 0);
        assert_eq!(pool.records()[0].outcome, TxOutcome::RolledBack);
    }

    #[tokio::test]
    async fn expired_token_is_unauthenticated() {
        let pool = MockPool::new();
        let err = scope_for(&pool, EXPIRED, &[]).await.unwrap_err();
        assert!(matches!(err, ScopeError::Unauthenticated(_)));
        assert_eq!(pool.open_count(), 0);
    }

    #[tokio::test]
    async fn service_failure_is_auth_server_error() {
        let pool = MockPool::new();
        let err = scope_for(&pool, BROKEN_SERVICE, &[]).await.unwrap_err();
        assert!(matches!(err, ScopeError::AuthServer(_)));
        assert_eq!(err.code(), tonic::Code::Internal);
        assert_eq!(err.to_string(), "Authentication server error");
        assert_eq!(pool.open_count(), 0);
    }

    #[tokio::test]
    async fn wrong_group_is_rejected_and_released() {
        let pool = MockPool::new();
        let err = scope_for(&pool, GOOD, &["spanac"]).await.unwrap_err();
        assert!(matches!(err, ScopeError::GroupMismatch));
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
        assert_eq!(pool.open_count(), 0);
    }

    #[tokio::test]
    async fn malformed_groups_claim_is_invalid_argument() {
        let pool = MockPool::new();
        let err = scope_for(&pool, BAD_GROUPS, &["primary"]).await.unwrap_err();
        assert!(matches!(err, ScopeError::GroupClaimMalformed));
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
        assert_eq!(pool.open_count(), 0);
    }

    #[tokio::test]
    async fn missing_groups_claim_is_mismatch() {
        let pool = MockPool::new();
        let err = scope_for(&pool, NO_GROUPS, &["primary"]).await.unwrap_err();
        assert!(matches!(err, ScopeError::GroupMismatch));
        assert_eq!(pool.open_count(), 0);
    }

    #[tokio::test]
    async fn malformed_groups_ignored_without_requirement() {
        let pool = MockPool::new();
        assert!(scope_for(&pool, BAD_GROUPS, &[]).await.is_ok());
    }

    #[tokio::test]
    async fn pool_failure_skips_verification() {
        let pool = MockPool::failing_open();
        let err = scope_for(&pool, GOOD, &[]).await.unwrap_err();
        assert!(matches!(err, ScopeError::Database(_)));
        assert!(pool.records().is_empty());
    }

    #[tokio::test]
    async fn cancelled_context_fails_before_opening() {
        let pool = MockPool::new();
        let ctx = Context::background();
        ctx.cancel();
        let err = Authenticator::with_verifier(StaticVerifier)
            .new_scope(&ctx, &tracing::Span::none(), &pool, true, Some(2), GOOD, &[] as &[&str])
            .await
            .unwrap_err();
        assert!(matches!(err, ScopeError::Context(ContextError::Canceled)));
        assert!(pool.records().is_empty());
    }

    #[tokio::test]
    async fn signed_token_opens_scope_through_remote_verifier() {
        use crate::auth::testing::{now_plus, sign, verifier_with_key, KID};

        let pool = MockPool::new();
        let auth = Authenticator::with_verifier(verifier_with_key(&["spanac"]).await);
        let token = sign(
            KID,
            &json!({"sub": "admin", "aud": "spanac", "exp": now_plus(600), "groups": ["ops"]}),
        );
        let scope = auth
            .new_scope(
                &Context::background(),
                &tracing::Span::none(),
                &pool,
                false,
                None,
                &token,
                &["ops"],
            )
            .await
            .unwrap();
        assert_eq!(scope.claims().unwrap().subject(), Some("admin"));
        drop(scope);

        let expired = sign(KID, &json!({"sub": "admin", "aud": "spanac", "exp": now_plus(-3600)}));
        let err = auth
            .new_scope(
                &Context::background(),
                &tracing::Span::none(),
                &pool,
                false,
                None,
                &expired,
                &[] as &[&str],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScopeError::Unauthenticated(_)));
        assert_eq!(pool.records()[1].outcome, TxOutcome::RolledBack);
    }

    #[tokio::test]
    async fn connect_to_unreachable_service_ends_at_deadline() {
        let ctx = Context::background().with_timeout(std::time::Duration::from_millis(300));
        let err = Authenticator::connect(&ctx, "http://127.0.0.1:1", ["spanac"])
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::Context(ContextError::DeadlineExceeded)));
    }

    #[test]
    fn group_check_cases() {
        let both = claims(json!({"groups": ["b", "c"]}));
        assert!(authorize_groups(&["a", "b"], &both).is_ok());
        assert!(matches!(
            authorize_groups(&["a"], &claims(json!({"groups": ["c"]}))),
            Err(ScopeError::GroupMismatch)
        ));
        assert!(matches!(
            authorize_groups(&["a"], &claims(json!({"groups": 42}))),
            Err(ScopeError::GroupClaimMalformed)
        ));
        assert!(authorize_groups::<&str>(&[], &claims(json!({"groups": 42}))).is_ok());
        assert!(authorize_groups::<&str>(&[], &Claims::default()).is_ok());
    }

    #[test]
    fn redact_keeps_prefix_only() {
        let shown = redact("eyJhbGciOiJFZERTQSJ9.payload.signature");
        assert!(shown.starts_with("eyJhbGci"));
        assert!(!shown.contains("payload"));
    }
}
