// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! [`RemoteVerifier`] resolves signing keys through the identity service and
//! validates tokens locally:
//!
//! 1. Decode the JWT header and read `kid`
//! 2. Look the key up in the cache, or fetch it with `GetPubKey`
//! 3. Verify the EdDSA signature, expiry and audience
//! 4. Return the claim set
//!
//! Keys never change under a given `kid`, so cached keys do not expire.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::client::AuthenticatorClient;
use super::error::{TokenFault, VerifyError};
use super::Claims;
use crate::context::Context;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Anything that turns a bearer token into verified claims.
pub trait TokenVerifier {
    fn verify_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> impl Future<Output = Result<Claims, VerifyError>>;
}

/// Verifier backed by the identity service.
#[derive(Clone)]
pub struct RemoteVerifier {
    client: AuthenticatorClient,
    audiences: Vec<String>,
    keys: Arc<RwLock<HashMap<String, DecodingKey>>>,
}

impl RemoteVerifier {
    /// Create a verifier that accepts tokens for any of `audiences`.
    ///
    /// With no audiences, the `aud` claim is not checked.
    pub fn new(client: AuthenticatorClient, audiences: Vec<String>) -> Self {
        Self {
            client,
            audiences,
            keys: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn audiences(&self) -> &[String] {
        &self.audiences
    }

    /// Check if the key for `kid` is cached.
    pub async fn is_cached(&self, kid: &str) -> bool {
        self.keys.read().await.contains_key(kid)
    }

    /// Get the decoding key for `kid` (with caching).
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, VerifyError> {
        // Check cache first
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        let public = self.client.clone().get_pub_key(kid).await.map_err(|status| {
            if status.code() == tonic::Code::NotFound {
                VerifyError::Token(TokenFault::UnknownKey)
            } else {
                VerifyError::Transport(status)
            }
        })?;
        if public.key.is_empty() {
            return Err(VerifyError::InvalidKey(format!("empty key for kid {kid:?}")));
        }
        let key = DecodingKey::from_ed_der(&public.key);
        self.cache_key(kid, key.clone()).await;
        Ok(key)
    }

    pub(crate) async fn cache_key(&self, kid: &str, key: DecodingKey) {
        self.keys.write().await.insert(kid.to_string(), key);
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        if self.audiences.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&self.audiences);
        }
        validation
    }

    async fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        let header = decode_header(token).map_err(|_| TokenFault::Malformed)?;
        if header.alg != Algorithm::EdDSA {
            return Err(TokenFault::InvalidSignature.into());
        }
        let kid = header.kid.ok_or(TokenFault::UnknownKey)?;

        let key = self.decoding_key(&kid).await?;
        let data = decode::<Map<String, Value>>(token, &key, &self.validation())
            .map_err(|e| TokenFault::from_jwt(&e))?;

        Ok(Claims::new(data.claims))
    }
}

impl TokenVerifier for RemoteVerifier {
    async fn verify_token(&self, ctx: &Context, token: &str) -> Result<Claims, VerifyError> {
        ctx.run(self.verify(token)).await?
    }
}

impl std::fmt::Debug for RemoteVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteVerifier")
            .field("audiences", &self.audiences)
            .finish_non_exhaustive()
    }
}
