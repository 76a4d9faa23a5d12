// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! gRPC client for the identity service's key endpoint.
//!
//! ```proto
//! package auth;
//!
//! service Authenticator {
//!   rpc GetPubKey(KeyID) returns (PublicKey);
//! }
//!
//! message KeyID     { string kid = 1; }
//! message PublicKey { bytes key = 1; }
//! ```

use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

/// Request for the public key with the given key ID.
#[derive(Clone, PartialEq, prost::Message)]
pub struct KeyId {
    #[prost(string, tag = "1")]
    pub kid: String,
}

/// Raw Ed25519 public key bytes.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PublicKey {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
}

const GET_PUB_KEY: &str = "/auth.Authenticator/GetPubKey";

/// Client for `auth.Authenticator`. Cheap to clone; clones share the channel.
#[derive(Debug, Clone)]
pub struct AuthenticatorClient {
    inner: tonic::client::Grpc<Channel>,
}

impl AuthenticatorClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    /// Fetch the public key registered under `kid`.
    pub async fn get_pub_key(&mut self, kid: &str) -> Result<PublicKey, tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unavailable(format!("Service was not ready: {e}")))?;
        let codec = tonic::codec::ProstCodec::default();
        let path = PathAndQuery::from_static(GET_PUB_KEY);
        let request = tonic::Request::new(KeyId {
            kid: kid.to_string(),
        });
        let response = self.inner.unary(request, path, codec).await?;
        Ok(response.into_inner())
    }
}
