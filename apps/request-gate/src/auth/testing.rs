// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing fixtures for token tests.

use jsonwebtoken::{encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::Value;
use tonic::transport::Endpoint;

use super::client::AuthenticatorClient;
use super::verifier::RemoteVerifier;

/// Key id the fixture key is cached under.
pub const KID: &str = "k1";

/// Ed25519 private key, PKCS#8 DER.
const SIGNING_KEY: [u8; 48] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
    0x8a, 0xaf, 0xf3, 0xba, 0xb9, 0x04, 0xe5, 0xc4, 0x18, 0x1e, 0xcc, 0xe6, 0xf8, 0x18, 0x9a, 0xab,
    0xab, 0x24, 0x60, 0x99, 0xcc, 0xe2, 0x48, 0x70, 0x07, 0x71, 0x4f, 0x71, 0x7a, 0x34, 0x41, 0x99,
];

/// Matching raw 32-byte public key, as `GetPubKey` returns it.
pub const PUBLIC_KEY: [u8; 32] = [
    0xfb, 0x3e, 0x5d, 0xaf, 0xfe, 0x94, 0x4e, 0xc4, 0x0f, 0xba, 0xc8, 0x18, 0x3d, 0x22, 0xdc, 0x22,
    0x2e, 0x2f, 0x08, 0x87, 0x18, 0x34, 0x61, 0xe2, 0xc4, 0xa9, 0x0f, 0x32, 0x2e, 0x6d, 0x99, 0xb4,
];

/// Sign `claims` with the fixture key under `kid`.
pub fn sign(kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_ed_der(&SIGNING_KEY)).unwrap()
}

/// Seconds since the epoch shifted by `offset`.
pub fn now_plus(offset: i64) -> u64 {
    get_current_timestamp().saturating_add_signed(offset)
}

/// Verifier whose channel points at a closed port; never connects.
pub fn unreachable_verifier(audiences: &[&str]) -> RemoteVerifier {
    let channel = Endpoint::from_static("http://127.0.0.1:1").connect_lazy();
    RemoteVerifier::new(
        AuthenticatorClient::new(channel),
        audiences.iter().map(|a| a.to_string()).collect(),
    )
}

/// Unreachable verifier that already holds the fixture key under [`KID`].
pub async fn verifier_with_key(audiences: &[&str]) -> RemoteVerifier {
    let verifier = unreachable_verifier(audiences);
    verifier
        .cache_key(KID, DecodingKey::from_ed_der(&PUBLIC_KEY))
        .await;
    verifier
}
