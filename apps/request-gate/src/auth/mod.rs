// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer token verification against the identity service and group-based
//! authorization for transaction scopes.
//!
//! ## Auth Flow
//!
//! 1. At startup, dial the identity service (`dial`), retrying while it
//!    comes up
//! 2. Per call, open a transaction scope, then verify the token:
//!    - resolve the signing key via `GetPubKey` (cached)
//!    - verify signature, expiry and audience
//! 3. If groups are required, the token's `groups` claim must name one
//! 4. Any failure rolls the transaction back before the error is returned
//!
//! ## Security
//!
//! - Tokens are never logged in full
//! - Identity service failures surface as a generic internal error
//! - Clock skew tolerance is 60 seconds

pub mod authenticator;
pub mod claims;
pub mod client;
pub mod dial;
pub mod error;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use authenticator::{authorize_groups, Authenticator};
pub use claims::{ClaimError, Claims, GROUPS_CLAIM};
pub use client::AuthenticatorClient;
pub use dial::ConnectionRetrier;
pub use error::{ConnectError, TokenFault, VerifyError};
pub use verifier::{RemoteVerifier, TokenVerifier};
