// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token verification and connection errors.

use crate::context::ContextError;

/// What is wrong with a rejected token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFault {
    /// Token is malformed
    Malformed,
    /// Token signature is invalid
    InvalidSignature,
    /// Token has expired
    Expired,
    /// Token is not yet valid
    NotYetValid,
    /// Token audience is not accepted
    InvalidAudience,
    /// Token names a key the identity service does not know
    UnknownKey,
}

impl TokenFault {
    /// Get the error code for this fault.
    pub fn error_code(&self) -> &'static str {
        match self {
            TokenFault::Malformed => "malformed_token",
            TokenFault::InvalidSignature => "invalid_signature",
            TokenFault::Expired => "token_expired",
            TokenFault::NotYetValid => "token_not_yet_valid",
            TokenFault::InvalidAudience => "invalid_audience",
            TokenFault::UnknownKey => "unknown_key",
        }
    }

    pub(crate) fn from_jwt(err: &jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenFault::Expired,
            ErrorKind::InvalidSignature => TokenFault::InvalidSignature,
            ErrorKind::InvalidAudience => TokenFault::InvalidAudience,
            ErrorKind::ImmatureSignature => TokenFault::NotYetValid,
            _ => TokenFault::Malformed,
        }
    }
}

impl std::fmt::Display for TokenFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenFault::Malformed => write!(f, "Token is malformed"),
            TokenFault::InvalidSignature => write!(f, "Token signature is invalid"),
            TokenFault::Expired => write!(f, "Token has expired"),
            TokenFault::NotYetValid => write!(f, "Token is not yet valid"),
            TokenFault::InvalidAudience => write!(f, "Token audience is invalid"),
            TokenFault::UnknownKey => write!(f, "Token key is unknown"),
        }
    }
}

/// Token verification failure.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The token itself was rejected.
    #[error("{0}")]
    Token(TokenFault),

    /// The identity service could not be asked.
    #[error("identity service call failed: {0}")]
    Transport(#[from] tonic::Status),

    /// The identity service answered with something unusable.
    #[error("identity service returned an invalid key: {0}")]
    InvalidKey(String),

    /// The caller's context finished while verifying.
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl VerifyError {
    /// True when the token is at fault, as opposed to the service.
    pub fn is_token_fault(&self) -> bool {
        matches!(self, VerifyError::Token(_))
    }
}

impl From<TokenFault> for VerifyError {
    fn from(fault: TokenFault) -> Self {
        VerifyError::Token(fault)
    }
}

/// Failure to establish the channel to the identity service.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("invalid target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },
}
