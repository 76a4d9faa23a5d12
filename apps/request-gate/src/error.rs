// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors surfaced to RPC handlers.
//!
//! Display strings are the user-facing messages. Underlying causes are kept
//! as sources for logging and are never part of the message.

use tonic::{Code, Status};

use crate::context::ContextError;
use crate::storage::{PoolError, TxError};

/// Returned when the context cannot fit an announced unit of work.
pub const ERR_NOT_ENOUGH_TIME: &str = "Not enough time in context";
/// Returned for any transaction open or commit failure.
pub const ERR_DB: &str = "Database error";
/// Returned when the identity service fails for reasons other than the token.
pub const ERR_AUTH: &str = "Authentication server error";
/// Returned when the group check fails.
pub const ERR_GROUP: &str = "User not in required group";
/// Returned when the token itself is rejected.
pub const ERR_UNAUTHORIZED: &str = "Unauthorized";

/// Where a database failure happened.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseFault {
    #[error("begin transaction: {0}")]
    Begin(#[from] PoolError),

    #[error("commit transaction: {0}")]
    Commit(#[from] TxError),
}

/// Classified request-scope error.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// The caller's context is cancelled or past its deadline.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Not enough time left before the deadline for the announced work.
    #[error("{}", ERR_NOT_ENOUGH_TIME)]
    NotEnoughTime,

    /// Opening or committing the transaction failed.
    #[error("{}", ERR_DB)]
    Database(#[source] DatabaseFault),

    /// The identity service was unreachable or failed internally.
    #[error("{}", ERR_AUTH)]
    AuthServer(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The token is malformed, expired, badly signed or for another audience.
    #[error("{}", ERR_UNAUTHORIZED)]
    Unauthenticated(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The `groups` claim is present but is not a list of strings.
    #[error("{}", ERR_GROUP)]
    GroupClaimMalformed,

    /// None of the required groups were claimed.
    #[error("{}", ERR_GROUP)]
    GroupMismatch,
}

impl ScopeError {
    /// Stable identifier for logs and metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            ScopeError::Context(ContextError::Canceled) => "context_canceled",
            ScopeError::Context(ContextError::DeadlineExceeded) => "deadline_exceeded",
            ScopeError::NotEnoughTime => "not_enough_time",
            ScopeError::Database(_) => "database_error",
            ScopeError::AuthServer(_) => "auth_server_error",
            ScopeError::Unauthenticated(_) => "unauthenticated",
            ScopeError::GroupClaimMalformed => "group_claim_malformed",
            ScopeError::GroupMismatch => "group_mismatch",
        }
    }

    /// RPC status code for this error.
    pub fn code(&self) -> Code {
        match self {
            ScopeError::Context(ContextError::Canceled) => Code::Cancelled,
            ScopeError::Context(ContextError::DeadlineExceeded) => Code::DeadlineExceeded,
            ScopeError::NotEnoughTime => Code::Aborted,
            ScopeError::Database(_) | ScopeError::AuthServer(_) => Code::Internal,
            ScopeError::Unauthenticated(_) | ScopeError::GroupMismatch => Code::Unauthenticated,
            ScopeError::GroupClaimMalformed => Code::InvalidArgument,
        }
    }
}

impl From<PoolError> for ScopeError {
    fn from(err: PoolError) -> Self {
        ScopeError::Database(DatabaseFault::Begin(err))
    }
}

impl From<TxError> for ScopeError {
    fn from(err: TxError) -> Self {
        ScopeError::Database(DatabaseFault::Commit(err))
    }
}

impl From<ScopeError> for Status {
    fn from(err: ScopeError) -> Self {
        Status::new(err.code(), err.to_string())
    }
}
