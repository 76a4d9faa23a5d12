// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request Gate - request-scoped transactions and authorization
//!
//! Every inbound RPC gets exactly one database transaction bound to the
//! call's cancellation context. Optionally the caller's bearer token is
//! verified against the identity service and its groups are checked. The
//! transaction is always closed, committed or rolled back, exactly once.
//!
//! ## Modules
//!
//! - `context` - Cancellation and deadline scope of a call
//! - `scope` - The per-call transaction scope
//! - `auth` - Token verification, group checks, identity service dialing
//! - `storage` - Pool and transaction capabilities, embedded redb pool
//! - `error` - Errors and their RPC status mapping
//!
//! ## Usage
//!
//! ```rust,ignore
//! let auth = Authenticator::connect(&startup_ctx, &config.auth_target, config.audiences).await?;
//!
//! // inside a handler
//! let mut scope = auth
//!     .new_scope(&ctx, &span, &pool, false, None, token, &["admin"])
//!     .await?;
//! scope.enough_time(Duration::from_millis(50))?;
//! // ... statements on scope.tx() ...
//! scope.commit()?;
//! // scope closes on drop
//! ```

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod scope;
pub mod storage;

pub use auth::{Authenticator, Claims};
pub use context::{Context, ContextError};
pub use error::ScopeError;
pub use scope::TransactionScope;
pub use storage::{Pool, RedbPool, Transaction};
