// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Scope
//!
//! One `TransactionScope` per inbound call. It owns:
//!
//! - a context derived from the caller's, cancelled when the scope closes
//! - one open database transaction
//! - the verified claims, once authentication succeeded
//!
//! ## Lifecycle
//!
//! ```text
//! open ──► [enough_time]* ──► commit ──► close
//!   │                                      ▲
//!   └──────────── (error / panic) ─────────┘
//! ```
//!
//! `close` rolls back whatever is still open and cancels the derived context.
//! It runs on drop if the handler did not call it, so the transaction is
//! released on every exit path, panics included.

use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;

use crate::auth::Claims;
use crate::context::Context;
use crate::error::ScopeError;
use crate::storage::{Pool, Transaction, TxError, TxOptions};

/// Concurrency hint used for read-only scopes when the caller gives none.
pub const DEFAULT_READ_CONCURRENCY: usize = 1;

/// A database transaction bound to one call's context.
pub struct TransactionScope<T: Transaction> {
    ctx: Context,
    tx: T,
    read_only: bool,
    claims: Option<Claims>,
    span: tracing::Span,
    closed: bool,
}

impl<T: Transaction> TransactionScope<T> {
    /// Open a transaction on `pool` for the call described by `ctx`.
    ///
    /// Read-only scopes request a transaction spread over `concurrency`
    /// replica nodes (default 1). Read-write scopes use the master.
    pub async fn open<P>(
        ctx: &Context,
        log: &tracing::Span,
        pool: &P,
        read_only: bool,
        concurrency: Option<usize>,
    ) -> Result<Self, ScopeError>
    where
        P: Pool<Tx = T>,
    {
        let span = tracing::debug_span!(
            parent: log,
            "tx_scope",
            request_id = %uuid::Uuid::new_v4(),
            read_only,
        );

        if let Some(err) = ctx.err() {
            span.in_scope(|| tracing::warn!(error = %err, "Begin TX"));
            return Err(err.into());
        }

        let opened = if read_only {
            let max_nodes = concurrency.unwrap_or(DEFAULT_READ_CONCURRENCY);
            ctx.run(pool.read_tx(ctx, TxOptions::read_only(), max_nodes))
                .instrument(span.clone())
                .await
        } else {
            ctx.run(pool.write_tx(ctx, TxOptions::default()))
                .instrument(span.clone())
                .await
        };

        let tx = match opened {
            Ok(Ok(tx)) => tx,
            Ok(Err(err)) => {
                span.in_scope(|| tracing::error!(error = %err, "Begin TX"));
                return Err(err.into());
            }
            Err(err) => {
                span.in_scope(|| tracing::warn!(error = %err, "Begin TX"));
                return Err(err.into());
            }
        };
        span.in_scope(|| tracing::debug!("Begin TX"));

        Ok(Self {
            ctx: ctx.child(),
            tx,
            read_only,
            claims: None,
            span,
            closed: false,
        })
    }

    /// The context derived for this scope. Pass it to every downstream call.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Verified claims, if the scope was opened through the authenticator.
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// The open transaction, for running statements.
    pub fn tx(&self) -> &T {
        &self.tx
    }

    pub fn tx_mut(&mut self) -> &mut T {
        &mut self.tx
    }

    /// Attach verified claims. Only the authenticator sets them, once.
    pub(crate) fn set_claims(&mut self, claims: Claims) {
        debug_assert!(self.claims.is_none(), "claims are set once");
        self.claims.get_or_insert(claims);
    }

    /// Check that `need` still fits before the context's deadline.
    ///
    /// A zero `need` or a context without deadline always passes, unless the
    /// context is already done.
    pub fn enough_time(&self, need: Duration) -> Result<(), ScopeError> {
        let _entered = self.span.enter();

        if let Some(err) = self.ctx.err() {
            tracing::warn!(error = %err, "enough time");
            return Err(err.into());
        }

        let Some(deadline) = self.ctx.deadline() else {
            tracing::debug!(need = ?need, "enough time");
            return Ok(());
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !need.is_zero() && need > remaining {
            tracing::warn!(need = ?need, remaining = ?remaining, "Not enough time in context");
            return Err(ScopeError::NotEnoughTime);
        }
        tracing::debug!(need = ?need, remaining = ?remaining, "enough time");
        Ok(())
    }

    /// Commit the transaction.
    ///
    /// A second commit fails because the transaction is already finished.
    /// `close` must still run afterwards to release the derived context.
    pub fn commit(&mut self) -> Result<(), ScopeError> {
        let _entered = self.span.enter();
        match self.tx.commit() {
            Ok(()) => {
                tracing::debug!("TX commit");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "TX commit");
                Err(err.into())
            }
        }
    }

    /// Roll back whatever is still open and cancel the derived context.
    ///
    /// Never fails; rollback errors are logged. Safe to call after `commit`
    /// and more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let result = self.tx.rollback();
        self.ctx.cancel();

        let _entered = self.span.enter();
        match result {
            Ok(()) => tracing::debug!("TX rollback"),
            Err(TxError::Done) => tracing::debug!("TX rollback: already finished"),
            Err(err) => tracing::error!(error = %err, "TX rollback"),
        }
    }
}

impl<T: Transaction> Drop for TransactionScope<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transaction> std::fmt::Debug for TransactionScope<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("read_only", &self.read_only)
            .field("claims", &self.claims)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
