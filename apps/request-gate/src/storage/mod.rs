// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Capabilities
//!
//! The request gate does not run statements itself. It needs two things from
//! the database layer:
//!
//! - a **pool** that opens a read transaction fanned across up to N replica
//!   nodes, or a read-write transaction on the master
//! - a **transaction handle** that can be committed or rolled back
//!
//! Node selection, failover and retry belong to the pool implementation.
//! [`RedbPool`] is the embedded implementation shipped with this crate.

use std::future::Future;

use crate::context::Context;

pub mod redb_pool;

#[cfg(test)]
pub(crate) mod mock;

pub use redb_pool::{RedbPool, RedbTx};

/// Options passed to the pool when a transaction is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub read_only: bool,
}

impl TxOptions {
    pub fn read_only() -> Self {
        Self { read_only: true }
    }
}

/// Errors raised while opening a transaction.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("no database nodes available")]
    NoNodes,

    #[error("node {node}: {source}")]
    Node {
        node: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("pool task failed: {0}")]
    Task(String),
}

impl PoolError {
    pub fn node(
        node: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        PoolError::Node {
            node: node.into(),
            source: source.into(),
        }
    }
}

/// Errors raised while finishing a transaction.
#[derive(Debug, thiserror::Error)]
pub enum TxError {
    /// Commit or rollback was already performed.
    #[error("transaction has already been committed or rolled back")]
    Done,

    #[error("transaction backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TxError {
    pub fn backend(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        TxError::Backend(source.into())
    }
}

/// An open database transaction.
///
/// At most one of `commit` / `rollback` succeeds; every later call returns
/// [`TxError::Done`].
pub trait Transaction {
    fn commit(&mut self) -> Result<(), TxError>;
    fn rollback(&mut self) -> Result<(), TxError>;
}

/// A multi-node database pool.
pub trait Pool {
    type Tx: Transaction;

    /// Open a read transaction spread over at most `max_nodes` nodes.
    fn read_tx(
        &self,
        ctx: &Context,
        options: TxOptions,
        max_nodes: usize,
    ) -> impl Future<Output = Result<Self::Tx, PoolError>>;

    /// Open a read-write transaction on the master node.
    fn write_tx(
        &self,
        ctx: &Context,
        options: TxOptions,
    ) -> impl Future<Output = Result<Self::Tx, PoolError>>;
}
