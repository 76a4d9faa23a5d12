// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded multi-node pool backed by redb (pure Rust, ACID).
//!
//! ## Node Layout
//!
//! - one **master** database file receives every read-write transaction
//! - zero or more **replica** files serve read transactions
//!
//! Read transactions are spread over up to `max_nodes` replicas, starting at a
//! rotating offset so consecutive requests land on different nodes. With no
//! replicas configured the master serves reads too.
//!
//! Keeping replica files in sync with the master is the deployment's job.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableDatabase, WriteTransaction};

use super::{Pool, PoolError, Transaction, TxError, TxOptions};
use crate::context::Context;

// =============================================================================
// Nodes
// =============================================================================

/// One database file in the pool.
struct Node {
    name: String,
    db: Arc<Database>,
}

impl Node {
    fn open(path: &Path) -> Result<Self, PoolError> {
        let name = path.display().to_string();
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PoolError::node(&name, e))?;
        }
        let db = Database::create(path).map_err(|e| PoolError::node(&name, e))?;
        Ok(Self {
            name,
            db: Arc::new(db),
        })
    }
}

// =============================================================================
// RedbPool
// =============================================================================

/// Master/replica pool of redb databases.
pub struct RedbPool {
    master: Node,
    replicas: Vec<Node>,
    next_replica: AtomicUsize,
}

impl RedbPool {
    /// Open (or create) the master and replica database files.
    pub fn open<P: AsRef<Path>>(master: P, replicas: &[P]) -> Result<Self, PoolError> {
        let master = Node::open(master.as_ref())?;
        let replicas = replicas
            .iter()
            .map(|p| Node::open(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            master = %master.name,
            replicas = replicas.len(),
            "Opened database pool"
        );

        Ok(Self {
            master,
            replicas,
            next_replica: AtomicUsize::new(0),
        })
    }

    /// The master database, for schema setup and maintenance.
    pub fn master(&self) -> &Database {
        &self.master.db
    }

    /// Number of nodes that serve read transactions.
    pub fn read_nodes(&self) -> usize {
        self.replicas.len().max(1)
    }

    /// Pick up to `max_nodes` read nodes, rotating the starting replica.
    fn pick_read_nodes(&self, max_nodes: usize) -> Vec<&Node> {
        if self.replicas.is_empty() {
            return vec![&self.master];
        }
        let count = max_nodes.clamp(1, self.replicas.len());
        let start = self.next_replica.fetch_add(1, Ordering::Relaxed);
        (0..count)
            .map(|i| &self.replicas[(start + i) % self.replicas.len()])
            .collect()
    }
}

/// Run a blocking redb call on the blocking pool, giving up when `ctx` ends.
///
/// A call abandoned this way still finishes on its thread; whatever it opened
/// is dropped (and so closed or aborted) there.
async fn blocking<T, F>(ctx: &Context, node: &str, call: F) -> Result<T, PoolError>
where
    F: FnOnce() -> Result<T, PoolError> + Send + 'static,
    T: Send + 'static,
{
    match ctx.run(tokio::task::spawn_blocking(call)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(PoolError::Task(join.to_string())),
        Err(err) => Err(PoolError::node(node, err)),
    }
}

impl Pool for RedbPool {
    type Tx = RedbTx;

    async fn read_tx(
        &self,
        ctx: &Context,
        _options: TxOptions,
        max_nodes: usize,
    ) -> Result<RedbTx, PoolError> {
        let nodes: Vec<(String, Arc<Database>)> = self
            .pick_read_nodes(max_nodes)
            .into_iter()
            .map(|node| (node.name.clone(), Arc::clone(&node.db)))
            .collect();
        let label = nodes
            .first()
            .map(|(name, _)| name.clone())
            .ok_or(PoolError::NoNodes)?;

        let reads = blocking(ctx, &label, move || {
            nodes
                .iter()
                .map(|(name, db)| db.begin_read().map_err(|e| PoolError::node(name, e)))
                .collect::<Result<Vec<_>, _>>()
        })
        .await?;

        Ok(RedbTx {
            state: TxState::Read(reads),
        })
    }

    async fn write_tx(&self, ctx: &Context, _options: TxOptions) -> Result<RedbTx, PoolError> {
        let name = self.master.name.clone();
        let db = Arc::clone(&self.master.db);
        // Waits for any other open write transaction on the master to finish
        let txn = blocking(ctx, &self.master.name, move || {
            db.begin_write().map_err(|e| PoolError::node(&name, e))
        })
        .await?;

        Ok(RedbTx {
            state: TxState::Write(Box::new(txn)),
        })
    }
}

// =============================================================================
// RedbTx
// =============================================================================

enum TxState {
    Read(Vec<ReadTransaction>),
    Write(Box<WriteTransaction>),
    Done,
}

/// A transaction handle from [`RedbPool`].
///
/// Read transactions hold one redb read transaction per selected node.
pub struct RedbTx {
    state: TxState,
}

impl RedbTx {
    /// The read transactions, one per node. Empty for write or finished
    /// transactions.
    pub fn reads(&self) -> &[ReadTransaction] {
        match &self.state {
            TxState::Read(reads) => reads,
            _ => &[],
        }
    }

    /// The write transaction, if this is an open read-write transaction.
    pub fn write(&self) -> Option<&WriteTransaction> {
        match &self.state {
            TxState::Write(txn) => Some(txn.as_ref()),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, TxState::Done)
    }

    fn take(&mut self) -> TxState {
        std::mem::replace(&mut self.state, TxState::Done)
    }
}

/// Close every read transaction, reporting the first failure.
fn close_reads(reads: Vec<ReadTransaction>) -> Result<(), TxError> {
    let mut first_err = None;
    for txn in reads {
        if let Err(e) = txn.close() {
            first_err.get_or_insert(TxError::backend(e));
        }
    }
    first_err.map_or(Ok(()), Err)
}

impl Transaction for RedbTx {
    fn commit(&mut self) -> Result<(), TxError> {
        match self.take() {
            TxState::Read(reads) => close_reads(reads),
            TxState::Write(txn) => txn.commit().map_err(TxError::backend),
            TxState::Done => Err(TxError::Done),
        }
    }

    fn rollback(&mut self) -> Result<(), TxError> {
        match self.take() {
            TxState::Read(reads) => close_reads(reads),
            TxState::Write(txn) => txn.abort().map_err(TxError::backend),
            TxState::Done => Err(TxError::Done),
        }
    }
}
