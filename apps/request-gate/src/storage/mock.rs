// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory pool that records what happened to every transaction it handed
//! out. Test-only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{Pool, PoolError, Transaction, TxError, TxOptions};
use crate::context::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Open,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    pub read_only: bool,
    pub nodes: usize,
    pub outcome: TxOutcome,
}

#[derive(Default)]
pub struct MockPool {
    records: Arc<Mutex<Vec<TxRecord>>>,
    fail_open: bool,
    fail_commit: bool,
    rollback_calls: Arc<AtomicUsize>,
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn failing_commit() -> Self {
        Self {
            fail_commit: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<TxRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.records()
            .iter()
            .filter(|r| r.outcome == TxOutcome::Open)
            .count()
    }

    pub fn rollback_calls(&self) -> usize {
        self.rollback_calls.load(Ordering::SeqCst)
    }

    fn open(&self, ctx: &Context, read_only: bool, nodes: usize) -> Result<MockTx, PoolError> {
        if let Some(err) = ctx.err() {
            return Err(PoolError::node("mock", err));
        }
        if self.fail_open {
            return Err(PoolError::NoNodes);
        }
        let mut records = self.records.lock().unwrap();
        records.push(TxRecord {
            read_only,
            nodes,
            outcome: TxOutcome::Open,
        });
        Ok(MockTx {
            index: records.len() - 1,
            records: Arc::clone(&self.records),
            fail_commit: self.fail_commit,
            rollback_calls: Arc::clone(&self.rollback_calls),
        })
    }
}

impl Pool for MockPool {
    type Tx = MockTx;

    async fn read_tx(
        &self,
        ctx: &Context,
        options: TxOptions,
        max_nodes: usize,
    ) -> Result<MockTx, PoolError> {
        assert!(options.read_only);
        self.open(ctx, true, max_nodes)
    }

    async fn write_tx(&self, ctx: &Context, options: TxOptions) -> Result<MockTx, PoolError> {
        assert!(!options.read_only);
        self.open(ctx, false, 1)
    }
}

pub struct MockTx {
    index: usize,
    records: Arc<Mutex<Vec<TxRecord>>>,
    fail_commit: bool,
    rollback_calls: Arc<AtomicUsize>,
}

impl MockTx {
    fn finish(&mut self, outcome: TxOutcome) -> Result<(), TxError> {
        let mut records = self.records.lock().unwrap();
        let record = &mut records[self.index];
        if record.outcome != TxOutcome::Open {
            return Err(TxError::Done);
        }
        record.outcome = outcome;
        Ok(())
    }
}

impl Transaction for MockTx {
    fn commit(&mut self) -> Result<(), TxError> {
        if self.fail_commit {
            // A failed commit still ends the transaction
            self.finish(TxOutcome::RolledBack)?;
            return Err(TxError::backend("commit refused"));
        }
        self.finish(TxOutcome::Committed)
    }

    fn rollback(&mut self) -> Result<(), TxError> {
        self.rollback_calls.fetch_add(1, Ordering::SeqCst);
        self.finish(TxOutcome::RolledBack)
    }
}
