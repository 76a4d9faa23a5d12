// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Connection Retrier
//!
//! Dials the identity service and keeps trying until it answers or the
//! caller's context is done. The service may still be starting when this
//! process comes up, so a slow or refused dial is not fatal.
//!
//! ## Strategy
//!
//! Each attempt gets its own window (5 s, or less if the caller's deadline
//! is closer). Inside a window the dial blocks until the channel is up,
//! re-dialing refused connections after a short pause. When a window
//! closes without a channel the retrier logs a warning and starts the next
//! one. A target that cannot be parsed fails at once.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, warn};

use super::error::ConnectError;
use crate::context::{Context, ContextError};

/// Length of one dial attempt.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between refused connects inside one attempt.
const REDIAL_PAUSE: Duration = Duration::from_millis(250);

/// Dials a target with bounded, context-aware retries.
#[derive(Debug)]
pub struct ConnectionRetrier {
    attempt_timeout: Duration,
    redial_pause: Duration,
    dials: AtomicUsize,
}

impl Default for ConnectionRetrier {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRetrier {
    pub fn new() -> Self {
        Self {
            attempt_timeout: ATTEMPT_TIMEOUT,
            redial_pause: REDIAL_PAUSE,
            dials: AtomicUsize::new(0),
        }
    }

    /// Number of dials this retrier has made.
    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::Relaxed)
    }

    /// Override the attempt window.
    #[cfg(test)]
    fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Connect a gRPC channel to `target`.
    pub async fn attempt_connect(
        &self,
        ctx: &Context,
        target: &str,
    ) -> Result<Channel, ConnectError> {
        let endpoint =
            Endpoint::from_shared(target.to_string()).map_err(|e| ConnectError::InvalidTarget {
                target: target.to_string(),
                reason: e.to_string(),
            })?;
        let endpoint = &endpoint.connect_timeout(self.attempt_timeout);

        self.retry(ctx, target, move || async move {
            Ok(self.dial_until_connected(endpoint, target).await)
        })
        .await
    }

    /// Dial until the channel is up. Refused connects are retried; the caller
    /// bounds this with the attempt window.
    async fn dial_until_connected(&self, endpoint: &Endpoint, target: &str) -> Channel {
        loop {
            let dial = self.dials.fetch_add(1, Ordering::Relaxed) + 1;
            match endpoint.connect().await {
                Ok(channel) => return channel,
                Err(e) => {
                    debug!(endpoint = %target, dial, error = %e, "gRPC dial refused, redialing");
                    tokio::time::sleep(self.redial_pause).await;
                }
            }
        }
    }

    /// Run `dial` in attempt windows until it succeeds, fails, or `ctx` ends.
    async fn retry<C, F, Fut>(&self, ctx: &Context, target: &str, mut dial: F) -> Result<C, ConnectError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<C, ConnectError>>,
    {
        loop {
            if let Some(err) = ctx.err() {
                return Err(err.into());
            }

            let attempt = ctx.with_timeout(self.attempt_timeout);
            match attempt.run(dial()).await {
                Ok(Ok(conn)) => return Ok(conn),
                Ok(Err(err)) => return Err(err),
                Err(ContextError::DeadlineExceeded) => {
                    warn!(
                        endpoint = %target,
                        timeout_secs = self.attempt_timeout.as_secs_f64(),
                        "gRPC dial timed out, retrying"
                    );
                }
                Err(ContextError::Canceled) => return Err(ContextError::Canceled.into()),
            }
        }
    }
}

/// Connect with the default retrier, logging start and outcome.
pub async fn attempt_connect(ctx: &Context, target: &str) -> Result<Channel, ConnectError> {
    info!(endpoint = %target, "Start gRPC dial");
    let retrier = ConnectionRetrier::new();
    match retrier.attempt_connect(ctx, target).await {
        Ok(channel) => {
            info!(endpoint = %target, dials = retrier.dials(), "gRPC dial done");
            Ok(channel)
        }
        Err(err) => {
            tracing::error!(
                endpoint = %target,
                dials = retrier.dials(),
                error = %err,
                "gRPC dial failed"
            );
            Err(err)
        }
    }
}
