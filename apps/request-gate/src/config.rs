// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! to wire the gate into a service. Configuration is loaded from the
//! environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH_TARGET` | Identity service URI (e.g. `http://auth:8765`) | Required |
//! | `AUTH_AUDIENCES` | Comma-separated accepted token audiences | empty (not checked) |
//! | `DB_MASTER_PATH` | Master database file | Required |
//! | `DB_REPLICA_PATHS` | Comma-separated replica database files | empty |
//! | `DB_READ_CONCURRENCY` | Default node count for read-only scopes | `1` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;

use crate::logging::LogFormat;
use crate::scope::DEFAULT_READ_CONCURRENCY;

pub const AUTH_TARGET_ENV: &str = "AUTH_TARGET";
pub const AUTH_AUDIENCES_ENV: &str = "AUTH_AUDIENCES";
pub const DB_MASTER_PATH_ENV: &str = "DB_MASTER_PATH";
pub const DB_REPLICA_PATHS_ENV: &str = "DB_REPLICA_PATHS";
pub const DB_READ_CONCURRENCY_ENV: &str = "DB_READ_CONCURRENCY";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Settings for the gate's collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub auth_target: String,
    pub audiences: Vec<String>,
    pub master_path: PathBuf,
    pub replica_paths: Vec<PathBuf>,
    pub read_concurrency: usize,
    pub log_format: LogFormat,
}

impl GateConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let read_concurrency = match lookup(DB_READ_CONCURRENCY_ENV) {
            None => DEFAULT_READ_CONCURRENCY,
            Some(value) => match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: DB_READ_CONCURRENCY_ENV,
                        value,
                    })
                }
            },
        };

        Ok(Self {
            auth_target: required(AUTH_TARGET_ENV)?,
            audiences: split_list(lookup(AUTH_AUDIENCES_ENV)),
            master_path: PathBuf::from(required(DB_MASTER_PATH_ENV)?),
            replica_paths: split_list(lookup(DB_REPLICA_PATHS_ENV))
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            read_concurrency,
            log_format: LogFormat::parse(lookup(LOG_FORMAT_ENV).as_deref()),
        })
    }
}

/// Split a comma-separated list, dropping blanks.
fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
