// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified JWT claim set.
//!
//! The identity service controls the shape of the claims, so the set is kept
//! as a loose JSON map. Typed values are pulled out through explicit decode
//! steps that report malformed data instead of guessing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the claim that lists the user's groups.
pub const GROUPS_CLAIM: &str = "groups";

/// Why a claim could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    #[error("claim {0:?} is missing")]
    Missing(&'static str),

    #[error("claim {0:?} is malformed")]
    Malformed(&'static str),
}

/// Claims of a verified token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Raw claim value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Subject (user ID), when present as a string.
    pub fn subject(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    /// Decode the `groups` claim as a list of strings.
    pub fn groups(&self) -> Result<Vec<&str>, ClaimError> {
        let value = self
            .0
            .get(GROUPS_CLAIM)
            .ok_or(ClaimError::Missing(GROUPS_CLAIM))?;
        let entries = value
            .as_array()
            .ok_or(ClaimError::Malformed(GROUPS_CLAIM))?;
        entries
            .iter()
            .map(|g| g.as_str().ok_or(ClaimError::Malformed(GROUPS_CLAIM)))
            .collect()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// True if any required group is among the claimed ones. Exact,
/// case-sensitive match.
pub fn has_any_group<R: AsRef<str>>(required: &[R], claimed: &[&str]) -> bool {
    required
        .iter()
        .any(|r| claimed.contains(&r.as_ref()))
}
