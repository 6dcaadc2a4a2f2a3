//! Engine tuning knobs.

use crate::error::{OrderingError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Base offset added to every position during the first phase of a rewrite.
pub const DEFAULT_SHIFT_OFFSET: i64 = 1_000_000;

/// Upper bound on the number of ids accepted in one reorder request.
pub const DEFAULT_MAX_REORDER_LEN: usize = 10_000;

/// What a reorder does with ids that are not members of the target scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForeignIdPolicy {
    /// Ignore them and reorder the ids that do belong.
    #[default]
    Drop,
    /// Fail the whole call with `ScopeViolation` before anything is written.
    Reject,
}

impl FromStr for ForeignIdPolicy {
    type Err = OrderingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "reject" => Ok(Self::Reject),
            other => Err(OrderingError::malformed(
                "foreign_id_policy",
                format!("expected `drop` or `reject`, got `{}`", other),
            )),
        }
    }
}

/// Configuration for [`OrderedCollection`](crate::OrderedCollection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingConfig {
    /// Minimum offset for the disjoint shift of a two-phase rewrite.
    pub shift_offset: i64,

    /// Renumber a scope to `0..n-1` after every removal.
    pub compact_on_remove: bool,

    /// Handling of ids that do not belong to the scope being reordered.
    pub foreign_id_policy: ForeignIdPolicy,

    /// Longest id list a reorder request may carry.
    pub max_reorder_len: usize,

    /// Attempts after the first when the store reports lock contention.
    pub max_retries: u32,

    /// Backoff step between retries (multiplied by the attempt number).
    pub retry_backoff: Duration,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            shift_offset: DEFAULT_SHIFT_OFFSET,
            compact_on_remove: true,
            foreign_id_policy: ForeignIdPolicy::Drop,
            max_reorder_len: DEFAULT_MAX_REORDER_LEN,
            max_retries: 3,
            retry_backoff: Duration::from_millis(25),
        }
    }
}

impl OrderingConfig {
    pub fn with_shift_offset(mut self, offset: i64) -> Self {
        self.shift_offset = offset;
        self
    }

    pub fn with_compact_on_remove(mut self, enabled: bool) -> Self {
        self.compact_on_remove = enabled;
        self
    }

    pub fn with_foreign_id_policy(mut self, policy: ForeignIdPolicy) -> Self {
        self.foreign_id_policy = policy;
        self
    }

    pub fn with_max_reorder_len(mut self, len: usize) -> Self {
        self.max_reorder_len = len;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.shift_offset <= 0 {
            return Err(OrderingError::malformed(
                "shift_offset",
                "must be greater than 0",
            ));
        }

        if self.max_reorder_len == 0 {
            return Err(OrderingError::malformed(
                "max_reorder_len",
                "must be greater than 0",
            ));
        }

        if self.max_retries > 10 {
            return Err(OrderingError::malformed(
                "max_retries",
                "more than 10 retries would hold callers for too long",
            ));
        }

        Ok(())
    }
}
