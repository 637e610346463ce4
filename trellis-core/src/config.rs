//! Runtime configuration.
//!
//! Hosts typically embed [`RuntimeOptions`] in their own configuration file;
//! every field has a default so partial documents deserialize.

use serde::{Deserialize, Serialize};

/// Tunables for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Maximum number of flush rounds before the runtime gives up with
    /// [`ReactiveError::RunawayFlush`](crate::ReactiveError::RunawayFlush).
    ///
    /// A round is one pass over the effects queued so far; effects queued
    /// while a round runs go into the next one. Effects that keep writing
    /// what they read never settle.
    pub max_flush_rounds: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            max_flush_rounds: 100,
        }
    }
}

impl RuntimeOptions {
    /// Set [`max_flush_rounds`](Self::max_flush_rounds). Zero is raised to one.
    pub fn with_max_flush_rounds(mut self, rounds: usize) -> Self {
        self.max_flush_rounds = rounds.max(1);
        self
    }
}
