// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Progression engine error types.

/// Errors surfaced by the progression core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transient storage failure. Retryable; callers must surface it so the
    /// UI can offer a retry, never drop it after a completion was detected.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A stats document that must exist (created at account sign-up) is
    /// missing. Programmer error, not retried.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Another writer already claimed the completion transition. Not a
    /// failure: the facade swallows this and reports "no reward due".
    #[error("completion transition already claimed by another writer")]
    LostRace,

    /// Advancement value outside `[0, max]`. The update is rejected and the
    /// prior record state is kept.
    #[error("invalid advancement measure {value} (allowed 0..={max})")]
    InvalidMeasure { value: u32, max: u32 },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
