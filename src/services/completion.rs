// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Completion transition detection.
//!
//! Pure functions, deliberately separated from persistence so the
//! transition can be evaluated before any write occurs. This is what
//! prevents the write-then-detect race where a second concurrent update
//! sees `completed` already true and the first never claims the reward.

use crate::models::ProgressRecord;

/// True iff `next` crosses into the completed state that `previous` had
/// not reached: the previous record is not completed and the new
/// advancement measure equals its maximum.
///
/// Repeated submission of already-maximal values after completion returns
/// false; the reward must not re-fire.
pub fn was_just_completed(previous: &ProgressRecord, next: &ProgressRecord) -> bool {
    !previous.completed && next.advancement.is_maximal()
}
