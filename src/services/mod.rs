// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - progression business logic.

pub mod award;
pub mod completion;
pub mod tracker;

pub use award::XpAwardService;
pub use tracker::{EntitySession, ProgressOutcome, ProgressTracker};
