/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-run conflicts, advisory warnings and packing statistics.
//!
//! A run with conflicts still returns every session it **did** place.  The
//! collector is the single place that records what was left out, so the
//! accounting invariant holds:
//!
//! ```text
//! stats.placed_units + conflicts.len() == stats.requested_units
//! ```
//!
//! Warnings never change the schedule; they are advice for whoever reviews
//! the draft (tight packing, rounded-up lab blocks, dropped locks, …).

use serde::Serialize;
use tracing::warn;

use crate::course::{CourseRequirement, SessionType};
use crate::grid::Grid;

use super::error::ConflictReason;

/// Occupancy fraction of available cells above which a run is reported as
/// tightly packed.
pub const DEFAULT_TIGHT_PACKING_THRESHOLD: f64 = 0.90;

/// One unit of a requirement that could not be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub course_id: String,
    pub teacher_id: String,
    pub kind: SessionType,
    pub reason: ConflictReason,
}

/// Counters describing one planning run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanStats {
    /// Lab blocks plus theory periods asked for by all requirements.
    pub requested_units: usize,
    /// Units satisfied, by a new placement or by a preserved lock.
    pub placed_units: usize,
    pub theory_sessions: usize,
    pub lab_sessions: usize,
    /// Sessions carried over unchanged from the previous draft.
    pub locked_sessions: usize,
    /// Occupied share of the cells business hours allow.
    pub occupancy_ratio: f64,
}

/// Conflicts and warnings accumulated during one run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<String>,
    pub stats: PlanStats,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one unplaceable unit of `requirement`.
    pub fn conflict(
        &mut self,
        requirement: &CourseRequirement,
        kind: SessionType,
        reason: ConflictReason,
    ) {
        warn!(
            course  = %requirement.course_id,
            teacher = %requirement.teacher_id,
            kind    = %kind,
            reason  = %reason,
            "✗ session not placed"
        );
        self.conflicts.push(Conflict {
            course_id: requirement.course_id.clone(),
            teacher_id: requirement.teacher_id.clone(),
            kind,
            reason,
        });
    }

    /// Record an advisory message.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// `true` if nothing was left unplaced.
    pub fn is_complete(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Placed plus conflicted units; equals `requested_units` after a run.
    pub fn accounted_units(&self) -> usize {
        self.stats.placed_units + self.conflicts.len()
    }

    /// Snapshot the grid's occupancy and warn when it reaches `threshold`.
    ///
    /// Tight packing is not a failure, but it leaves no room for manual
    /// adjustments of the draft.
    pub fn check_packing(&mut self, grid: &Grid, threshold: f64) {
        let ratio = grid.occupancy_ratio();
        self.stats.occupancy_ratio = ratio;
        if ratio >= threshold && ratio > 0.0 {
            self.warn(format!(
                "tight packing: {:.0}% of available periods are occupied (threshold {:.0}%)",
                ratio * 100.0,
                threshold * 100.0
            ));
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
