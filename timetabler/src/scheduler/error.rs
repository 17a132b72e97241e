/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the timetable engine.
//!
//! Three types model the three failure layers:
//!
//! * [`ConfigError`]: the group configuration or a course requirement is
//!   malformed.  Fatal: the run aborts before any placement.
//! * [`GridError`]: a grid cell was addressed outside the grid.  Callers
//!   working from validated input never trigger it.
//! * [`ConflictReason`]: why a single session could not be placed.  This is
//!   **not** an error: it is carried as data inside a
//!   [`Conflict`](super::diagnostics::Conflict) and the run continues.
//!
//! **Do not** fold [`ConflictReason`] into an error enum: a placement
//! conflict must never abort the rest of the group.

use thiserror::Error;

// ── Configuration errors ──────────────────────────────────────────────────────

/// Malformed group configuration or course requirement.
///
/// Every variant carries the offending value so the API layer can report it
/// verbatim as a 4xx-style failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("days_per_week must be positive, got {0}")]
    NonPositiveDays(i32),

    #[error("periods_per_day must be positive, got {0}")]
    NonPositivePeriods(i32),

    /// A `business_hours` key is not a recognised day name.
    #[error("unknown day name '{0}' in business_hours (expected monday..sunday)")]
    UnknownDay(String),

    /// The request names a different group than the supplied configuration.
    #[error("request is for group '{requested}' but configuration is for group '{configured}'")]
    GroupMismatch {
        requested: String,
        configured: String,
    },

    #[error("course '{course_id}' has negative {field} ({value})")]
    NegativePeriods {
        course_id: String,
        field: &'static str,
        value: i32,
    },

    #[error("course '{course_id}' has non-positive lab_block_size ({value})")]
    NonPositiveLabBlock { course_id: String, value: i32 },

    #[error("requirement has an empty course_id")]
    MissingCourseId,
}

// ── Grid addressing ───────────────────────────────────────────────────────────

/// A cell lookup fell outside the `days × periods` grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cell (day {day}, period {period}) is outside the {days}×{periods} grid")]
pub struct GridError {
    pub day: usize,
    pub period: usize,
    pub days: usize,
    pub periods: usize,
}

// ── Placement conflicts ───────────────────────────────────────────────────────

/// Why one session of a requirement could not be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    /// No run of `size` consecutive free periods exists on any day.
    NoContiguousBlock { size: usize },

    /// Every cell of the grid is occupied or blocked.
    NoFreePeriod,

    /// Free slots exist but each one would push the teacher past their daily
    /// cap for this group.
    TeacherDailyLimit { teacher_id: String, limit: u32 },

    /// Free slots exist but none lies inside the teacher's availability.
    TeacherUnavailable { teacher_id: String },
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictReason::NoContiguousBlock { size } => {
                write!(f, "no contiguous block of size {} available", size)
            }

            ConflictReason::NoFreePeriod => write!(f, "no free period available"),

            ConflictReason::TeacherDailyLimit { teacher_id, limit } => write!(
                f,
                "teacher '{}' would exceed the daily limit of {} period(s) on every free slot",
                teacher_id, limit
            ),

            ConflictReason::TeacherUnavailable { teacher_id } => write!(
                f,
                "teacher '{}' is not available in any free slot",
                teacher_id
            ),
        }
    }
}
