/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core data structures for timetable generation.
//!
//! Two distinct types model the two sides of the pipeline:
//!
//! ```text
//! caller  ──CourseRequirement──►  PlacementPlanner  ──Session──►  Timetable
//!            ↑ read-only input                         ↑ committed placement
//! ```
//!
//! # Ownership model
//! `CourseRequirement` is borrowed by the planner for one run and never
//! mutated.  Every `Session` the planner emits is owned by the result and
//! later moved into the [`Timetable`](crate::draft::Timetable) it is committed
//! to.

use serde::{Deserialize, Serialize};

use crate::scheduler::error::ConfigError;

// ── Session type ──────────────────────────────────────────────────────────────

/// Kind of a weekly class session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// Single-period lecture.
    #[default]
    Theory,
    /// Contiguous block of `lab_block_size` periods within one day.
    Lab,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Theory => "theory",
            SessionType::Lab => "lab",
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── CourseRequirement (input) ─────────────────────────────────────────────────

/// One (group, course, teacher) assignment with its weekly load.
///
/// Counts are signed because they arrive from an external contract where a
/// negative value is possible; [`validate`](Self::validate) rejects them
/// before the planner ever sees the requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRequirement {
    pub course_id: String,

    /// Empty means "no teacher assigned yet"; such requirements skip the
    /// teacher daily-load check.
    #[serde(default)]
    pub teacher_id: String,

    #[serde(default)]
    pub weekly_theory_periods: i32,

    #[serde(default)]
    pub weekly_lab_periods: i32,

    #[serde(default = "default_lab_block_size")]
    pub lab_block_size: i32,

    /// Higher schedules first within its tier.
    #[serde(default)]
    pub priority: i32,
}

fn default_lab_block_size() -> i32 {
    1
}

impl Default for CourseRequirement {
    fn default() -> Self {
        Self {
            course_id: String::new(),
            teacher_id: String::new(),
            weekly_theory_periods: 0,
            weekly_lab_periods: 0,
            lab_block_size: default_lab_block_size(),
            priority: 0,
        }
    }
}

impl CourseRequirement {
    /// Reject requirements the planner cannot interpret.
    ///
    /// # Errors
    /// * [`ConfigError::MissingCourseId`] for an empty `course_id`.
    /// * [`ConfigError::NegativePeriods`] for a negative theory or lab count.
    /// * [`ConfigError::NonPositiveLabBlock`] for `lab_block_size <= 0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.course_id.is_empty() {
            return Err(ConfigError::MissingCourseId);
        }
        if self.weekly_theory_periods < 0 {
            return Err(ConfigError::NegativePeriods {
                course_id: self.course_id.clone(),
                field: "weekly_theory_periods",
                value: self.weekly_theory_periods,
            });
        }
        if self.weekly_lab_periods < 0 {
            return Err(ConfigError::NegativePeriods {
                course_id: self.course_id.clone(),
                field: "weekly_lab_periods",
                value: self.weekly_lab_periods,
            });
        }
        if self.lab_block_size <= 0 {
            return Err(ConfigError::NonPositiveLabBlock {
                course_id: self.course_id.clone(),
                value: self.lab_block_size,
            });
        }
        Ok(())
    }

    /// Block length of one lab session, in periods.
    pub fn block_size(&self) -> usize {
        self.lab_block_size.max(1) as usize
    }

    /// `ceil(weekly_lab_periods / lab_block_size)`, `0` when there is no lab.
    pub fn lab_sessions_needed(&self) -> usize {
        if self.weekly_lab_periods <= 0 {
            return 0;
        }
        (self.weekly_lab_periods as usize).div_ceil(self.block_size())
    }

    /// Number of single-period theory sessions.
    pub fn theory_sessions_needed(&self) -> usize {
        self.weekly_theory_periods.max(0) as usize
    }

    /// Total schedulable units: one per lab block plus one per theory period.
    pub fn requested_units(&self) -> usize {
        self.lab_sessions_needed() + self.theory_sessions_needed()
    }

    /// `true` if `session` was produced for this requirement.
    pub fn matches(&self, session: &Session) -> bool {
        self.course_id == session.course_id && self.teacher_id == session.teacher_id
    }
}

// ── Session (output) ──────────────────────────────────────────────────────────

/// One committed placement on the weekly grid.
///
/// Day and period indices are 0-based.  The session covers periods
/// `period_start_index .. period_start_index + duration_periods` of
/// `day_of_week`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    pub course_id: String,
    #[serde(default)]
    pub teacher_id: String,
    pub day_of_week: usize,
    pub period_start_index: usize,
    pub duration_periods: usize,
    #[serde(rename = "type")]
    pub session_type: SessionType,

    /// Set by an administrator; locked sessions survive forced regeneration
    /// when `preserve_locked` is requested.
    #[serde(default)]
    pub locked: bool,
}

impl Session {
    /// Exclusive end period, saturating for corrupt snapshot data.
    pub fn end_period(&self) -> usize {
        self.period_start_index.saturating_add(self.duration_periods)
    }

    /// `true` if both sessions share at least one `(day, period)` cell.
    pub fn overlaps(&self, other: &Session) -> bool {
        self.day_of_week == other.day_of_week
            && self.period_start_index < other.end_period()
            && other.period_start_index < self.end_period()
    }

    /// Every `(day, period)` cell this session occupies.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.period_start_index..self.end_period()).map(move |p| (self.day_of_week, p))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn requirement(theory: i32, lab: i32, block: i32) -> CourseRequirement {
        CourseRequirement {
            course_id: "cs101".into(),
            teacher_id: "t1".into(),
            weekly_theory_periods: theory,
            weekly_lab_periods: lab,
            lab_block_size: block,
            priority: 0,
        }
    }

    fn session(day: usize, start: usize, len: usize) -> Session {
        Session {
            course_id: "cs101".into(),
            teacher_id: "t1".into(),
            day_of_week: day,
            period_start_index: start,
            duration_periods: len,
            session_type: SessionType::Lab,
            locked: false,
        }
    }

    // ── CourseRequirement ─────────────────────────────────────────────────────

    #[test]
    fn lab_sessions_round_up() {
        assert_eq!(requirement(0, 4, 2).lab_sessions_needed(), 2);
        assert_eq!(requirement(0, 5, 2).lab_sessions_needed(), 3);
        assert_eq!(requirement(0, 1, 3).lab_sessions_needed(), 1);
        assert_eq!(requirement(0, 0, 3).lab_sessions_needed(), 0);
    }

    #[test]
    fn requested_units_counts_blocks_and_theory_periods() {
        assert_eq!(requirement(3, 4, 2).requested_units(), 5);
    }

    #[test]
    fn validate_accepts_well_formed_requirement() {
        assert!(requirement(3, 4, 2).validate().is_ok());
    }

    #[test]
    fn validate_rejects_negative_theory() {
        let err = requirement(-1, 0, 1).validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NegativePeriods {
                field: "weekly_theory_periods",
                value: -1,
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_negative_lab() {
        let err = requirement(0, -4, 2).validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NegativePeriods {
                field: "weekly_lab_periods",
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_zero_block() {
        let err = requirement(0, 2, 0).validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::NonPositiveLabBlock {
                course_id: "cs101".into(),
                value: 0
            }
        );
    }

    #[test]
    fn validate_rejects_empty_course_id() {
        let r = CourseRequirement::default();
        assert_eq!(r.validate().unwrap_err(), ConfigError::MissingCourseId);
    }

    #[test]
    fn default_block_size_is_one() {
        let r: CourseRequirement =
            serde_yaml::from_str("course_id: math\nweekly_lab_periods: 2\n").unwrap();
        assert_eq!(r.lab_block_size, 1);
        assert_eq!(r.lab_sessions_needed(), 2);
    }

    // ── Session ───────────────────────────────────────────────────────────────

    #[test]
    fn adjacent_sessions_do_not_overlap() {
        assert!(!session(0, 0, 2).overlaps(&session(0, 2, 2)));
    }

    #[test]
    fn intersecting_sessions_overlap() {
        assert!(session(1, 1, 3).overlaps(&session(1, 3, 1)));
        assert!(session(1, 3, 1).overlaps(&session(1, 1, 3)));
    }

    #[test]
    fn different_days_never_overlap() {
        assert!(!session(0, 0, 6).overlaps(&session(1, 0, 6)));
    }

    #[test]
    fn cells_cover_the_block() {
        let cells: Vec<_> = session(2, 3, 2).cells().collect();
        assert_eq!(cells, vec![(2, 3), (2, 4)]);
    }

    #[test]
    fn end_period_saturates_instead_of_overflowing() {
        let s = session(0, usize::MAX, 2);
        assert_eq!(s.end_period(), usize::MAX);
        assert!(!s.overlaps(&session(0, 0, 2)));
    }

    #[test]
    fn session_type_serialises_lowercase() {
        let json = serde_json::to_string(&session(0, 0, 2)).unwrap();
        assert!(json.contains("\"type\":\"lab\""));
    }
}
