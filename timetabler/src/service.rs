/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Request/response entry point for timetable generation.
//!
//! ```text
//! GenerateRequest + GroupConfig + [CourseRequirement]
//!        │
//!        ▼  validate            ── ConfigError ──────────► { error }
//!   DraftManager::prepare       ── AlreadyExists ────────► { success: false, error }
//!        │
//!        ▼  Grid + locks
//!   PlacementPlanner            (conflicts are data, never abort)
//!        │
//!        ▼
//!   DraftManager::commit        ── ConcurrencyConflict ──► { error, retryable: true }
//!        │
//!        ▼
//!   { success: true, timetable_id, version, sessions_created, conflicts, warnings }
//! ```
//!
//! The caller fetches the group configuration and course requirements before
//! invoking the service; the service never loads them itself.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::GroupConfig;
use crate::course::{CourseRequirement, Session, SessionType};
use crate::draft::{DraftError, DraftKey, DraftManager, Timetable, TimetableStore};
use crate::scheduler::{ConfigError, Diagnostics, PlacementPlanner, PlanStats, PlannerOptions};

// ── Request ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub group_id: String,
    pub academic_term_id: String,
    #[serde(default)]
    pub force_regenerate: bool,
    #[serde(default = "default_preserve_locked")]
    pub preserve_locked: bool,
}

fn default_preserve_locked() -> bool {
    true
}

impl GenerateRequest {
    pub fn new(group_id: impl Into<String>, academic_term_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            academic_term_id: academic_term_id.into(),
            force_regenerate: false,
            preserve_locked: default_preserve_locked(),
        }
    }

    pub fn key(&self) -> DraftKey {
        DraftKey::new(&self.group_id, &self.academic_term_id)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why nothing was generated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Draft(#[from] DraftError),
}

impl GenerateError {
    /// `true` for a lost version race; retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerateError::Draft(DraftError::ConcurrencyConflict { .. }))
    }

    /// `true` for the "draft already exists" business refusal.
    pub fn is_refusal(&self) -> bool {
        matches!(self, GenerateError::Draft(DraftError::AlreadyExists { .. }))
    }
}

/// A committed draft and the report of the run that produced it.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub timetable: Timetable,
    pub diagnostics: Diagnostics,
}

// ── Response ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictEntry {
    pub course_id: String,
    pub teacher_id: String,
    pub requirement_kind: SessionType,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateSuccess {
    pub success: bool,
    pub timetable_id: String,
    pub version: u32,
    /// Sessions in the new draft, re-emitted locked sessions included.  A
    /// locked theory session may span several periods and an orphan lock
    /// covers no requirement, so compare `units_placed` with the conflicts
    /// for accounting.
    pub sessions_created: usize,
    /// Requested units covered by this draft: placed lab blocks and theory
    /// periods, plus what locked sessions cover.
    /// `units_placed + conflicts.len() == stats.requested_units`.
    pub units_placed: usize,
    pub conflicts: Vec<ConflictEntry>,
    pub warnings: Vec<String>,
    pub sessions: Vec<Session>,
    pub stats: PlanStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRefusal {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateFailure {
    pub error: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

/// The three response shapes of the generation API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GenerateResponse {
    Success(GenerateSuccess),
    /// A draft exists and regeneration was not forced.
    Refused(GenerateRefusal),
    /// Malformed input or a lost version race.
    Failed(GenerateFailure),
}

impl GenerateResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerateResponse::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, GenerateResponse::Failed(_))
    }
}

impl From<GenerationOutcome> for GenerateSuccess {
    fn from(o: GenerationOutcome) -> Self {
        let conflicts = o
            .diagnostics
            .conflicts
            .iter()
            .map(|c| ConflictEntry {
                course_id: c.course_id.clone(),
                teacher_id: c.teacher_id.clone(),
                requirement_kind: c.kind,
                reason: c.reason.to_string(),
            })
            .collect();

        GenerateSuccess {
            success: true,
            timetable_id: o.timetable.id,
            version: o.timetable.version,
            sessions_created: o.timetable.sessions.len(),
            units_placed: o.diagnostics.stats.placed_units,
            conflicts,
            warnings: o.diagnostics.warnings,
            sessions: o.timetable.sessions,
            stats: o.diagnostics.stats,
        }
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

/// Wires validation, draft versioning and placement into one call.
pub struct TimetableService<S: TimetableStore> {
    drafts: DraftManager<S>,
}

impl<S: TimetableStore> TimetableService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            drafts: DraftManager::new(store),
        }
    }

    pub fn drafts(&self) -> &DraftManager<S> {
        &self.drafts
    }

    /// Generate and commit a draft for `request`.
    ///
    /// # Errors
    /// * [`GenerateError::Config`]: the configuration or a requirement is
    ///   malformed; nothing was placed.
    /// * [`GenerateError::Draft`] with `AlreadyExists`: refused, the
    ///   existing draft is untouched.
    /// * [`GenerateError::Draft`] with `ConcurrencyConflict`: another run
    ///   committed first; retryable.
    pub fn generate(
        &self,
        request: &GenerateRequest,
        group: &GroupConfig,
        requirements: &[CourseRequirement],
        options: &PlannerOptions,
    ) -> Result<GenerationOutcome, GenerateError> {
        // ── Validation (before any draft or grid work) ────────────────────────
        if request.group_id != group.group_id {
            return Err(ConfigError::GroupMismatch {
                requested: request.group_id.clone(),
                configured: group.group_id.clone(),
            }
            .into());
        }
        group.validate()?;
        options.validate()?;
        for r in requirements {
            r.validate()?;
        }

        // ── Draft go/no-go ────────────────────────────────────────────────────
        let key = request.key();
        let ticket = self
            .drafts
            .prepare(&key, request.force_regenerate, request.preserve_locked)?;

        info!(
            key = %key,
            version = ticket.version,
            force = request.force_regenerate,
            preserve_locked = request.preserve_locked,
            locked = ticket.locked.len(),
            "generating timetable"
        );

        // ── Placement ─────────────────────────────────────────────────────────
        let mut grid = group.build_grid()?;
        let planner = PlacementPlanner::new(options.clone());
        let outcome = planner.plan_with_locked(&mut grid, requirements, &ticket.locked);

        // ── Commit ────────────────────────────────────────────────────────────
        let timetable = self.drafts.commit(ticket, outcome.sessions)?;

        Ok(GenerationOutcome {
            timetable,
            diagnostics: outcome.diagnostics,
        })
    }

    /// [`generate`](Self::generate), mapped onto the API response shapes.
    pub fn respond(
        &self,
        request: &GenerateRequest,
        group: &GroupConfig,
        requirements: &[CourseRequirement],
        options: &PlannerOptions,
    ) -> GenerateResponse {
        match self.generate(request, group, requirements, options) {
            Ok(outcome) => GenerateResponse::Success(outcome.into()),
            Err(e) if e.is_refusal() => GenerateResponse::Refused(GenerateRefusal {
                success: false,
                error: e.to_string(),
            }),
            Err(e) => {
                warn!(
                    group = %request.group_id,
                    term = %request.academic_term_id,
                    retryable = e.is_retryable(),
                    "generation failed: {}",
                    e
                );
                GenerateResponse::Failed(GenerateFailure {
                    error: e.to_string(),
                    retryable: e.is_retryable(),
                })
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::InMemoryStore;
    use serde_json::json;

    fn service() -> TimetableService<InMemoryStore> {
        TimetableService::new(Arc::new(InMemoryStore::new()))
    }

    fn math() -> CourseRequirement {
        CourseRequirement {
            course_id: "math".into(),
            teacher_id: "t-lee".into(),
            weekly_theory_periods: 2,
            ..Default::default()
        }
    }

    #[test]
    fn request_defaults_match_api() {
        let req: GenerateRequest =
            serde_json::from_value(json!({"group_id": "g", "academic_term_id": "t"})).unwrap();
        assert!(!req.force_regenerate);
        assert!(req.preserve_locked);
        assert_eq!(req, GenerateRequest::new("g", "t"));
    }

    #[test]
    fn success_response_shape() {
        let svc = service();
        let resp = svc.respond(
            &GenerateRequest::new("g", "t"),
            &GroupConfig::open("g", 5, 6),
            &[math()],
            &PlannerOptions::default(),
        );
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["success"], json!(true));
        assert_eq!(v["timetable_id"], json!("g/t/v1"));
        assert_eq!(v["version"], json!(1));
        assert_eq!(v["sessions_created"], json!(2));
        assert_eq!(v["units_placed"], json!(2));
        assert_eq!(v["conflicts"], json!([]));
        assert_eq!(v["sessions"][0]["type"], json!("theory"));
    }

    #[test]
    fn refusal_response_shape() {
        let svc = service();
        let (req, group) = (GenerateRequest::new("g", "t"), GroupConfig::open("g", 5, 6));
        let opts = PlannerOptions::default();
        assert!(svc.respond(&req, &group, &[math()], &opts).is_success());

        let v = serde_json::to_value(svc.respond(&req, &group, &[math()], &opts)).unwrap();
        assert_eq!(
            v,
            json!({
                "success": false,
                "error": "Timetable already exists. Use force_regenerate=true to recreate."
            })
        );
    }

    #[test]
    fn config_error_response_shape() {
        let svc = service();
        let resp = svc.respond(
            &GenerateRequest::new("g", "t"),
            &GroupConfig::open("g", 0, 6),
            &[math()],
            &PlannerOptions::default(),
        );
        assert!(resp.is_failure());
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v, json!({"error": "days_per_week must be positive, got 0"}));
        // Nothing committed
        assert!(svc.drafts().store().is_empty());
    }

    #[test]
    fn bad_requirement_aborts_before_drafting() {
        let svc = service();
        let bad = CourseRequirement {
            lab_block_size: 0,
            weekly_lab_periods: 2,
            ..math()
        };
        let err = svc
            .generate(
                &GenerateRequest::new("g", "t"),
                &GroupConfig::open("g", 5, 6),
                &[math(), bad],
                &PlannerOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GenerateError::Config(ConfigError::NonPositiveLabBlock { .. })
        ));
        assert!(svc.drafts().store().is_empty());
    }

    #[test]
    fn group_mismatch_is_config_error() {
        let err = service()
            .generate(
                &GenerateRequest::new("g1", "t"),
                &GroupConfig::open("g2", 5, 6),
                &[],
                &PlannerOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GenerateError::Config(ConfigError::GroupMismatch { .. })
        ));
    }

    #[test]
    fn conflicts_are_reported_with_success() {
        let svc = service();
        let lab = CourseRequirement {
            course_id: "phys".into(),
            teacher_id: "t-ng".into(),
            weekly_lab_periods: 2,
            lab_block_size: 2,
            ..Default::default()
        };
        let resp = svc.respond(
            &GenerateRequest::new("g", "t"),
            &GroupConfig::open("g", 5, 1),
            &[lab],
            &PlannerOptions::default(),
        );
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["success"], json!(true));
        assert_eq!(v["sessions_created"], json!(0));
        assert_eq!(
            v["conflicts"],
            json!([{
                "course_id": "phys",
                "teacher_id": "t-ng",
                "requirement_kind": "lab",
                "reason": "no contiguous block of size 2 available"
            }])
        );
    }

    #[test]
    fn forced_regeneration_preserves_locks() {
        let store = Arc::new(InMemoryStore::new());
        let svc = TimetableService::new(Arc::clone(&store));
        let group = GroupConfig::open("g", 2, 3);
        let opts = PlannerOptions::default();

        // Seed a draft with one locked theory session at (1, 2)
        let locked = Session {
            course_id: "math".into(),
            teacher_id: "t-lee".into(),
            day_of_week: 1,
            period_start_index: 2,
            duration_periods: 1,
            session_type: SessionType::Theory,
            locked: true,
        };
        let ticket = svc.drafts().prepare(&DraftKey::new("g", "t"), false, true).unwrap();
        svc.drafts().commit(ticket, vec![locked.clone()]).unwrap();

        let mut req = GenerateRequest::new("g", "t");
        req.force_regenerate = true;
        let out = svc.generate(&req, &group, &[math()], &opts).unwrap();

        assert_eq!(out.timetable.version, 2);
        assert_eq!(out.timetable.sessions[0], locked);
        assert_eq!(out.timetable.sessions.len(), 2, "lock covers one of two periods");
        assert_eq!(
            (out.timetable.sessions[1].day_of_week, out.timetable.sessions[1].period_start_index),
            (0, 0)
        );
    }

    #[test]
    fn units_placed_accounts_for_wide_and_orphan_locks() {
        let svc = service();
        let group = GroupConfig::open("g", 2, 4);
        let lock = |course: &str, day, start, len| Session {
            course_id: course.into(),
            teacher_id: "t-lee".into(),
            day_of_week: day,
            period_start_index: start,
            duration_periods: len,
            session_type: SessionType::Theory,
            locked: true,
        };
        let ticket = svc.drafts().prepare(&DraftKey::new("g", "t"), false, true).unwrap();
        svc.drafts()
            .commit(ticket, vec![lock("math", 1, 0, 2), lock("gone", 1, 3, 1)])
            .unwrap();

        let mut req = GenerateRequest::new("g", "t");
        req.force_regenerate = true;
        let resp = svc.respond(&req, &group, &[math()], &PlannerOptions::default());
        let ok = match resp {
            GenerateResponse::Success(ok) => ok,
            other => panic!("expected success, got {:?}", other),
        };

        // Two locks re-emitted; the wide one covers both math periods
        assert_eq!(ok.sessions_created, 2);
        assert_eq!(ok.units_placed, 2);
        assert_eq!(ok.units_placed + ok.conflicts.len(), ok.stats.requested_units);
    }

    #[test]
    fn retryable_only_for_version_race() {
        let race = GenerateError::Draft(DraftError::ConcurrencyConflict {
            key: DraftKey::new("g", "t"),
            expected: Some(1),
            found: Some(2),
        });
        assert!(race.is_retryable());
        assert!(!GenerateError::Config(ConfigError::NonPositiveDays(0)).is_retryable());
        let v = serde_json::to_value(GenerateResponse::Failed(GenerateFailure {
            error: race.to_string(),
            retryable: true,
        }))
        .unwrap();
        assert_eq!(v["retryable"], json!(true));
    }
}
