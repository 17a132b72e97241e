//! Placement planner for one group's weekly timetable.
//!
//! [`PlacementPlanner`] turns a set of [`CourseRequirement`]s into committed
//! [`Session`]s on a [`Grid`], recording everything it could not place in a
//! [`Diagnostics`] report.  The result is a [`PlanOutcome`] ready to be
//! committed as a draft.
//!
//! # Placement policy
//!
//! | Step | What | Why |
//! |---|---|---|
//! | 0 | Pre-occupy preserved locked sessions | They are fixed by an administrator |
//! | 1 | Lab tier, priority descending | Contiguous blocks are hardest to fit |
//! | 1b | Bounded backtracking if a lab block is stranded | Greedy first-fit can fragment the day |
//! | 2 | Theory tier, priority descending, one period at a time | Single periods fit anywhere |
//!
//! Ties in priority keep input order (stable sort).  Nothing in a run depends
//! on hash ordering, so identical input gives identical output.
//!
//! # Example
//! ```rust,ignore
//! let mut grid = Grid::initialize(5, 6, &BusinessHours::new())?;
//! let planner = PlacementPlanner::new(PlannerOptions::default());
//! let outcome = planner.plan(&mut grid, &requirements);
//! ```

pub mod backtrack;
pub mod diagnostics;
pub mod error;

pub use diagnostics::{Conflict, Diagnostics, PlanStats};
pub use error::{ConfigError, ConflictReason, GridError};

use std::cmp::Reverse;
use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::course::{CourseRequirement, Session, SessionType};
use crate::grid::slot::{self, DayOrder};
use crate::grid::{day_index, BusinessHours, Grid};

use backtrack::LabBlock;
use diagnostics::DEFAULT_TIGHT_PACKING_THRESHOLD;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Default number of candidate placements the lab backtracking may visit.
pub const DEFAULT_BACKTRACK_BUDGET: usize = 20_000;

// ── Options ───────────────────────────────────────────────────────────────────

/// Tunables for one planning run.
#[derive(Debug, Clone)]
pub struct PlannerOptions {
    /// Periods a teacher may teach per day in this group.  `None` = unlimited.
    pub teacher_max_periods_per_day: Option<u32>,

    /// Per-teacher overrides of `teacher_max_periods_per_day`.
    pub teacher_limits: BTreeMap<String, u32>,

    /// Teacher id → day name → periods the teacher can teach.  Teachers and
    /// days not listed are unrestricted.
    pub teacher_availability: BTreeMap<String, BusinessHours>,

    /// Start each theory search on the day after the course's previous theory
    /// session instead of on day 0.
    pub spread_theory_days: bool,

    /// Candidate placements the lab backtracking may visit.  `0` disables it.
    pub backtrack_budget: usize,

    /// Occupancy ratio from which a tight-packing warning is emitted.
    pub tight_packing_threshold: f64,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            teacher_max_periods_per_day: None,
            teacher_limits: BTreeMap::new(),
            teacher_availability: BTreeMap::new(),
            spread_theory_days: false,
            backtrack_budget: DEFAULT_BACKTRACK_BUDGET,
            tight_packing_threshold: DEFAULT_TIGHT_PACKING_THRESHOLD,
        }
    }
}

impl PlannerOptions {
    /// Daily cap for `teacher`, if any.  Unassigned requirements (empty
    /// teacher id) are never capped.
    pub fn limit_for(&self, teacher: &str) -> Option<u32> {
        if teacher.is_empty() {
            return None;
        }
        self.teacher_limits
            .get(teacher)
            .copied()
            .or(self.teacher_max_periods_per_day)
    }

    /// `true` if every period of the window lies inside `teacher`'s
    /// availability for `day`.
    pub fn teacher_available(&self, teacher: &str, day: usize, start: usize, len: usize) -> bool {
        let Some(days) = self.teacher_availability.get(teacher) else {
            return true;
        };
        match days.iter().find(|(name, _)| day_index(name) == Some(day)) {
            None => true,
            Some((_, allowed)) => (start..start.saturating_add(len)).all(|p| allowed.contains(&p)),
        }
    }

    /// Reject availability entries naming an unknown day.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad = self
            .teacher_availability
            .values()
            .flat_map(|days| days.keys())
            .find(|d| day_index(d).is_none());
        match bad {
            Some(day) => Err(ConfigError::UnknownDay(day.clone())),
            None => Ok(()),
        }
    }
}

// ── Teacher load tracking ─────────────────────────────────────────────────────

/// Periods taught per (teacher, day) during the current run.
///
/// `BTreeMap` for deterministic iteration in logs.
#[derive(Debug, Clone, Default)]
pub struct TeacherLoad {
    periods: BTreeMap<(String, usize), u32>,
}

impl TeacherLoad {
    pub fn get(&self, teacher: &str, day: usize) -> u32 {
        self.periods
            .get(&(teacher.to_string(), day))
            .copied()
            .unwrap_or(0)
    }

    /// `true` if adding `periods` on `day` keeps `teacher` within `limit`.
    pub fn admits(&self, teacher: &str, day: usize, periods: usize, limit: Option<u32>) -> bool {
        match limit {
            None => true,
            Some(limit) => self.get(teacher, day) as usize + periods <= limit as usize,
        }
    }

    pub fn add(&mut self, teacher: &str, day: usize, periods: usize) {
        if teacher.is_empty() {
            return;
        }
        *self.periods.entry((teacher.to_string(), day)).or_default() += periods as u32;
    }

    pub fn remove(&mut self, teacher: &str, day: usize, periods: usize) {
        let key = (teacher.to_string(), day);
        if let Some(v) = self.periods.get_mut(&key) {
            *v = v.saturating_sub(periods as u32);
            if *v == 0 {
                self.periods.remove(&key);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

/// Sessions placed by one run plus its diagnostics.
#[derive(Debug, Clone, Default)]
pub struct PlanOutcome {
    /// Preserved locked sessions first, then labs and theory in placement
    /// order.
    pub sessions: Vec<Session>,
    pub diagnostics: Diagnostics,
}

/// Units of a requirement still to be placed after locks are accounted for.
#[derive(Debug, Clone, Copy, Default)]
struct Demand {
    labs: usize,
    theory: usize,
}

// ── PlacementPlanner ──────────────────────────────────────────────────────────

/// The timetable placement planner.
///
/// Stateless between runs: all per-run state (teacher load, demand, output)
/// lives inside [`plan_with_locked`](Self::plan_with_locked).
#[derive(Debug, Clone, Default)]
pub struct PlacementPlanner {
    options: PlannerOptions,
}

impl PlacementPlanner {
    pub fn new(options: PlannerOptions) -> Self {
        Self { options }
    }

    /// Place every requirement on `grid`.
    pub fn plan(&self, grid: &mut Grid, requirements: &[CourseRequirement]) -> PlanOutcome {
        self.plan_with_locked(grid, requirements, &[])
    }

    /// Place every requirement on `grid` after pre-occupying `locked`.
    ///
    /// Locked sessions are re-emitted unchanged and count towards the
    /// requirement they match.  Requirements must already be validated.
    pub fn plan_with_locked(
        &self,
        grid: &mut Grid,
        requirements: &[CourseRequirement],
        locked: &[Session],
    ) -> PlanOutcome {
        let mut diag = Diagnostics::new();
        let mut load = TeacherLoad::default();

        diag.stats.requested_units = requirements.iter().map(|r| r.requested_units()).sum();

        info!(
            requirements = requirements.len(),
            locked = locked.len(),
            requested_units = diag.stats.requested_units,
            days = grid.days(),
            periods = grid.periods(),
            "=== PlacementPlanner::plan() ==="
        );

        // ── Step 0: preserved locks ───────────────────────────────────────────
        let mut sessions = Self::preplace_locked(grid, locked, &mut load, &mut diag);
        let mut demand = Self::initial_demand(requirements);
        Self::consume_locked(requirements, &sessions, &mut demand, &mut diag);

        // ── Step 1: lab tier ──────────────────────────────────────────────────
        let lab_tier = Self::tier_order(requirements, |i| demand[i].labs > 0);
        self.place_lab_tier(
            grid,
            requirements,
            &lab_tier,
            &demand,
            &mut load,
            &mut sessions,
            &mut diag,
        );

        // ── Step 2: theory tier ───────────────────────────────────────────────
        let theory_tier = Self::tier_order(requirements, |i| demand[i].theory > 0);
        self.place_theory_tier(
            grid,
            requirements,
            &theory_tier,
            &demand,
            &mut load,
            &mut sessions,
            &mut diag,
        );

        // ── Post-run ──────────────────────────────────────────────────────────
        diag.check_packing(grid, self.options.tight_packing_threshold);

        info!(
            sessions = sessions.len(),
            placed_units = diag.stats.placed_units,
            conflicts = diag.conflicts.len(),
            warnings = diag.warnings.len(),
            occupancy_pct = diag.stats.occupancy_ratio * 100.0,
            "=== Planning complete ==="
        );

        PlanOutcome {
            sessions,
            diagnostics: diag,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ordering
    // ─────────────────────────────────────────────────────────────────────────

    /// Indices of requirements in a tier, priority descending, input order on
    /// ties.
    fn tier_order<F>(requirements: &[CourseRequirement], in_tier: F) -> Vec<usize>
    where
        F: Fn(usize) -> bool,
    {
        let mut order: Vec<usize> = (0..requirements.len()).filter(|&i| in_tier(i)).collect();
        // `sort_by_key` is stable, so ties keep input order.
        order.sort_by_key(|&i| Reverse(requirements[i].priority));
        order
    }

    fn initial_demand(requirements: &[CourseRequirement]) -> Vec<Demand> {
        requirements
            .iter()
            .map(|r| Demand {
                labs: r.lab_sessions_needed(),
                theory: r.theory_sessions_needed(),
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Locked sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Occupy the cells of every usable locked session.
    ///
    /// A lock that leaves the grid, touches a business-hours block, or
    /// overlaps an earlier lock is dropped with a warning.
    fn preplace_locked(
        grid: &mut Grid,
        locked: &[Session],
        load: &mut TeacherLoad,
        diag: &mut Diagnostics,
    ) -> Vec<Session> {
        let mut kept = Vec::with_capacity(locked.len());

        for s in locked {
            let (day, start, len) = (s.day_of_week, s.period_start_index, s.duration_periods);

            let past_end = start.checked_add(len).map_or(true, |end| end > grid.periods());
            if len == 0 || day >= grid.days() || past_end {
                diag.warn(format!(
                    "locked {} session of course '{}' at day {} period {} (+{}) lies outside the grid; dropped",
                    s.session_type, s.course_id, day, start, len
                ));
                continue;
            }

            if !grid.is_window_free(day, start, len) {
                let blocked = (start..start + len)
                    .any(|p| grid.is_blocked_by_hours(day, p).unwrap_or(false));
                let why = if blocked {
                    "falls outside business hours"
                } else {
                    "overlaps another locked session"
                };
                diag.warn(format!(
                    "locked {} session of course '{}' at day {} period {} {}; dropped",
                    s.session_type, s.course_id, day, start, why
                ));
                continue;
            }

            // Bounds were checked above.
            let _ = grid.occupy_window(day, start, len);
            load.add(&s.teacher_id, day, len);

            let mut session = s.clone();
            session.locked = true;
            debug!(
                course = %session.course_id,
                day,
                start,
                len,
                "locked session preserved"
            );
            kept.push(session);
        }

        diag.stats.locked_sessions = kept.len();
        kept
    }

    /// Reduce demand by what the preserved locks already cover.
    fn consume_locked(
        requirements: &[CourseRequirement],
        locked: &[Session],
        demand: &mut [Demand],
        diag: &mut Diagnostics,
    ) {
        for s in locked {
            let mut consumed = 0usize;

            for (i, r) in requirements.iter().enumerate() {
                if !r.matches(s) {
                    continue;
                }
                match s.session_type {
                    SessionType::Lab => {
                        if demand[i].labs > 0 && s.duration_periods == r.block_size() {
                            demand[i].labs -= 1;
                            consumed = 1;
                        }
                    }
                    SessionType::Theory => {
                        if demand[i].theory > 0 {
                            consumed = s.duration_periods.min(demand[i].theory);
                            demand[i].theory -= consumed;
                        }
                    }
                }
                if consumed > 0 {
                    break;
                }
            }

            match s.session_type {
                SessionType::Lab => diag.stats.lab_sessions += 1,
                SessionType::Theory => diag.stats.theory_sessions += 1,
            }

            if consumed == 0 {
                diag.warn(format!(
                    "locked {} session of course '{}' at day {} period {} matches no outstanding requirement; kept as-is",
                    s.session_type, s.course_id, s.day_of_week, s.period_start_index
                ));
            }
            diag.stats.placed_units += consumed;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lab tier
    // ─────────────────────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn place_lab_tier(
        &self,
        grid: &mut Grid,
        requirements: &[CourseRequirement],
        tier: &[usize],
        demand: &[Demand],
        load: &mut TeacherLoad,
        sessions: &mut Vec<Session>,
        diag: &mut Diagnostics,
    ) {
        info!(requirements = tier.len(), "Placing lab tier");

        let mut blocks: Vec<LabBlock<'_>> = Vec::new();
        for &i in tier {
            let r = &requirements[i];
            let size = r.block_size();

            if r.weekly_lab_periods as usize % size != 0 {
                diag.warn(format!(
                    "course '{}': {} lab period(s) rounded up to {} block(s) of {} period(s)",
                    r.course_id,
                    r.weekly_lab_periods,
                    r.lab_sessions_needed(),
                    size
                ));
            }
            if size > grid.periods() {
                diag.warn(format!(
                    "course '{}': lab block of {} period(s) is longer than a {}-period day",
                    r.course_id,
                    size,
                    grid.periods()
                ));
            }

            for _ in 0..demand[i].labs {
                blocks.push(LabBlock { requirement: r, size });
            }
        }

        if blocks.is_empty() {
            return;
        }

        // ── Greedy first-fit ──────────────────────────────────────────────────
        let snapshot = (grid.clone(), load.clone());
        let mut placements: Vec<Option<(usize, usize)>> = Vec::with_capacity(blocks.len());
        let mut reasons: Vec<Option<ConflictReason>> = Vec::with_capacity(blocks.len());

        for block in &blocks {
            let teacher = block.requirement.teacher_id.as_str();
            match self.find_admissible(grid, load, teacher, block.size, DayOrder::Sequential) {
                Ok((day, start)) => {
                    // find_admissible only returns in-bounds windows.
                    let _ = grid.occupy_window(day, start, block.size);
                    load.add(teacher, day, block.size);
                    placements.push(Some((day, start)));
                    reasons.push(None);
                }
                Err(reason) => {
                    placements.push(None);
                    reasons.push(Some(reason));
                }
            }
        }

        // ── Backtracking when greedy strands a block ──────────────────────────
        let greedy_placed = placements.iter().filter(|p| p.is_some()).count();
        let stranded = blocks.len() - greedy_placed;
        if stranded > 0 && self.options.backtrack_budget > 0 {
            let (mut bt_grid, mut bt_load) = snapshot;
            let found = backtrack::search_largest(
                &mut bt_grid,
                &mut bt_load,
                &blocks,
                &self.options,
                self.options.backtrack_budget,
            );
            let rescued = found.iter().filter(|p| p.is_some()).count();

            if rescued > greedy_placed {
                diag.warn(format!(
                    "lab placement needed backtracking: greedy first-fit left {} block(s) unplaced, backtracking placed {} of {}",
                    stranded,
                    rescued,
                    blocks.len()
                ));
                *grid = bt_grid;
                *load = bt_load;

                // Blocks the search left out get one first-fit attempt on the
                // final grid, which also yields their conflict reason.
                placements = Vec::with_capacity(blocks.len());
                reasons = Vec::with_capacity(blocks.len());
                for (block, start) in blocks.iter().zip(found) {
                    if let Some(start) = start {
                        placements.push(Some(start));
                        reasons.push(None);
                        continue;
                    }
                    let teacher = block.requirement.teacher_id.as_str();
                    let order = DayOrder::Sequential;
                    match self.find_admissible(grid, load, teacher, block.size, order) {
                        Ok((day, start)) => {
                            let _ = grid.occupy_window(day, start, block.size);
                            load.add(teacher, day, block.size);
                            placements.push(Some((day, start)));
                            reasons.push(None);
                        }
                        Err(reason) => {
                            placements.push(None);
                            reasons.push(Some(reason));
                        }
                    }
                }
            }
        }

        // ── Emit ──────────────────────────────────────────────────────────────
        for ((block, placement), reason) in blocks.iter().zip(placements).zip(reasons) {
            let r = block.requirement;
            match (placement, reason) {
                (Some((day, start)), _) => {
                    sessions.push(Session {
                        course_id: r.course_id.clone(),
                        teacher_id: r.teacher_id.clone(),
                        day_of_week: day,
                        period_start_index: start,
                        duration_periods: block.size,
                        session_type: SessionType::Lab,
                        locked: false,
                    });
                    diag.stats.lab_sessions += 1;
                    diag.stats.placed_units += 1;
                    debug!(course = %r.course_id, day, start, len = block.size, "✓ lab placed");
                }
                (None, reason) => {
                    let reason =
                        reason.unwrap_or(ConflictReason::NoContiguousBlock { size: block.size });
                    diag.conflict(r, SessionType::Lab, reason);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Theory tier
    // ─────────────────────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn place_theory_tier(
        &self,
        grid: &mut Grid,
        requirements: &[CourseRequirement],
        tier: &[usize],
        demand: &[Demand],
        load: &mut TeacherLoad,
        sessions: &mut Vec<Session>,
        diag: &mut Diagnostics,
    ) {
        info!(requirements = tier.len(), "Placing theory tier");

        let mut last_day: BTreeMap<&str, usize> = BTreeMap::new();

        for &i in tier {
            let r = &requirements[i];
            let teacher = r.teacher_id.as_str();

            for _ in 0..demand[i].theory {
                let order = match last_day.get(r.course_id.as_str()) {
                    Some(&d) if self.options.spread_theory_days => DayOrder::StartingAt(d + 1),
                    _ => DayOrder::Sequential,
                };

                match self.find_admissible(grid, load, teacher, 1, order) {
                    Ok((day, period)) => {
                        let _ = grid.occupy(day, period);
                        load.add(teacher, day, 1);
                        last_day.insert(r.course_id.as_str(), day);
                        sessions.push(Session {
                            course_id: r.course_id.clone(),
                            teacher_id: r.teacher_id.clone(),
                            day_of_week: day,
                            period_start_index: period,
                            duration_periods: 1,
                            session_type: SessionType::Theory,
                            locked: false,
                        });
                        diag.stats.theory_sessions += 1;
                        diag.stats.placed_units += 1;
                        debug!(course = %r.course_id, day, period, "✓ theory placed");
                    }
                    Err(reason) => diag.conflict(r, SessionType::Theory, reason),
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shared helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// First free window of `len` periods that `teacher` may take.
    ///
    /// On failure, distinguishes "the grid has no such window at all" from
    /// "windows exist but none falls in the teacher's availability" and
    /// "each available window breaks the teacher's daily cap".
    fn find_admissible(
        &self,
        grid: &Grid,
        load: &TeacherLoad,
        teacher: &str,
        len: usize,
        order: DayOrder,
    ) -> Result<(usize, usize), ConflictReason> {
        let limit = self.options.limit_for(teacher);
        let available =
            |day: usize, start: usize| self.options.teacher_available(teacher, day, start, len);

        if let Some(slot) = slot::find_slot_where(grid, len, order, |day, start| {
            available(day, start) && load.admits(teacher, day, len, limit)
        }) {
            return Ok(slot);
        }

        let no_window = if len == 1 {
            ConflictReason::NoFreePeriod
        } else {
            ConflictReason::NoContiguousBlock { size: len }
        };

        if slot::find_slot(grid, len).is_none() {
            return Err(no_window);
        }
        if slot::find_slot_where(grid, len, DayOrder::Sequential, available).is_none() {
            return Err(ConflictReason::TeacherUnavailable {
                teacher_id: teacher.to_string(),
            });
        }
        match limit {
            Some(limit) => Err(ConflictReason::TeacherDailyLimit {
                teacher_id: teacher.to_string(),
                limit,
            }),
            None => Err(no_window),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
