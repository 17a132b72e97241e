//! Scheduling configuration loading and management.
//!
//! One YAML file describes every group the CLI can generate, together with
//! its course requirements and the planner tunables.
//!
//! The expected YAML structure is:
//! ```yaml
//! defaults:
//!   max_teacher_periods_per_day: 6
//!   spread_theory_days: false
//! groups:
//!   cs-1a:
//!     days_per_week: 5
//!     periods_per_day: 6
//!     business_hours:
//!       friday: [0, 1, 2, 3]
//!     teacher_limits:
//!       t-smith: 4
//!     teacher_availability:
//!       t-smith:
//!         monday: [0, 1, 2]
//!     requirements:
//!       - course_id: cs101
//!         teacher_id: t-smith
//!         weekly_theory_periods: 3
//!         weekly_lab_periods: 4
//!         lab_block_size: 2
//!         priority: 10
//! ```
//!
//! Loading only checks that the file parses.  Semantic checks (positive grid
//! dimensions, non-negative counts, known day names) run per generation via
//! [`GroupConfig::validate`] so one bad group does not prevent generating the
//! others.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::course::CourseRequirement;
use crate::grid::{day_index, BusinessHours, Grid};
use crate::scheduler::diagnostics::DEFAULT_TIGHT_PACKING_THRESHOLD;
use crate::scheduler::error::ConfigError;
use crate::scheduler::{PlannerOptions, DEFAULT_BACKTRACK_BUDGET};

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Deserialize)]
struct SchedulingConfigFile {
    #[serde(default)]
    defaults: DefaultsEntry,
    #[serde(default)]
    groups: BTreeMap<String, GroupEntry>,
}

/// Planner tunables shared by every group unless the group overrides them.
#[derive(Debug, Default, Deserialize)]
struct DefaultsEntry {
    max_teacher_periods_per_day: Option<u32>,
    #[serde(default)]
    spread_theory_days: bool,
    backtrack_budget: Option<usize>,
    tight_packing_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GroupEntry {
    days_per_week: i32,
    periods_per_day: i32,
    #[serde(default)]
    business_hours: BusinessHours,
    /// Overrides `defaults.max_teacher_periods_per_day` for this group.
    max_teacher_periods_per_day: Option<u32>,
    #[serde(default)]
    teacher_limits: BTreeMap<String, u32>,
    #[serde(default)]
    teacher_availability: BTreeMap<String, BusinessHours>,
    #[serde(default)]
    requirements: Vec<CourseRequirement>,
}

// ── Public data structures ────────────────────────────────────────────────────

/// Weekly shape of one group.  Immutable input for a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub group_id: String,
    pub days_per_week: i32,
    pub periods_per_day: i32,
    /// Day name → available period indices.  Absent days are fully open.
    #[serde(default)]
    pub business_hours: BusinessHours,
}

impl GroupConfig {
    /// A fully open grid with no business-hours restrictions.
    pub fn open(group_id: impl Into<String>, days_per_week: i32, periods_per_day: i32) -> Self {
        Self {
            group_id: group_id.into(),
            days_per_week,
            periods_per_day,
            business_hours: BusinessHours::new(),
        }
    }

    /// Check the grid dimensions and business-hours day names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.days_per_week <= 0 {
            return Err(ConfigError::NonPositiveDays(self.days_per_week));
        }
        if self.periods_per_day <= 0 {
            return Err(ConfigError::NonPositivePeriods(self.periods_per_day));
        }
        if let Some(bad) = self.business_hours.keys().find(|d| day_index(d).is_none()) {
            return Err(ConfigError::UnknownDay(bad.clone()));
        }
        Ok(())
    }

    /// Allocate this group's grid with business hours applied.
    pub fn build_grid(&self) -> Result<Grid, ConfigError> {
        Grid::initialize(
            self.days_per_week,
            self.periods_per_day,
            &self.business_hours,
        )
    }
}

/// Everything needed to generate one group's timetable.
#[derive(Debug, Clone)]
pub struct GroupSetup {
    pub config: GroupConfig,
    pub requirements: Vec<CourseRequirement>,
    pub options: PlannerOptions,
}

// ── SchedulingConfigManager ───────────────────────────────────────────────────

/// Loads and manages group setups from a YAML file.
#[derive(Debug, Default)]
pub struct SchedulingConfigManager {
    /// Map of group id → [`GroupSetup`].
    groups: BTreeMap<String, GroupSetup>,

    /// Set to `true` after a successful [`load_from_file`](Self::load_from_file).
    loaded: bool,
}

impl SchedulingConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path` and populates the internal group map.
    ///
    /// Calling this method a second time replaces all previously loaded
    /// groups.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or if the YAML is
    /// structurally invalid.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading scheduling configuration from: {}", path.display());

        self.groups.clear();
        self.loaded = false;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: SchedulingConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        let defaults = file.defaults;

        for (group_id, entry) in file.groups {
            let options = PlannerOptions {
                teacher_max_periods_per_day: entry
                    .max_teacher_periods_per_day
                    .or(defaults.max_teacher_periods_per_day),
                teacher_limits: entry.teacher_limits,
                teacher_availability: entry.teacher_availability,
                spread_theory_days: defaults.spread_theory_days,
                backtrack_budget: defaults.backtrack_budget.unwrap_or(DEFAULT_BACKTRACK_BUDGET),
                tight_packing_threshold: defaults
                    .tight_packing_threshold
                    .unwrap_or(DEFAULT_TIGHT_PACKING_THRESHOLD),
            };

            let setup = GroupSetup {
                config: GroupConfig {
                    group_id: group_id.clone(),
                    days_per_week: entry.days_per_week,
                    periods_per_day: entry.periods_per_day,
                    business_hours: entry.business_hours,
                },
                requirements: entry.requirements,
                options,
            };

            debug!(
                "  Group: {} | {}×{} grid | {} requirement(s)",
                group_id,
                setup.config.days_per_week,
                setup.config.periods_per_day,
                setup.requirements.len(),
            );

            self.groups.insert(group_id, setup);
        }

        if self.groups.is_empty() {
            warn!("No groups found in configuration file");
        }

        self.loaded = true;

        info!(
            "Successfully loaded {} group configuration(s)",
            self.groups.len()
        );

        Ok(())
    }

    /// Returns the setup for `group_id`, or `None` if it was not loaded.
    pub fn get_group(&self, group_id: &str) -> Option<&GroupSetup> {
        self.groups.get(group_id)
    }

    /// Returns every loaded group, ordered by id.
    pub fn get_all_groups(&self) -> &BTreeMap<String, GroupSetup> {
        &self.groups
    }

    /// Returns `true` after a successful call to [`load_from_file`](Self::load_from_file).
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
