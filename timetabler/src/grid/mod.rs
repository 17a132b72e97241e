//! Weekly occupancy grid.
//!
//! A `days × periods` matrix where each cell is either free, permanently
//! blocked by business hours, or occupied by a committed session.  The grid is
//! owned by exactly one generation run: allocated in
//! [`Grid::initialize`], mutated by the planner, dropped at the end of the
//! call.
//!
//! # Improvements over a plain boolean matrix
//!
//! | Concern | Plain `bool` | `Grid` |
//! |---------|--------------|--------|
//! | Backtracking undo | cannot tell a blocked cell from an occupied one | [`vacate`](Grid::vacate) never frees a business-hours block |
//! | Out-of-range access | panics or silently reads garbage | [`GridError`] |
//! | Packing statistics | needs a second pass over the config | [`occupancy_ratio`](Grid::occupancy_ratio) |

pub mod slot;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::scheduler::error::{ConfigError, GridError};

/// Day name → period indices that **are** available on that day.
///
/// Days absent from the map are fully open.  `BTreeMap` keeps iteration
/// deterministic.
pub type BusinessHours = BTreeMap<String, Vec<usize>>;

/// Day names in index order.  Index `0` is the first teaching day.
pub const DAY_NAMES: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Map a case-insensitive day name onto its 0-based index.
pub fn day_index(name: &str) -> Option<usize> {
    let lower = name.trim().to_ascii_lowercase();
    DAY_NAMES.iter().position(|d| *d == lower)
}

// ── Cell state ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Free,
    /// Outside business hours, never schedulable.
    Blocked,
    /// Taken by a placed or locked session.
    Occupied,
}

// ── Grid ──────────────────────────────────────────────────────────────────────

/// Boolean-style weekly occupancy matrix, stored row-major by day.
#[derive(Debug, Clone)]
pub struct Grid {
    days: usize,
    periods: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Allocate a `days × periods` grid and block every period that
    /// `business_hours` does not list for its day.
    ///
    /// A known day whose index is `>= days` is ignored (logged), as is any
    /// allowed period index `>= periods`.
    ///
    /// # Errors
    /// * [`ConfigError::NonPositiveDays`] / [`ConfigError::NonPositivePeriods`]
    ///   for non-positive dimensions.
    /// * [`ConfigError::UnknownDay`] for a key that is not a day name.
    pub fn initialize(
        days: i32,
        periods: i32,
        business_hours: &BusinessHours,
    ) -> Result<Self, ConfigError> {
        if days <= 0 {
            return Err(ConfigError::NonPositiveDays(days));
        }
        if periods <= 0 {
            return Err(ConfigError::NonPositivePeriods(periods));
        }
        let (days, periods) = (days as usize, periods as usize);

        let mut grid = Self {
            days,
            periods,
            cells: vec![Cell::Free; days * periods],
        };

        for (name, allowed) in business_hours {
            let day = day_index(name).ok_or_else(|| ConfigError::UnknownDay(name.clone()))?;
            if day >= days {
                warn!(
                    day = %name,
                    days_per_week = days,
                    "business_hours names a day outside the teaching week; ignored"
                );
                continue;
            }

            for period in 0..periods {
                if !allowed.contains(&period) {
                    grid.cells[day * periods + period] = Cell::Blocked;
                }
            }

            let ignored: Vec<usize> = allowed.iter().copied().filter(|&p| p >= periods).collect();
            if !ignored.is_empty() {
                debug!(day = %name, periods = ?ignored, "allowed periods beyond periods_per_day ignored");
            }
        }

        debug!(
            days,
            periods,
            blocked = grid.cells.iter().filter(|c| **c == Cell::Blocked).count(),
            "grid initialised"
        );

        Ok(grid)
    }

    pub fn days(&self) -> usize {
        self.days
    }

    pub fn periods(&self) -> usize {
        self.periods
    }

    fn index(&self, day: usize, period: usize) -> Result<usize, GridError> {
        if day >= self.days || period >= self.periods {
            return Err(GridError {
                day,
                period,
                days: self.days,
                periods: self.periods,
            });
        }
        Ok(day * self.periods + period)
    }

    /// `true` if the cell is neither blocked nor occupied.
    pub fn is_free(&self, day: usize, period: usize) -> Result<bool, GridError> {
        Ok(self.cells[self.index(day, period)?] == Cell::Free)
    }

    /// `true` if business hours permanently block the cell.
    pub fn is_blocked_by_hours(&self, day: usize, period: usize) -> Result<bool, GridError> {
        Ok(self.cells[self.index(day, period)?] == Cell::Blocked)
    }

    /// Mark a cell as taken.  Idempotent; a blocked cell stays blocked.
    pub fn occupy(&mut self, day: usize, period: usize) -> Result<(), GridError> {
        let idx = self.index(day, period)?;
        if self.cells[idx] == Cell::Free {
            self.cells[idx] = Cell::Occupied;
        }
        Ok(())
    }

    /// Release an occupied cell.  Blocked cells are left untouched.
    pub fn vacate(&mut self, day: usize, period: usize) -> Result<(), GridError> {
        let idx = self.index(day, period)?;
        if self.cells[idx] == Cell::Occupied {
            self.cells[idx] = Cell::Free;
        }
        Ok(())
    }

    /// `true` if all `len` cells from `(day, start)` are free.  Windows that
    /// run past the end of the day are never free.
    pub fn is_window_free(&self, day: usize, start: usize, len: usize) -> bool {
        if day >= self.days || start + len > self.periods {
            return false;
        }
        let base = day * self.periods + start;
        self.cells[base..base + len].iter().all(|c| *c == Cell::Free)
    }

    /// Occupy `len` consecutive cells from `(day, start)`.
    pub fn occupy_window(&mut self, day: usize, start: usize, len: usize) -> Result<(), GridError> {
        for period in start..start + len {
            self.occupy(day, period)?;
        }
        Ok(())
    }

    /// Vacate `len` consecutive cells from `(day, start)`.
    pub fn vacate_window(&mut self, day: usize, start: usize, len: usize) -> Result<(), GridError> {
        for period in start..start + len {
            self.vacate(day, period)?;
        }
        Ok(())
    }

    /// Number of free cells.
    pub fn free_cells(&self) -> usize {
        self.cells.iter().filter(|c| **c == Cell::Free).count()
    }

    /// Number of cells that business hours allow (free or occupied).
    pub fn available_cells(&self) -> usize {
        self.cells.iter().filter(|c| **c != Cell::Blocked).count()
    }

    /// Fraction of available cells that are occupied.  `0.0` for a grid that
    /// business hours block entirely.
    pub fn occupancy_ratio(&self) -> f64 {
        let available = self.available_cells();
        if available == 0 {
            return 0.0;
        }
        (available - self.free_cells()) as f64 / available as f64
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
