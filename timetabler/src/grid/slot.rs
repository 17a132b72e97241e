/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! First-fit slot search over a [`Grid`].
//!
//! Traversal order is fixed: days ascending, then start periods ascending.
//! The first window of `duration` free cells wins.  Identical grids therefore
//! always yield identical answers, which is what makes generation
//! reproducible.
//!
//! ```text
//!            p0  p1  p2  p3  p4  p5
//! day 0   →  ①   ②   ③   ④   ⑤        (duration 2: starts 0..=4)
//! day 1   →  ⑥   ⑦   ...
//! ```

use super::Grid;

/// Order in which days are scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayOrder {
    /// `0, 1, …, days-1`.
    #[default]
    Sequential,
    /// `d, d+1, …, days-1, 0, …, d-1`, used to spread one course's theory
    /// sessions across the week.
    StartingAt(usize),
}

impl DayOrder {
    fn days(self, count: usize) -> impl Iterator<Item = usize> {
        let start = match self {
            DayOrder::Sequential => 0,
            DayOrder::StartingAt(d) if count > 0 => d % count,
            DayOrder::StartingAt(_) => 0,
        };
        (0..count).map(move |i| (start + i) % count)
    }
}

/// Return the first `(day, period)` start where `duration` consecutive cells
/// are free, or `None` if no such window exists.
pub fn find_slot(grid: &Grid, duration: usize) -> Option<(usize, usize)> {
    find_slot_where(grid, duration, DayOrder::Sequential, |_, _| true)
}

/// Like [`find_slot`], but scans days in `order` and only returns a window
/// that `accept(day, start)` also approves.
///
/// `duration == 0` and `duration > periods_per_day` never match.
pub fn find_slot_where<F>(
    grid: &Grid,
    duration: usize,
    order: DayOrder,
    mut accept: F,
) -> Option<(usize, usize)>
where
    F: FnMut(usize, usize) -> bool,
{
    if duration == 0 || duration > grid.periods() {
        return None;
    }
    for day in order.days(grid.days()) {
        for start in 0..=grid.periods() - duration {
            if grid.is_window_free(day, start, duration) && accept(day, start) {
                return Some((day, start));
            }
        }
    }
    None
}

/// Every feasible start for `duration`, in traversal order.
pub fn candidates(grid: &Grid, duration: usize) -> Vec<(usize, usize)> {
    if duration == 0 || duration > grid.periods() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for day in 0..grid.days() {
        for start in 0..=grid.periods() - duration {
            if grid.is_window_free(day, start, duration) {
                out.push((day, start));
            }
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
