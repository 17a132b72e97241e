/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Bounded depth-first search for the lab tier.
//!
//! Greedy first-fit can strand a lab block when an earlier block took the
//! only window long enough for it.  When that happens the planner hands the
//! whole lab tier to [`search_largest`], which runs [`search`] over every
//! block that has a window at all and, failing that, over the largest prefix
//! of blocks it can admit one by one.  [`search`] tries candidate starts in
//! the same traversal order as the slot finder, so output stays
//! deterministic.
//!
//! Each search visits at most `budget` candidate placements.  Running out of
//! budget is not an error; the planner keeps the greedy result unless the
//! search placed more blocks.

use tracing::debug;

use crate::course::CourseRequirement;
use crate::grid::{slot, Grid};

use super::{PlannerOptions, TeacherLoad};

/// One lab session still to be placed.
#[derive(Debug, Clone, Copy)]
pub struct LabBlock<'a> {
    pub requirement: &'a CourseRequirement,
    pub size: usize,
}

impl LabBlock<'_> {
    /// Two blocks of the same requirement are interchangeable.
    fn same_as(&self, other: &LabBlock<'_>) -> bool {
        std::ptr::eq(self.requirement, other.requirement) && self.size == other.size
    }
}

struct Search<'a, 'b> {
    blocks: &'b [LabBlock<'a>],
    options: &'b PlannerOptions,
    budget: usize,
    visited: usize,
    placed: Vec<(usize, usize)>,
}

/// Try to place every block in `blocks`.
///
/// On success `grid` and `load` hold the complete assignment and the start of
/// each block (same order as `blocks`) is returned.  On failure both are
/// restored to their input state.
pub fn search(
    grid: &mut Grid,
    load: &mut TeacherLoad,
    blocks: &[LabBlock<'_>],
    options: &PlannerOptions,
    budget: usize,
) -> Option<Vec<(usize, usize)>> {
    let mut s = Search {
        blocks,
        options,
        budget,
        visited: 0,
        placed: Vec::with_capacity(blocks.len()),
    };
    let found = s.place(grid, load, 0);
    debug!(
        blocks = blocks.len(),
        visited = s.visited,
        budget,
        found,
        "lab backtracking finished"
    );
    found.then_some(s.placed)
}

/// Place as many of `blocks` as possible, preferring earlier blocks.
///
/// Blocks with no admissible window in the starting grid are left out up
/// front.  If the rest cannot all be placed together, blocks are admitted
/// one at a time in order and each is kept only if the admitted set still
/// has a complete assignment.
///
/// Returns the start of each block (`None` for blocks left out).  `grid` and
/// `load` hold the assignment of the placed ones.
pub fn search_largest(
    grid: &mut Grid,
    load: &mut TeacherLoad,
    blocks: &[LabBlock<'_>],
    options: &PlannerOptions,
    budget: usize,
) -> Vec<Option<(usize, usize)>> {
    let mut result = vec![None; blocks.len()];

    let fits: Vec<usize> = (0..blocks.len())
        .filter(|&i| {
            let b = &blocks[i];
            let teacher = b.requirement.teacher_id.as_str();
            slot::candidates(grid, b.size)
                .into_iter()
                .any(|(day, start)| options.teacher_available(teacher, day, start, b.size))
        })
        .collect();
    if fits.is_empty() {
        return result;
    }

    let subset: Vec<LabBlock<'_>> = fits.iter().map(|&i| blocks[i]).collect();
    if let Some(starts) = search(grid, load, &subset, options, budget) {
        for (&i, start) in fits.iter().zip(starts) {
            result[i] = Some(start);
        }
        return result;
    }

    let mut admitted: Vec<usize> = Vec::new();
    let mut best: Option<(Grid, TeacherLoad, Vec<(usize, usize)>)> = None;

    for &i in &fits {
        let mut trial_idx = admitted.clone();
        trial_idx.push(i);
        let trial: Vec<LabBlock<'_>> = trial_idx.iter().map(|&j| blocks[j]).collect();

        let (mut g, mut l) = (grid.clone(), load.clone());
        if let Some(starts) = search(&mut g, &mut l, &trial, options, budget) {
            admitted = trial_idx;
            best = Some((g, l, starts));
        }
    }

    debug!(
        blocks = blocks.len(),
        fits = fits.len(),
        admitted = admitted.len(),
        "lab backtracking fell back to a subset"
    );

    if let Some((g, l, starts)) = best {
        *grid = g;
        *load = l;
        for (&i, start) in admitted.iter().zip(starts) {
            result[i] = Some(start);
        }
    }
    result
}

impl Search<'_, '_> {
    fn place(&mut self, grid: &mut Grid, load: &mut TeacherLoad, idx: usize) -> bool {
        let Some(block) = self.blocks.get(idx).copied() else {
            return true;
        };

        // Not enough free cells left for the remaining blocks.
        let remaining: usize = self.blocks[idx..].iter().map(|b| b.size).sum();
        if remaining > grid.free_cells() {
            return false;
        }

        // Interchangeable blocks are placed in traversal order only.
        let floor = match idx.checked_sub(1) {
            Some(prev) if block.same_as(&self.blocks[prev]) => self.placed.get(prev).copied(),
            _ => None,
        };

        let teacher = block.requirement.teacher_id.as_str();
        let limit = self.options.limit_for(teacher);

        for (day, start) in slot::candidates(grid, block.size) {
            if floor.is_some_and(|f| (day, start) <= f) {
                continue;
            }
            if self.visited >= self.budget {
                return false;
            }
            self.visited += 1;

            if !self.options.teacher_available(teacher, day, start, block.size)
                || !load.admits(teacher, day, block.size, limit)
            {
                continue;
            }

            if grid.occupy_window(day, start, block.size).is_err() {
                continue;
            }
            load.add(teacher, day, block.size);
            self.placed.push((day, start));

            if self.place(grid, load, idx + 1) {
                return true;
            }

            self.placed.pop();
            load.remove(teacher, day, block.size);
            // The window was free a moment ago, so this cannot fail.
            let _ = grid.vacate_window(day, start, block.size);
        }

        false
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
