// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-grid-state offset tables.

use crate::types::{ComfortLevel, GridState};

/// Offsets from the baseline, one per grid state.
///
/// # Examples
///
/// ```
/// use demand_optimizer::optimizer::Calibration;
/// use demand_optimizer::types::{ComfortLevel, GridState};
///
/// let cal = Calibration::linear(ComfortLevel::MaxComfort, 1.0, 4.0);
/// assert_eq!(cal.offsets(), [0.0, 1.0, 2.0, 4.0]);
/// assert_eq!(cal.offset(GridState::High), 2.0);
/// assert_eq!(cal.offset_for_level(9), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Calibration {
    offsets: [f64; 4],
}

impl Calibration {
    /// Creates a table from explicit offsets.
    #[must_use]
    pub const fn new(offsets: [f64; 4]) -> Self {
        Self { offsets }
    }

    /// Spreads `[min, max]` over the active states.
    ///
    /// Both bounds are first widened by the comfort level's bonus. Normal
    /// gets 0, moderate the lower bound, emergency the upper bound, and
    /// high sits a whole-unit half step above the lower bound.
    #[must_use]
    pub fn linear(comfort: ComfortLevel, min: f64, max: f64) -> Self {
        let bonus = comfort.offset_bonus();
        let (lo, hi) = ordered(min + bonus, max + bonus);
        let step = ((hi - lo) / 2.0).trunc();
        Self {
            offsets: [0.0, lo, lo + step, hi],
        }
    }

    /// Uses `ladder` as is, clamping every entry into the range spanned by
    /// `bound_a` and `bound_b`.
    #[must_use]
    pub fn from_ladder(ladder: [f64; 4], bound_a: f64, bound_b: f64) -> Self {
        let (lo, hi) = ordered(bound_a, bound_b);
        Self {
            offsets: ladder.map(|v| v.clamp(lo, hi)),
        }
    }

    /// Offset for `state`.
    #[must_use]
    pub const fn offset(&self, state: GridState) -> f64 {
        self.offsets[state.index()]
    }

    /// Offset for a raw grid level; anything outside 0-3 yields 0.
    #[must_use]
    pub fn offset_for_level(&self, level: i64) -> f64 {
        GridState::try_from(level).map_or(0.0, |state| self.offset(state))
    }

    /// All four offsets, normal first.
    #[must_use]
    pub const fn offsets(&self) -> [f64; 4] {
        self.offsets
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}
