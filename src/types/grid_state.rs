// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Grid state signal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Demand-reduction urgency reported by the grid operator.
///
/// States are ordered by severity, so comparisons such as
/// `state >= GridState::High` read naturally. Signals are not guaranteed to
/// arrive in increasing order.
///
/// # Examples
///
/// ```
/// use demand_optimizer::types::GridState;
///
/// let state: GridState = "2".parse().unwrap();
/// assert_eq!(state, GridState::High);
/// assert!(GridState::Emergency > state);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum GridState {
    /// No demand reduction requested.
    #[default]
    Normal = 0,
    /// Mild reduction.
    Moderate = 1,
    /// Significant reduction.
    High = 2,
    /// Maximum reduction.
    Emergency = 3,
}

impl GridState {
    /// All states, least severe first.
    pub const ALL: [Self; 4] = [Self::Normal, Self::Moderate, Self::High, Self::Emergency];

    /// Returns the ordinal (0-3).
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Index into four-entry per-state tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns `true` for every state but [`GridState::Normal`].
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl fmt::Display for GridState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Emergency => "emergency",
        };
        f.write_str(name)
    }
}

impl TryFrom<u8> for GridState {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Moderate),
            2 => Ok(Self::High),
            3 => Ok(Self::Emergency),
            other => Err(ValueError::InvalidGridState(other.to_string())),
        }
    }
}

impl TryFrom<i64> for GridState {
    type Error = ValueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| ValueError::InvalidGridState(value.to_string()))
            .and_then(Self::try_from)
    }
}

impl From<GridState> for u8 {
    fn from(state: GridState) -> Self {
        state.ordinal()
    }
}

impl FromStr for GridState {
    type Err = ValueError;

    /// Accepts integer text as sent by the gateway (`"3"`), tolerating a
    /// zero fractional part (`"3.0"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value: f64 = trimmed
            .parse()
            .map_err(|_| ValueError::InvalidGridState(s.to_string()))?;
        if value.fract() != 0.0 {
            return Err(ValueError::InvalidGridState(s.to_string()));
        }
        // Safe: checked integral above, out-of-range values rejected below
        #[allow(clippy::cast_possible_truncation)]
        Self::try_from(value as i64).map_err(|_| ValueError::InvalidGridState(s.to_string()))
    }
}
