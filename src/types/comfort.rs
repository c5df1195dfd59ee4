// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Comfort level preference.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// How aggressively the user accepts comfort loss in exchange for savings.
///
/// Stored in the settings store under `CL` as its ordinal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum ComfortLevel {
    /// Smallest offsets.
    #[default]
    MaxComfort = 0,
    /// Offsets widened by one unit.
    Balanced = 1,
    /// Offsets widened by two units.
    MaxSavings = 2,
}

impl ComfortLevel {
    /// All comfort levels, most comfortable first.
    pub const ALL: [Self; 3] = [Self::MaxComfort, Self::Balanced, Self::MaxSavings];

    /// Amount added to both calibration bounds for this level.
    #[must_use]
    pub const fn offset_bonus(self) -> f64 {
        match self {
            Self::MaxComfort => 0.0,
            Self::Balanced => 1.0,
            Self::MaxSavings => 2.0,
        }
    }

    /// Key of this level's nested offset tables in the settings file.
    #[must_use]
    pub const fn settings_key(self) -> &'static str {
        match self {
            Self::MaxComfort => "MaxComfort",
            Self::Balanced => "Balanced",
            Self::MaxSavings => "MaxSavings",
        }
    }

    /// Interprets a stored numeric value, truncating any fractional part.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidComfortLevel`] for anything outside 0-2.
    pub fn from_f64(value: f64) -> Result<Self, ValueError> {
        if !(0.0..3.0).contains(&value) {
            return Err(ValueError::InvalidComfortLevel(value.to_string()));
        }
        // Safe: range checked above
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self::try_from(value as u8)
    }
}

impl fmt::Display for ComfortLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.settings_key())
    }
}

impl TryFrom<u8> for ComfortLevel {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::MaxComfort),
            1 => Ok(Self::Balanced),
            2 => Ok(Self::MaxSavings),
            other => Err(ValueError::InvalidComfortLevel(other.to_string())),
        }
    }
}

impl From<ComfortLevel> for u8 {
    fn from(level: ComfortLevel) -> Self {
        level as u8
    }
}
