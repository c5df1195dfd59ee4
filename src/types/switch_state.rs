// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On/off state of a switched load.

use std::fmt;

use serde::Serialize;

use crate::gateway::control;

/// Power state of a switch, as reported by telemetry or commanded by the
/// duty-cycle loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SwitchState {
    /// Load is off.
    Off,
    /// Load is on.
    On,
}

impl SwitchState {
    /// Interprets a telemetry level: zero is off, anything else is on.
    #[must_use]
    pub fn from_level(level: f64) -> Self {
        if level == 0.0 { Self::Off } else { Self::On }
    }

    /// Numeric form used in event records.
    #[must_use]
    pub const fn as_level(self) -> f64 {
        match self {
            Self::Off => 0.0,
            Self::On => 1.0,
        }
    }

    /// Gateway command that drives the device into this state.
    #[must_use]
    pub const fn command_id(self) -> &'static str {
        match self {
            Self::Off => control::OFF,
            Self::On => control::ON,
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "OFF",
            Self::On => "ON",
        })
    }
}

impl From<bool> for SwitchState {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}
