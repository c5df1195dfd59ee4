// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control codes used on the gateway event stream and in commands.

/// Thermostat cooling setpoint.
pub const COOL_SETPOINT: &str = "CLISPC";
/// Thermostat heating setpoint.
pub const HEAT_SETPOINT: &str = "CLISPH";
/// Primary status. Temperature on thermostats, level on dimmers and switches,
/// price on the VEN.
pub const STATUS: &str = "ST";
/// Thermostat mode.
pub const THERMOSTAT_MODE: &str = "CLIMD";
/// Dimmer on-level.
pub const ON_LEVEL: &str = "OL";
/// Dimmer ramp rate.
pub const RAMP_RATE: &str = "RR";

/// Turn on, optionally to a level.
pub const ON: &str = "DON";
/// Fast on.
pub const FAST_ON: &str = "DFON";
/// Turn off.
pub const OFF: &str = "DOF";

/// VEN grid state.
pub const GRID_STATUS: &str = "CGS";
/// VEN greenhouse gas emissions.
pub const GREENHOUSE_GAS: &str = "GHG";

/// System control: node added, removed or enabled.
pub const NODE_UPDATED: &str = "_3";
/// System control: gateway busy.
pub const SYSTEM_BUSY: &str = "_5";
/// System control: progress report.
pub const PROGRESS: &str = "_7";

/// Address suffix identifying the VEN node.
pub const VEN_SUFFIX: &str = "oadr3ven";

/// Node-updated action: node removed.
pub const NODE_REMOVED: &str = "NR";
/// Node-updated action: node added.
pub const NODE_ADDED: &str = "ND";
/// Node-updated action: node enabled or disabled.
pub const NODE_ENABLED: &str = "EN";

/// Returns `true` for system controls (leading underscore).
#[must_use]
pub fn is_system(control: &str) -> bool {
    control.starts_with('_')
}
