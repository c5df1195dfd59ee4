// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flat setting keys.
//!
//! The keys double as the control codes the VEN device reports, so a VEN
//! control update can be written straight into the store.

/// Comfort level (0 max comfort, 1 balanced, 2 max savings).
pub const COMFORT_LEVEL: &str = "CL";
/// Price mirror.
pub const PRICE: &str = "ST";
/// Greenhouse gas emissions mirror.
pub const GREENHOUSE_GAS: &str = "GHG";
/// Current grid status mirror.
pub const CURRENT_GRID_STATUS: &str = "CGS";
/// Cooling setpoint baseline (°F).
pub const COOLING_BASELINE: &str = "CSP_F";
/// Heating setpoint baseline (°F).
pub const HEATING_BASELINE: &str = "HSP_F";
/// Light level baseline (%).
pub const LIGHT_LEVEL_BASELINE: &str = "CLL";
/// Duty cycle baseline (%).
pub const DUTY_CYCLE_BASELINE: &str = "DCB";
/// Smallest setpoint offset (°F).
pub const MIN_SETPOINT_OFFSET: &str = "MIN_OFF_DEG";
/// Largest setpoint offset (°F).
pub const MAX_SETPOINT_OFFSET: &str = "MAX_OFF_DEG";
/// Smallest light adjustment offset (%).
pub const MIN_LIGHT_OFFSET: &str = "MIN_LAO";
/// Largest light adjustment offset (%).
pub const MAX_LIGHT_OFFSET: &str = "MAX_LAO";
/// Mildest duty cycle (%).
pub const MIN_DUTY_CYCLE: &str = "MIN_DCO";
/// Most aggressive duty cycle (%).
pub const MAX_DUTY_CYCLE: &str = "MAX_DCO";
