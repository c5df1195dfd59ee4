// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Default settings schema written on first run.

use serde_json::{Map, Value, json};

use super::keys;
use super::store::OffsetTable;
use crate::types::ComfortLevel;

/// Flat numeric keys with their first-run values.
const FLAT: [(&str, i32); 14] = [
    (keys::COMFORT_LEVEL, 0),
    (keys::PRICE, 0),
    (keys::GREENHOUSE_GAS, 0),
    (keys::CURRENT_GRID_STATUS, 0),
    (keys::COOLING_BASELINE, 74),
    (keys::HEATING_BASELINE, 68),
    (keys::LIGHT_LEVEL_BASELINE, 100),
    (keys::DUTY_CYCLE_BASELINE, 100),
    (keys::MIN_SETPOINT_OFFSET, 1),
    (keys::MAX_SETPOINT_OFFSET, 4),
    (keys::MIN_LIGHT_OFFSET, 10),
    (keys::MAX_LIGHT_OFFSET, 50),
    (keys::MIN_DUTY_CYCLE, 90),
    (keys::MAX_DUTY_CYCLE, 50),
];

/// First-run value of a flat numeric key, 0 for keys without one.
pub(crate) fn flat_default(key: &str) -> f64 {
    FLAT.iter()
        .find(|(k, _)| *k == key)
        .map_or(0.0, |&(_, value)| f64::from(value))
}

/// Per-comfort-level offset ladders, indexed by grid state ordinal:
/// setpoint (°F), light level (%), duty cycle (%).
fn ladders(level: ComfortLevel) -> ([u8; 4], [u8; 4], [u8; 4]) {
    match level {
        ComfortLevel::MaxComfort => ([0, 1, 2, 4], [0, 10, 30, 50], [90, 85, 80, 50]),
        ComfortLevel::Balanced => ([0, 2, 3, 5], [0, 11, 31, 51], [80, 70, 60, 50]),
        ComfortLevel::MaxSavings => ([0, 3, 4, 6], [0, 12, 32, 52], [70, 60, 50, 50]),
    }
}

/// Built-in ladder for `level`, used when the stored table is incomplete.
#[must_use]
pub fn default_ladder(level: ComfortLevel, table: OffsetTable) -> [f64; 4] {
    let (setpoint, light, duty) = ladders(level);
    let values = match table {
        OffsetTable::Setpoint => setpoint,
        OffsetTable::LightLevel => light,
        OffsetTable::DutyCycle => duty,
    };
    values.map(f64::from)
}

fn table(values: [u8; 4]) -> Value {
    json!({
        "0": values[0],
        "1": values[1],
        "2": values[2],
        "3": values[3],
    })
}

/// Returns the full default schema: flat keys plus one nested block of
/// offset tables per comfort level.
#[must_use]
pub fn default_schema() -> Map<String, Value> {
    let mut schema = Map::new();
    for (key, value) in FLAT {
        schema.insert(key.into(), json!(value));
    }

    for level in ComfortLevel::ALL {
        let (setpoint, light, duty) = ladders(level);
        schema.insert(
            level.settings_key().into(),
            json!({
                "setpoint_offsets": table(setpoint),
                "light_level_offsets": table(light),
                "duty_cycle_offsets": table(duty),
            }),
        );
    }

    schema
}
