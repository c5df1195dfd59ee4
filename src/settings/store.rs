// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON-backed settings store.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::defaults::{default_schema, flat_default};
use super::keys;
use crate::error::SettingsError;
use crate::types::{ComfortLevel, GridState};

/// One of the nested per-comfort-level offset tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffsetTable {
    /// Thermostat setpoint offsets (°F).
    Setpoint,
    /// Dimmer level offsets (%).
    LightLevel,
    /// Switch duty cycles (%).
    DutyCycle,
}

impl OffsetTable {
    /// Key of the table inside a comfort-level block.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Setpoint => "setpoint_offsets",
            Self::LightLevel => "light_level_offsets",
            Self::DutyCycle => "duty_cycle_offsets",
        }
    }
}

/// Persisted key/value configuration.
///
/// All mutations take the write lock and hold it across the file write, so
/// concurrent writers are serialized and the file always reflects one
/// complete snapshot.
///
/// # Examples
///
/// ```
/// use demand_optimizer::settings::{SettingsStore, keys};
///
/// let store = SettingsStore::in_memory();
/// assert!(store.set(keys::COOLING_BASELINE, 76));
/// assert_eq!(store.cooling_baseline(), 76.0);
/// assert!(store.is_changed(keys::COOLING_BASELINE, &serde_json::json!("75")));
/// ```
#[derive(Debug)]
pub struct SettingsStore {
    /// Backing file; `None` keeps settings in memory only.
    path: Option<PathBuf>,
    values: RwLock<Map<String, Value>>,
}

impl SettingsStore {
    /// Opens the store at `path`, falling back to defaults on any error.
    ///
    /// A missing file is created with the default schema. A file that cannot
    /// be read or parsed is left untouched and defaults are used in memory.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::try_open(&path) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to load settings, using defaults");
                Self {
                    path: Some(path),
                    values: RwLock::new(default_schema()),
                }
            }
        }
    }

    /// Opens the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a
    /// JSON object. Failing to write the defaults for a missing file is only
    /// logged.
    pub fn try_open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            tracing::info!(path = %path.display(), "No settings file found, writing defaults");
            let values = default_schema();
            if let Err(e) = persist(&path, &values) {
                tracing::error!(path = %path.display(), error = %e, "Failed to write default settings");
            }
            return Ok(Self {
                path: Some(path),
                values: RwLock::new(values),
            });
        }

        let contents = fs::read_to_string(&path)?;
        let values: Map<String, Value> = serde_json::from_str(&contents)?;
        tracing::info!(path = %path.display(), "Loaded settings");

        Ok(Self {
            path: Some(path),
            values: RwLock::new(values),
        })
    }

    /// Creates a store with the default schema that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: RwLock::new(default_schema()),
        }
    }

    /// Returns the backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // =========================================================================
    // Generic access
    // =========================================================================

    /// Returns the stored value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Returns the stored value for `key`, or `default` when absent.
    #[must_use]
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.get(key).unwrap_or_else(|| default.into())
    }

    /// Returns the numeric value for `key`, or `default` when absent or not
    /// numeric. Numeric strings are accepted.
    #[must_use]
    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.values
            .read()
            .get(key)
            .and_then(as_number)
            .unwrap_or(default)
    }

    /// Numeric value of a flat key, falling back to its first-run value.
    fn number(&self, key: &str) -> f64 {
        self.get_f64(key, flat_default(key))
    }

    /// Stores `value` under `key` and persists.
    ///
    /// Returns `false` if persisting failed; the in-memory value is updated
    /// either way.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let mut values = self.values.write();
        values.insert(key.to_string(), value.into());
        self.save_locked(&values)
    }

    /// Returns `true` if `value` differs numerically from the stored value.
    ///
    /// Non-numeric or missing values never count as changed.
    #[must_use]
    pub fn is_changed(&self, key: &str, value: &Value) -> bool {
        let values = self.values.read();
        match (values.get(key).and_then(as_number), as_number(value)) {
            (Some(stored), Some(new)) => (stored - new).abs() > f64::EPSILON,
            _ => false,
        }
    }

    /// Stores every entry of `entries` and persists once.
    pub fn update<I, K>(&self, entries: I) -> bool
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut values = self.values.write();
        for (key, value) in entries {
            values.insert(key.into(), value);
        }
        self.save_locked(&values)
    }

    /// Removes `key`. Returns `true` when nothing needed persisting.
    pub fn delete(&self, key: &str) -> bool {
        let mut values = self.values.write();
        if values.remove(key).is_some() {
            self.save_locked(&values)
        } else {
            true
        }
    }

    /// Returns `true` if `key` is stored.
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// Returns a snapshot of every setting.
    #[must_use]
    pub fn all(&self) -> Map<String, Value> {
        self.values.read().clone()
    }

    /// Replaces everything with the default schema and persists.
    pub fn reset_to_defaults(&self) -> bool {
        let mut values = self.values.write();
        *values = default_schema();
        self.save_locked(&values)
    }

    fn save_locked(&self, values: &Map<String, Value>) -> bool {
        let Some(path) = &self.path else {
            return true;
        };
        match persist(path, values) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to save settings");
                false
            }
        }
    }

    // =========================================================================
    // Typed accessors
    // =========================================================================

    /// Comfort level; an unreadable stored value falls back to max comfort.
    #[must_use]
    pub fn comfort_level(&self) -> ComfortLevel {
        let raw = self.number(keys::COMFORT_LEVEL);
        ComfortLevel::from_f64(raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Stored comfort level is invalid, using max comfort");
            ComfortLevel::MaxComfort
        })
    }

    /// Stores the comfort level.
    pub fn set_comfort_level(&self, level: ComfortLevel) -> bool {
        self.set(keys::COMFORT_LEVEL, u8::from(level))
    }

    /// Cooling setpoint baseline (°F).
    #[must_use]
    pub fn cooling_baseline(&self) -> f64 {
        self.number(keys::COOLING_BASELINE)
    }

    /// Heating setpoint baseline (°F).
    #[must_use]
    pub fn heating_baseline(&self) -> f64 {
        self.number(keys::HEATING_BASELINE)
    }

    /// Light level baseline (%).
    #[must_use]
    pub fn light_level_baseline(&self) -> f64 {
        self.number(keys::LIGHT_LEVEL_BASELINE)
    }

    /// Duty cycle baseline (%).
    #[must_use]
    pub fn duty_cycle_baseline(&self) -> f64 {
        self.number(keys::DUTY_CYCLE_BASELINE)
    }

    /// Smallest setpoint offset (°F).
    #[must_use]
    pub fn min_setpoint_offset(&self) -> f64 {
        self.number(keys::MIN_SETPOINT_OFFSET)
    }

    /// Largest setpoint offset (°F).
    #[must_use]
    pub fn max_setpoint_offset(&self) -> f64 {
        self.number(keys::MAX_SETPOINT_OFFSET)
    }

    /// Smallest light adjustment offset (%).
    #[must_use]
    pub fn min_light_offset(&self) -> f64 {
        self.number(keys::MIN_LIGHT_OFFSET)
    }

    /// Largest light adjustment offset (%).
    #[must_use]
    pub fn max_light_offset(&self) -> f64 {
        self.number(keys::MAX_LIGHT_OFFSET)
    }

    /// Mildest duty cycle (%).
    #[must_use]
    pub fn min_duty_cycle(&self) -> f64 {
        self.number(keys::MIN_DUTY_CYCLE)
    }

    /// Most aggressive duty cycle (%).
    #[must_use]
    pub fn max_duty_cycle(&self) -> f64 {
        self.number(keys::MAX_DUTY_CYCLE)
    }

    /// Price mirror.
    #[must_use]
    pub fn price(&self) -> f64 {
        self.number(keys::PRICE)
    }

    /// Greenhouse gas emissions mirror.
    #[must_use]
    pub fn greenhouse_gas(&self) -> f64 {
        self.number(keys::GREENHOUSE_GAS)
    }

    /// Last grid status mirrored from the VEN.
    #[must_use]
    pub fn current_grid_status(&self) -> GridState {
        self.get(keys::CURRENT_GRID_STATUS)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Mirrors the grid status.
    pub fn set_current_grid_status(&self, state: GridState) -> bool {
        self.set(keys::CURRENT_GRID_STATUS, state.ordinal())
    }

    /// Returns one of the nested per-comfort-level tables, indexed by grid
    /// state ordinal. `None` if any of the four entries is missing.
    #[must_use]
    pub fn offset_table(&self, level: ComfortLevel, table: OffsetTable) -> Option<[f64; 4]> {
        let values = self.values.read();
        let entries = values
            .get(level.settings_key())?
            .get(table.key())?
            .as_object()?;

        let mut ladder = [0.0; 4];
        for state in GridState::ALL {
            ladder[state.index()] = entries
                .get(&state.ordinal().to_string())
                .and_then(as_number)?;
        }
        Some(ladder)
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn persist(path: &Path, values: &Map<String, Value>) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(values)?;
    fs::write(path, contents)?;
    Ok(())
}
