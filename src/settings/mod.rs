// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persisted user configuration.
//!
//! The [`SettingsStore`] is the single source of truth consulted by every
//! optimizer: comfort level, baselines, calibration bounds, telemetry mirrors
//! and the per-comfort-level offset tables. It is backed by a JSON object on
//! disk and persisted synchronously on every mutation.
//!
//! # File Layout
//!
//! ```json
//! {
//!   "CL": 0,
//!   "CSP_F": 74,
//!   "HSP_F": 68,
//!   "MaxComfort": {
//!     "setpoint_offsets": { "0": 0, "1": 1, "2": 2, "3": 4 },
//!     "light_level_offsets": { "0": 0, "1": 10, "2": 30, "3": 50 },
//!     "duty_cycle_offsets": { "0": 90, "1": 85, "2": 80, "3": 50 }
//!   }
//! }
//! ```
//!
//! # Durability
//!
//! Writes are best effort: when the file cannot be written, the mutation
//! still takes effect in memory and the call returns `false`.

mod defaults;
pub mod keys;
mod store;

pub use defaults::{default_ladder, default_schema};
pub use store::{OffsetTable, SettingsStore};
