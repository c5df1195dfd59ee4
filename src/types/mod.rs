// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared by the settings store, the optimizers and the manager.
//!
//! # Types
//!
//! - [`GridState`] - Ordinal demand-reduction urgency (Normal..Emergency)
//! - [`ComfortLevel`] - User preference between comfort and savings
//! - [`SwitchState`] - On/Off state of a switched load
//! - [`DeviceAddress`] - Stable key of a device on the gateway

mod address;
mod comfort;
mod grid_state;
mod switch_state;

pub use address::DeviceAddress;
pub use comfort::ComfortLevel;
pub use grid_state::GridState;
pub use switch_state::SwitchState;
