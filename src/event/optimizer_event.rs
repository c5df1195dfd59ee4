// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Optimization and lifecycle event records.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::manager::DeviceKind;
use crate::types::{DeviceAddress, GridState};

/// A value an optimizer successfully applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedSetting {
    /// Property or command identifier.
    pub property: String,
    /// Applied value.
    pub value: f64,
}

impl AppliedSetting {
    /// Creates a record.
    #[must_use]
    pub fn new(property: impl Into<String>, value: f64) -> Self {
        Self {
            property: property.into(),
            value,
        }
    }
}

/// Events published by optimizers and the device manager.
///
/// These form the optimization history of every device: what was applied,
/// what was skipped, and when a user took control back.
///
/// # Examples
///
/// ```
/// use demand_optimizer::event::{EventBus, OptimizerEvent};
/// use demand_optimizer::types::{DeviceAddress, GridState};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(OptimizerEvent::GridStateChanged { state: GridState::High });
/// assert!(rx.try_recv().unwrap().address().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerEvent {
    /// Commands were applied for a grid state.
    Optimized {
        /// Device.
        address: DeviceAddress,
        /// Grid state the commands target.
        grid_state: GridState,
        /// Values that the gateway accepted.
        applied: Vec<AppliedSetting>,
    },

    /// A target was computed but nothing needed sending.
    NoAdjustmentNeeded {
        /// Device.
        address: DeviceAddress,
        /// Grid state evaluated.
        grid_state: GridState,
        /// Short explanation.
        reason: String,
    },

    /// Observed state diverged from what automation applied.
    UserOverride {
        /// Device.
        address: DeviceAddress,
        /// Diverging property.
        property: String,
        /// Value automation applied.
        requested: f64,
        /// Value the device reports.
        observed: f64,
    },

    /// Automation is suspended for the device.
    OptedOut {
        /// Device.
        address: DeviceAddress,
        /// Local time automation resumes.
        until: DateTime<Local>,
    },

    /// A previous opt-out has expired.
    OptOutExpired {
        /// Device.
        address: DeviceAddress,
    },

    /// A switch started duty cycling, or was driven fully on or off.
    DutyCycleStarted {
        /// Device.
        address: DeviceAddress,
        /// Duty cycle percentage.
        percent: u8,
    },

    /// A switch stopped duty cycling.
    DutyCycleStopped {
        /// Device.
        address: DeviceAddress,
        /// Whether the initial state was restored.
        restored: bool,
    },

    /// A device was classified and an optimizer created for it.
    DeviceClassified {
        /// Device.
        address: DeviceAddress,
        /// Chosen optimizer kind.
        kind: DeviceKind,
    },

    /// An optimizer was removed.
    DeviceEvicted {
        /// Device.
        address: DeviceAddress,
        /// Kind of the removed optimizer.
        kind: DeviceKind,
    },

    /// The VEN reported a new grid state.
    GridStateChanged {
        /// New state.
        state: GridState,
    },

    /// The gateway event stream connected or dropped.
    SubscriptionChanged {
        /// Whether the stream is live.
        connected: bool,
    },
}

impl OptimizerEvent {
    /// Returns the device this event concerns, if any.
    #[must_use]
    pub fn address(&self) -> Option<&DeviceAddress> {
        match self {
            Self::Optimized { address, .. }
            | Self::NoAdjustmentNeeded { address, .. }
            | Self::UserOverride { address, .. }
            | Self::OptedOut { address, .. }
            | Self::OptOutExpired { address }
            | Self::DutyCycleStarted { address, .. }
            | Self::DutyCycleStopped { address, .. }
            | Self::DeviceClassified { address, .. }
            | Self::DeviceEvicted { address, .. } => Some(address),
            Self::GridStateChanged { .. } | Self::SubscriptionChanged { .. } => None,
        }
    }

    /// Returns `true` for events that change a device's opt-out status.
    #[must_use]
    pub fn is_opt_out(&self) -> bool {
        matches!(
            self,
            Self::UserOverride { .. } | Self::OptedOut { .. } | Self::OptOutExpired { .. }
        )
    }

    /// Returns `true` for device registration changes.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::DeviceClassified { .. } | Self::DeviceEvicted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> DeviceAddress {
        DeviceAddress::from("n1")
    }

    #[test]
    fn address_extraction() {
        let event = OptimizerEvent::OptOutExpired { address: addr() };
        assert_eq!(event.address(), Some(&addr()));

        let event = OptimizerEvent::SubscriptionChanged { connected: true };
        assert!(event.address().is_none());
    }

    #[test]
    fn classification_helpers() {
        let event = OptimizerEvent::UserOverride {
            address: addr(),
            property: "CLISPC".into(),
            requested: 76.0,
            observed: 72.0,
        };
        assert!(event.is_opt_out());
        assert!(!event.is_lifecycle());

        let event = OptimizerEvent::DeviceEvicted {
            address: addr(),
            kind: DeviceKind::Switch,
        };
        assert!(event.is_lifecycle());
    }

    #[test]
    fn serializes_with_type_tag() {
        let event = OptimizerEvent::Optimized {
            address: addr(),
            grid_state: GridState::High,
            applied: vec![AppliedSetting::new("CLISPC", 76.0)],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "optimized");
        assert_eq!(json["address"], "n1");
        assert_eq!(json["grid_state"], 2);
        assert_eq!(json["applied"][0]["value"], 76.0);
    }
}
