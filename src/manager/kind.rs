// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device classification and the optimizer registry.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::capabilities::Capabilities;
use crate::event::EventBus;
use crate::gateway::{Device, Gateway, GatewayMessage, control};
use crate::optimizer::{
    Calibration, Dimmer, DimmerOptimizer, OptimizerConfig, Switch, SwitchOptimizer, Thermostat,
    ThermostatOptimizer,
};
use crate::settings::SettingsStore;
use crate::types::{DeviceAddress, GridState};

/// Optimizer category a device belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Heating/cooling setpoints.
    Thermostat,
    /// Dimmable light.
    Dimmer,
    /// On/off load.
    Switch,
}

impl DeviceKind {
    /// Every kind, in grid-state fan-out order.
    pub const ALL: [Self; 3] = [Self::Thermostat, Self::Dimmer, Self::Switch];

    /// Picks a kind from declared capabilities.
    ///
    /// Setpoint properties mean thermostat. A level or ramp-rate property,
    /// or an on command alongside one, means dimmer. Plain on/off commands
    /// mean switch. Anything else is not optimized.
    ///
    /// # Examples
    ///
    /// ```
    /// use demand_optimizer::Capabilities;
    /// use demand_optimizer::manager::DeviceKind;
    ///
    /// assert_eq!(DeviceKind::classify(&Capabilities::thermostat()), Some(DeviceKind::Thermostat));
    /// assert_eq!(DeviceKind::classify(&Capabilities::on_off()), Some(DeviceKind::Switch));
    /// assert_eq!(DeviceKind::classify(&Capabilities::default()), None);
    /// ```
    #[must_use]
    pub fn classify(capabilities: &Capabilities) -> Option<Self> {
        let level_codes = [control::ON_LEVEL, control::RAMP_RATE];

        if capabilities.has_property(control::COOL_SETPOINT)
            || capabilities.has_property(control::HEAT_SETPOINT)
        {
            return Some(Self::Thermostat);
        }
        if level_codes.iter().any(|code| capabilities.has_property(code)) {
            return Some(Self::Dimmer);
        }
        if capabilities.accepts(control::ON) || capabilities.accepts(control::FAST_ON) {
            if capabilities.mentions_any(&level_codes) {
                return Some(Self::Dimmer);
            }
            return Some(Self::Switch);
        }
        None
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Thermostat => "thermostat",
            Self::Dimmer => "dimmer",
            Self::Switch => "switch",
        })
    }
}

/// An optimizer of any kind, as held by the device manager.
#[derive(Debug)]
pub enum DeviceOptimizer<G> {
    /// Thermostat.
    Thermostat(ThermostatOptimizer<G>),
    /// Dimmer.
    Dimmer(DimmerOptimizer<G>),
    /// Switch.
    Switch(SwitchOptimizer<G>),
}

macro_rules! dispatch {
    ($self:expr, $opt:ident => $body:expr) => {
        match $self {
            DeviceOptimizer::Thermostat($opt) => $body,
            DeviceOptimizer::Dimmer($opt) => $body,
            DeviceOptimizer::Switch($opt) => $body,
        }
    };
}

impl<G: Gateway> DeviceOptimizer<G> {
    /// Constructs the optimizer registered for `kind`.
    #[must_use]
    pub fn build(
        kind: DeviceKind,
        device: Device,
        gateway: &Arc<G>,
        settings: &Arc<SettingsStore>,
        config: &OptimizerConfig,
        events: &EventBus,
    ) -> Self {
        let gateway = Arc::clone(gateway);
        let address = device.address.clone();
        let settings = Arc::clone(settings);
        let config = config.clone();
        let events = events.clone();

        match kind {
            DeviceKind::Thermostat => {
                let strategy = Thermostat::new(gateway, address, &settings);
                Self::Thermostat(ThermostatOptimizer::new(device, settings, config, events, strategy))
            }
            DeviceKind::Dimmer => {
                let strategy = Dimmer::new(gateway, address, &settings);
                Self::Dimmer(DimmerOptimizer::new(device, settings, config, events, strategy))
            }
            DeviceKind::Switch => {
                let strategy = Switch::new(gateway, address, config.duty_cycle_period);
                Self::Switch(SwitchOptimizer::new(device, settings, config, events, strategy))
            }
        }
    }

    /// Kind of the wrapped optimizer.
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Thermostat(_) => DeviceKind::Thermostat,
            Self::Dimmer(_) => DeviceKind::Dimmer,
            Self::Switch(_) => DeviceKind::Switch,
        }
    }

    /// Device address.
    #[must_use]
    pub fn address(&self) -> &DeviceAddress {
        dispatch!(self, o => o.address())
    }

    /// Current offsets.
    #[must_use]
    pub fn calibration(&self) -> &Calibration {
        dispatch!(self, o => o.calibration())
    }

    /// Last handled grid state.
    #[must_use]
    pub fn last_grid_state(&self) -> GridState {
        dispatch!(self, o => o.last_grid_state())
    }

    /// Returns `true` while opted out.
    #[must_use]
    pub fn is_opted_out(&self) -> bool {
        dispatch!(self, o => o.is_opted_out())
    }

    /// Handles a grid state signal.
    pub async fn optimize(&mut self, grid_state: GridState) {
        dispatch!(self, o => o.optimize(grid_state).await);
    }

    /// Forwards telemetry.
    pub fn update_internal_state(&mut self, message: &GatewayMessage) {
        dispatch!(self, o => o.update_internal_state(message));
    }

    /// Re-reads settings and recalibrates.
    pub fn update_settings(&mut self) {
        dispatch!(self, o => o.update_settings());
    }

    /// Restores the device before eviction.
    pub async fn release(&mut self) {
        dispatch!(self, o => o.release().await);
    }

    /// The thermostat optimizer, if this is one.
    #[must_use]
    pub fn as_thermostat(&self) -> Option<&ThermostatOptimizer<G>> {
        match self {
            Self::Thermostat(o) => Some(o),
            _ => None,
        }
    }

    /// The dimmer optimizer, if this is one.
    #[must_use]
    pub fn as_dimmer(&self) -> Option<&DimmerOptimizer<G>> {
        match self {
            Self::Dimmer(o) => Some(o),
            _ => None,
        }
    }

    /// The switch optimizer, if this is one.
    #[must_use]
    pub fn as_switch(&self) -> Option<&SwitchOptimizer<G>> {
        match self {
            Self::Switch(o) => Some(o),
            _ => None,
        }
    }
}
