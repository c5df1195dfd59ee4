// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Light-level reduction for dimmers.

use std::sync::Arc;

use super::{Context, Divergence, Encoding, Strategy};
use crate::event::{AppliedSetting, OptimizerEvent};
use crate::gateway::{Action, DeviceCommand, Gateway, control, send_and_check};
use crate::settings::SettingsStore;
use crate::types::{DeviceAddress, GridState};

/// Level differences up to this many percent are not overrides.
const OVERRIDE_TOLERANCE: f64 = 1.0;

/// Dimmer strategy: level = light baseline - offset, within 0-100%.
///
/// A light that reports level 0 is off and left alone.
#[derive(Debug)]
pub struct Dimmer<G> {
    gateway: Arc<G>,
    address: DeviceAddress,
    baseline: f64,
    current_level: Option<f64>,
    on_level: Option<f64>,
    encoding: Encoding,
    last_applied: Option<f64>,
}

impl<G: Gateway> Dimmer<G> {
    /// Creates the strategy with the baseline read from `settings`.
    #[must_use]
    pub fn new(gateway: Arc<G>, address: DeviceAddress, settings: &SettingsStore) -> Self {
        Self {
            gateway,
            address,
            baseline: settings.light_level_baseline(),
            current_level: None,
            on_level: None,
            encoding: Encoding::default(),
            last_applied: None,
        }
    }

    /// Latest reported level.
    #[must_use]
    pub fn current_level(&self) -> Option<f64> {
        self.current_level
    }

    /// Latest reported on-level.
    #[must_use]
    pub fn on_level(&self) -> Option<f64> {
        self.on_level
    }

    /// Last level the gateway accepted.
    #[must_use]
    pub fn last_applied(&self) -> Option<f64> {
        self.last_applied
    }
}

impl<G: Gateway> Strategy for Dimmer<G> {
    fn min_offset(&self, settings: &SettingsStore) -> f64 {
        settings.min_light_offset()
    }

    fn max_offset(&self, settings: &SettingsStore) -> f64 {
        settings.max_light_offset()
    }

    fn update_settings(&mut self, settings: &SettingsStore) {
        self.baseline = settings.light_level_baseline();
    }

    fn reset_opt_out(&mut self) {
        self.last_applied = None;
    }

    fn check_user_override(&self, grid_state: GridState) -> Option<Divergence> {
        if !grid_state.is_active() {
            return None;
        }
        let requested = self.last_applied?;
        let observed = self.current_level?;
        ((requested - observed).abs() > OVERRIDE_TOLERANCE).then_some(Divergence {
            property: control::STATUS,
            requested,
            observed,
        })
    }

    async fn optimize_for(&mut self, ctx: &Context<'_>, grid_state: GridState) {
        if self.current_level == Some(0.0) {
            ctx.no_adjustment(grid_state, "light is off");
            return;
        }

        let target = (self.baseline - ctx.calibration.offset(grid_state)).clamp(0.0, 100.0);

        if self.last_applied == Some(target) {
            ctx.no_adjustment(grid_state, "level already applied");
            return;
        }

        if grid_state >= ctx.last_grid_state
            && let Some(current) = self.current_level
            && current < target
        {
            ctx.no_adjustment(
                grid_state,
                format!("level {current} already below target {target}"),
            );
            return;
        }

        let command = DeviceCommand::new(self.address.clone(), control::ON)
            .with_param(self.encoding.param(target));
        let ok = send_and_check(&*self.gateway, vec![command])
            .await
            .first()
            .copied()
            .unwrap_or(false);

        if !ok {
            tracing::warn!(address = %self.address, target, "Light level not applied");
            return;
        }

        self.last_applied = Some(target);
        tracing::info!(address = %self.address, %grid_state, target, "Light level optimized");
        ctx.events.publish(OptimizerEvent::Optimized {
            address: self.address.clone(),
            grid_state,
            applied: vec![AppliedSetting::new(control::ON, target)],
        });
    }

    fn update_internal_state(&mut self, property: &str, action: &Action) {
        let slot = match property {
            control::STATUS => &mut self.current_level,
            control::ON_LEVEL => &mut self.on_level,
            _ => {
                tracing::trace!(address = %self.address, property, "Ignoring dimmer property");
                return;
            }
        };
        match action.numeric() {
            Ok(level) => *slot = Some(level),
            Err(e) => {
                tracing::warn!(address = %self.address, property, error = %e, "Unreadable level");
                return;
            }
        }
        if property == control::STATUS {
            self.encoding = Encoding::of(action);
        }
    }
}
