// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Load shedding for on/off switches through duty cycling.

use std::sync::Arc;
use std::time::Duration;

use super::{Calibration, Context, Divergence, DutyCycle, Strategy};
use crate::event::OptimizerEvent;
use crate::gateway::{Action, Gateway, control};
use crate::settings::{OffsetTable, SettingsStore, default_ladder};
use crate::types::{DeviceAddress, GridState, SwitchState};

/// Duty-cycle strategy for switched loads.
///
/// The calibration table holds target duty-cycle percentages rather than
/// offsets. A running cycle is stopped, and the first observed state
/// restored, when the grid returns to normal.
#[derive(Debug)]
pub struct Switch<G> {
    duty: DutyCycle<G>,
    current_state: Option<SwitchState>,
    initial_state: Option<SwitchState>,
}

impl<G: Gateway> Switch<G> {
    /// Creates the strategy with the given full ON+OFF period.
    #[must_use]
    pub fn new(gateway: Arc<G>, address: DeviceAddress, period: Duration) -> Self {
        Self {
            duty: DutyCycle::new(gateway, address, period),
            current_state: None,
            initial_state: None,
        }
    }

    /// Duty-cycle controller.
    #[must_use]
    pub fn duty_cycle(&self) -> &DutyCycle<G> {
        &self.duty
    }

    /// Latest reported state.
    #[must_use]
    pub fn current_state(&self) -> Option<SwitchState> {
        self.current_state
    }

    /// First reported state.
    #[must_use]
    pub fn initial_state(&self) -> Option<SwitchState> {
        self.initial_state
    }
}

impl<G: Gateway> Strategy for Switch<G> {
    fn min_offset(&self, settings: &SettingsStore) -> f64 {
        settings.min_duty_cycle()
    }

    fn max_offset(&self, settings: &SettingsStore) -> f64 {
        settings.max_duty_cycle()
    }

    fn calibrate(&self, settings: &SettingsStore) -> Calibration {
        let comfort = settings.comfort_level();
        let ladder = settings
            .offset_table(comfort, OffsetTable::DutyCycle)
            .unwrap_or_else(|| {
                tracing::warn!(%comfort, "Duty cycle table incomplete, using built-in ladder");
                default_ladder(comfort, OffsetTable::DutyCycle)
            });
        Calibration::from_ladder(ladder, self.min_offset(settings), self.max_offset(settings))
    }

    fn update_settings(&mut self, _settings: &SettingsStore) {}

    fn reset_opt_out(&mut self) {
        self.duty.clear_applied();
    }

    fn check_user_override(&self, _grid_state: GridState) -> Option<Divergence> {
        if !self.duty.is_looping() {
            return None;
        }
        let applied = self.duty.last_applied()?;
        let observed = self.current_state?;
        (applied != observed).then(|| Divergence {
            property: control::STATUS,
            requested: applied.as_level(),
            observed: observed.as_level(),
        })
    }

    async fn optimize_for(&mut self, ctx: &Context<'_>, grid_state: GridState) {
        if grid_state == GridState::Normal {
            if self.duty.percent().is_some() {
                self.revert_to_initial_settings(ctx).await;
            } else {
                ctx.no_adjustment(grid_state, "no duty cycle running");
            }
            return;
        }

        // An OFF report during a running cycle is the cycle's own OFF phase.
        if !self.duty.is_looping() && self.current_state == Some(SwitchState::Off) {
            ctx.no_adjustment(grid_state, "switch is off");
            return;
        }

        // Safe: clamped to 0..=100 before the cast
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let target = ctx.calibration.offset(grid_state).clamp(0.0, 100.0).round() as u8;

        if self.duty.percent() == Some(target) {
            ctx.no_adjustment(grid_state, "duty cycle unchanged");
            return;
        }

        self.duty.start(target).await;
        ctx.events.publish(OptimizerEvent::DutyCycleStarted {
            address: ctx.address.clone(),
            percent: target,
        });
    }

    fn update_internal_state(&mut self, property: &str, action: &Action) {
        if property != control::STATUS {
            tracing::trace!(property, "Ignoring switch property");
            return;
        }
        match action.numeric() {
            Ok(level) => {
                let state = SwitchState::from_level(level);
                self.current_state = Some(state);
                self.initial_state.get_or_insert(state);
            }
            Err(e) => tracing::warn!(property, error = %e, "Unreadable switch status"),
        }
    }

    async fn revert_to_initial_settings(&mut self, ctx: &Context<'_>) {
        if self.duty.percent().is_none() {
            return;
        }
        self.duty.stop(self.initial_state).await;
        tracing::info!(address = %ctx.address, initial = ?self.initial_state, "Duty cycle stopped");
        ctx.events.publish(OptimizerEvent::DutyCycleStopped {
            address: ctx.address.clone(),
            restored: self.initial_state.is_some(),
        });
    }

    async fn on_opt_out(&mut self, ctx: &Context<'_>) {
        if self.duty.percent().is_none() {
            return;
        }
        self.duty.stop(None).await;
        ctx.events.publish(OptimizerEvent::DutyCycleStopped {
            address: ctx.address.clone(),
            restored: false,
        });
    }
}
