// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Setpoint relaxation for thermostats.

use std::sync::Arc;

use super::{Context, Divergence, Encoding, Strategy};
use crate::event::{AppliedSetting, OptimizerEvent};
use crate::gateway::{Action, DeviceCommand, Gateway, control, send_and_check};
use crate::settings::SettingsStore;
use crate::types::{DeviceAddress, GridState};

/// One setpoint axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Cool,
    Heat,
}

impl Axis {
    const fn control(self) -> &'static str {
        match self {
            Self::Cool => control::COOL_SETPOINT,
            Self::Heat => control::HEAT_SETPOINT,
        }
    }
}

#[derive(Debug, Default)]
struct Setpoint {
    baseline: f64,
    current: Option<f64>,
    last_applied: Option<f64>,
    encoding: Encoding,
}

/// Thermostat strategy.
///
/// Raises the cooling setpoint and lowers the heating setpoint by the grid
/// state's offset. Both setpoints go out in one batched request.
///
/// # Targets
///
/// - cool = cooling baseline + offset
/// - heat = heating baseline - offset
///
/// A target equal to the last applied value is not resent. While severity
/// rises or holds, a target less aggressive than what the device already
/// reports is skipped.
#[derive(Debug)]
pub struct Thermostat<G> {
    gateway: Arc<G>,
    address: DeviceAddress,
    cool: Setpoint,
    heat: Setpoint,
    current_temp: Option<f64>,
    current_mode: Option<String>,
}

impl<G: Gateway> Thermostat<G> {
    /// Creates the strategy with baselines read from `settings`.
    #[must_use]
    pub fn new(gateway: Arc<G>, address: DeviceAddress, settings: &SettingsStore) -> Self {
        let mut thermostat = Self {
            gateway,
            address,
            cool: Setpoint::default(),
            heat: Setpoint::default(),
            current_temp: None,
            current_mode: None,
        };
        thermostat.update_settings(settings);
        thermostat
    }

    /// Latest reported cooling setpoint.
    #[must_use]
    pub fn current_cool(&self) -> Option<f64> {
        self.cool.current
    }

    /// Latest reported heating setpoint.
    #[must_use]
    pub fn current_heat(&self) -> Option<f64> {
        self.heat.current
    }

    /// Latest reported temperature.
    #[must_use]
    pub fn current_temp(&self) -> Option<f64> {
        self.current_temp
    }

    /// Latest reported mode.
    #[must_use]
    pub fn current_mode(&self) -> Option<&str> {
        self.current_mode.as_deref()
    }

    /// Last cooling setpoint the gateway accepted.
    #[must_use]
    pub fn last_applied_cool(&self) -> Option<f64> {
        self.cool.last_applied
    }

    /// Last heating setpoint the gateway accepted.
    #[must_use]
    pub fn last_applied_heat(&self) -> Option<f64> {
        self.heat.last_applied
    }

    fn setpoint_mut(&mut self, axis: Axis) -> &mut Setpoint {
        match axis {
            Axis::Cool => &mut self.cool,
            Axis::Heat => &mut self.heat,
        }
    }

    /// Returns the target for `axis` unless it should be skipped.
    fn target(&self, ctx: &Context<'_>, grid_state: GridState, axis: Axis) -> Option<f64> {
        let offset = ctx.calibration.offset(grid_state);
        let (setpoint, target) = match axis {
            Axis::Cool => (&self.cool, self.cool.baseline + offset),
            Axis::Heat => (&self.heat, self.heat.baseline - offset),
        };

        if setpoint.last_applied == Some(target) {
            tracing::debug!(address = %self.address, ?axis, target, "Setpoint already applied");
            return None;
        }

        if grid_state >= ctx.last_grid_state
            && let Some(current) = setpoint.current
        {
            let already_beyond = match axis {
                Axis::Cool => current > target,
                Axis::Heat => current < target,
            };
            if already_beyond {
                ctx.no_adjustment(
                    grid_state,
                    format!("{} {current} already beyond target {target}", axis.control()),
                );
                return None;
            }
        }

        Some(target)
    }
}

impl<G: Gateway> Strategy for Thermostat<G> {
    fn min_offset(&self, settings: &SettingsStore) -> f64 {
        settings.min_setpoint_offset()
    }

    fn max_offset(&self, settings: &SettingsStore) -> f64 {
        settings.max_setpoint_offset()
    }

    fn update_settings(&mut self, settings: &SettingsStore) {
        self.cool.baseline = settings.cooling_baseline();
        self.heat.baseline = settings.heating_baseline();
    }

    fn reset_opt_out(&mut self) {
        self.cool.last_applied = None;
        self.heat.last_applied = None;
    }

    fn check_user_override(&self, grid_state: GridState) -> Option<Divergence> {
        if !grid_state.is_active() {
            return None;
        }
        [(Axis::Cool, &self.cool), (Axis::Heat, &self.heat)]
            .into_iter()
            .find_map(|(axis, sp)| match (sp.last_applied, sp.current) {
                (Some(requested), Some(observed)) if requested != observed => Some(Divergence {
                    property: axis.control(),
                    requested,
                    observed,
                }),
                _ => None,
            })
    }

    async fn optimize_for(&mut self, ctx: &Context<'_>, grid_state: GridState) {
        let targets: Vec<(Axis, f64)> = [Axis::Cool, Axis::Heat]
            .into_iter()
            .filter_map(|axis| self.target(ctx, grid_state, axis).map(|t| (axis, t)))
            .collect();

        if targets.is_empty() {
            ctx.no_adjustment(grid_state, "setpoints need no change");
            return;
        }

        let commands = targets
            .iter()
            .map(|&(axis, target)| {
                let encoding = match axis {
                    Axis::Cool => &self.cool.encoding,
                    Axis::Heat => &self.heat.encoding,
                };
                DeviceCommand::new(self.address.clone(), axis.control()).with_param(encoding.param(target))
            })
            .collect();

        let results = send_and_check(&*self.gateway, commands).await;

        let mut applied = Vec::new();
        for (&(axis, target), ok) in targets.iter().zip(results) {
            if ok {
                self.setpoint_mut(axis).last_applied = Some(target);
                applied.push(AppliedSetting::new(axis.control(), target));
            } else {
                tracing::warn!(address = %self.address, ?axis, target, "Setpoint not applied");
            }
        }

        if applied.is_empty() {
            return;
        }
        tracing::info!(address = %self.address, %grid_state, ?applied, "Setpoints optimized");
        ctx.events.publish(OptimizerEvent::Optimized {
            address: self.address.clone(),
            grid_state,
            applied,
        });
    }

    fn update_internal_state(&mut self, property: &str, action: &Action) {
        let axis = match property {
            control::COOL_SETPOINT => Axis::Cool,
            control::HEAT_SETPOINT => Axis::Heat,
            control::STATUS => {
                match action.numeric() {
                    Ok(temp) => self.current_temp = Some(temp),
                    Err(e) => tracing::warn!(address = %self.address, error = %e, "Unreadable temperature"),
                }
                return;
            }
            control::THERMOSTAT_MODE => {
                self.current_mode = Some(action.value.clone());
                return;
            }
            _ => {
                tracing::trace!(address = %self.address, property, "Ignoring thermostat property");
                return;
            }
        };

        match action.numeric() {
            Ok(value) => {
                let setpoint = self.setpoint_mut(axis);
                setpoint.current = Some(value);
                setpoint.encoding = Encoding::of(action);
            }
            Err(e) => tracing::warn!(address = %self.address, property, error = %e, "Unreadable setpoint"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::capabilities::Capabilities;
    use crate::clock::ManualClock;
    use crate::event::EventBus;
    use crate::gateway::{Device, GatewayMessage};
    use crate::optimizer::{OptimizerConfig, ThermostatOptimizer};
    use crate::settings::keys;
    use crate::test_support::RecordingGateway;

    struct Fixture {
        gateway: Arc<RecordingGateway>,
        settings: Arc<SettingsStore>,
        clock: Arc<ManualClock>,
        events: EventBus,
        opt: ThermostatOptimizer<RecordingGateway>,
    }

    /// Baselines 72/68 with offsets {0, 1, 2, 4}.
    fn fixture() -> Fixture {
        let gateway = Arc::new(RecordingGateway::new());
        let clock = Arc::new(ManualClock::new());
        let events = EventBus::new();
        let settings = Arc::new(SettingsStore::in_memory());
        settings.set(keys::COOLING_BASELINE, 72);
        settings.set(keys::HEATING_BASELINE, 68);

        let config = OptimizerConfig::default()
            .with_override_check_interval(Duration::from_secs(30))
            .with_clock(clock.clone());
        let device = Device::new("t1", "hall", Capabilities::thermostat());
        let strategy = Thermostat::new(Arc::clone(&gateway), device.address.clone(), &settings);
        let opt = ThermostatOptimizer::new(device, Arc::clone(&settings), config, events.clone(), strategy);

        Fixture {
            gateway,
            settings,
            clock,
            events,
            opt,
        }
    }

    fn setpoint(control: &str, value: &str) -> GatewayMessage {
        GatewayMessage::telemetry("t1", control, Action::new(value).with_uom("17").with_prec(1))
    }

    #[tokio::test]
    async fn emergency_targets_and_dedup() {
        let mut f = fixture();

        f.opt.optimize(GridState::Emergency).await;

        let sent = f.gateway.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].command.command_id, "CLISPC");
        assert_eq!(sent[0].command.value(), Some(76.0));
        assert_eq!(sent[1].command.command_id, "CLISPH");
        assert_eq!(sent[1].command.value(), Some(64.0));
        assert_eq!(f.opt.strategy().last_applied_cool(), Some(76.0));
        assert_eq!(f.opt.strategy().last_applied_heat(), Some(64.0));

        f.opt.optimize(GridState::Emergency).await;
        assert_eq!(f.gateway.sent().len(), 2);
    }

    #[tokio::test]
    async fn commands_echo_telemetry_encoding() {
        let mut f = fixture();
        f.opt.update_internal_state(&setpoint("CLISPC", "720"));

        f.opt.optimize(GridState::Moderate).await;

        let param = &f.gateway.sent()[0].command.params[0];
        assert_eq!(param.uom.as_deref(), Some("17"));
        assert_eq!(param.prec, Some(1));
        assert_eq!(param.value, 73.0);
    }

    #[tokio::test]
    async fn partial_failure_keeps_successful_axis() {
        let mut f = fixture();
        f.gateway.fail_command("CLISPH");
        let mut rx = f.events.subscribe();

        f.opt.optimize(GridState::High).await;

        assert_eq!(f.opt.strategy().last_applied_cool(), Some(74.0));
        assert_eq!(f.opt.strategy().last_applied_heat(), None);
        let OptimizerEvent::Optimized { applied, .. } = rx.try_recv().unwrap() else {
            panic!("expected optimized event");
        };
        assert_eq!(applied, vec![AppliedSetting::new("CLISPC", 74.0)]);
    }

    #[tokio::test]
    async fn guard_skips_already_relaxed_axis_when_rising() {
        let mut f = fixture();
        f.opt.update_internal_state(&setpoint("CLISPC", "800"));
        f.opt.update_internal_state(&setpoint("CLISPH", "660"));

        f.opt.optimize(GridState::High).await;

        // Cooling at 80 is already above 74; heating at 66 equals its target.
        let ids = f.gateway.command_ids();
        assert_eq!(ids, vec!["CLISPH"]);
    }

    #[tokio::test]
    async fn falling_severity_relaxes_unconditionally() {
        let mut f = fixture();

        f.opt.optimize(GridState::Emergency).await;
        f.opt.update_internal_state(&setpoint("CLISPC", "760"));
        f.opt.update_internal_state(&setpoint("CLISPH", "640"));

        f.opt.optimize(GridState::Moderate).await;

        let sent = f.gateway.sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[2].command.value(), Some(73.0));
        assert_eq!(sent[3].command.value(), Some(67.0));
    }

    #[tokio::test]
    async fn override_detected_after_cooldown() {
        let mut f = fixture();

        f.opt.optimize(GridState::High).await;
        f.opt.update_internal_state(&setpoint("CLISPC", "740"));
        f.opt.update_internal_state(&setpoint("CLISPH", "650"));

        f.clock.advance(Duration::from_secs(30));
        f.opt.optimize(GridState::Emergency).await;

        assert!(f.opt.is_opted_out());
        assert_eq!(f.gateway.sent().len(), 2);
    }

    #[test]
    fn override_ignored_in_normal() {
        let mut f = fixture();
        f.opt.update_internal_state(&setpoint("CLISPC", "740"));
        assert!(
            f.opt
                .strategy()
                .check_user_override(GridState::Normal)
                .is_none()
        );
    }

    #[test]
    fn telemetry_updates_state() {
        let mut f = fixture();
        f.opt.update_internal_state(&setpoint("ST", "715"));
        f.opt.update_internal_state(&GatewayMessage::telemetry("t1", "CLIMD", Action::new("2")));
        f.opt.update_internal_state(&setpoint("CLISPC", "bogus"));

        assert_eq!(f.opt.strategy().current_temp(), Some(71.5));
        assert_eq!(f.opt.strategy().current_mode(), Some("2"));
        assert_eq!(f.opt.strategy().current_cool(), None);
    }

    #[tokio::test]
    async fn settings_change_moves_baselines() {
        let mut f = fixture();
        f.settings.set(keys::COOLING_BASELINE, 75);
        f.settings.set(keys::MAX_SETPOINT_OFFSET, 6);
        f.opt.update_settings();
        assert_eq!(f.opt.calibration().offsets(), [0.0, 1.0, 3.0, 6.0]);

        f.opt.optimize(GridState::Emergency).await;
        assert_eq!(f.gateway.sent()[0].command.value(), Some(81.0));
    }
}
