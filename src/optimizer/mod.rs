// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device optimization state machine.
//!
//! [`Optimizer`] owns everything every device class shares: the calibration
//! table, the last handled grid state, opt-out timing and the rate-limited
//! user-override check. The device-specific physics live in a [`Strategy`]:
//!
//! - [`Thermostat`] relaxes cooling and heating setpoints
//! - [`Dimmer`] lowers the light level
//! - [`Switch`] duty-cycles an on/off load
//!
//! # Transition rules
//!
//! [`Optimizer::optimize`] is the only externally driven transition:
//!
//! 1. A repeated grid state is ignored.
//! 2. While opted out, nothing happens.
//! 3. If the override cooldown has elapsed and the device diverges from
//!    what automation applied, the device is opted out.
//! 4. Otherwise the strategy computes and applies its targets.
//! 5. The grid state is recorded, whether or not a command was sent.

mod calibration;
mod config;
mod dimmer;
mod duty_cycle;
mod switch;
mod thermostat;

pub use calibration::Calibration;
pub use config::{OptOutPolicy, OptimizerConfig};
pub use dimmer::Dimmer;
pub use duty_cycle::DutyCycle;
pub use switch::Switch;
pub use thermostat::Thermostat;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::clock::to_time_delta;
use crate::event::{EventBus, OptimizerEvent};
use crate::gateway::{Action, CommandParam, Device, GatewayMessage};
use crate::settings::SettingsStore;
use crate::types::{DeviceAddress, GridState};

/// Optimizer driving a thermostat.
pub type ThermostatOptimizer<G> = Optimizer<Thermostat<G>>;
/// Optimizer driving a dimmable light.
pub type DimmerOptimizer<G> = Optimizer<Dimmer<G>>;
/// Optimizer driving a switched load.
pub type SwitchOptimizer<G> = Optimizer<Switch<G>>;

/// Shared state a strategy may read while acting.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    /// Device being optimized.
    pub address: &'a DeviceAddress,
    /// Current offsets.
    pub calibration: &'a Calibration,
    /// Grid state handled by the previous successful `optimize`.
    pub last_grid_state: GridState,
    /// Event sink.
    pub events: &'a EventBus,
    /// Settings, for baselines.
    pub settings: &'a SettingsStore,
}

impl Context<'_> {
    /// Publishes a "nothing to do" record.
    pub fn no_adjustment(&self, grid_state: GridState, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::debug!(address = %self.address, %grid_state, reason = %reason, "No adjustment needed");
        self.events.publish(OptimizerEvent::NoAdjustmentNeeded {
            address: self.address.clone(),
            grid_state,
            reason,
        });
    }
}

/// A value the user changed away from what automation applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Divergence {
    /// Diverging property.
    pub property: &'static str,
    /// Value automation applied.
    pub requested: f64,
    /// Value the device reports.
    pub observed: f64,
}

/// Unit and precision captured from the latest telemetry sample.
///
/// Commands echo the encoding the device reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoding {
    /// Unit of measure.
    pub uom: Option<String>,
    /// Decimal places.
    pub prec: Option<u8>,
}

impl Encoding {
    /// Captures the encoding of `action`.
    #[must_use]
    pub fn of(action: &Action) -> Self {
        Self {
            uom: action.uom.clone(),
            prec: action.prec,
        }
    }

    /// Builds a primary-value command parameter in this encoding.
    #[must_use]
    pub fn param(&self, value: f64) -> CommandParam {
        CommandParam::value(value, self.uom.clone(), self.prec)
    }
}

/// Device-specific behavior plugged into an [`Optimizer`].
///
/// Required hooks cover calibration bounds, override detection, applying a
/// grid state and absorbing telemetry. The async hooks with default bodies
/// are optional cleanup points.
pub trait Strategy: Send + Sync + 'static {
    /// Lower calibration bound.
    fn min_offset(&self, settings: &SettingsStore) -> f64;

    /// Upper calibration bound.
    fn max_offset(&self, settings: &SettingsStore) -> f64;

    /// Builds the offset table. Linear between the bounds unless overridden.
    fn calibrate(&self, settings: &SettingsStore) -> Calibration {
        Calibration::linear(
            settings.comfort_level(),
            self.min_offset(settings),
            self.max_offset(settings),
        )
    }

    /// Re-reads baselines after a settings change.
    fn update_settings(&mut self, settings: &SettingsStore);

    /// Forgets applied values once an opt-out ends.
    fn reset_opt_out(&mut self);

    /// Compares applied values with observed ones.
    fn check_user_override(&self, grid_state: GridState) -> Option<Divergence>;

    /// Computes and applies targets for `grid_state`.
    fn optimize_for(
        &mut self,
        ctx: &Context<'_>,
        grid_state: GridState,
    ) -> impl Future<Output = ()> + Send;

    /// Absorbs one telemetry value.
    fn update_internal_state(&mut self, property: &str, action: &Action);

    /// Puts the device back the way automation found it.
    fn revert_to_initial_settings(&mut self, _ctx: &Context<'_>) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Extra work when the device opts out.
    fn on_opt_out(&mut self, _ctx: &Context<'_>) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Template state machine shared by every device class.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use demand_optimizer::event::EventBus;
/// use demand_optimizer::gateway::{Device, Gateway};
/// use demand_optimizer::optimizer::{OptimizerConfig, Thermostat, ThermostatOptimizer};
/// use demand_optimizer::settings::SettingsStore;
/// use demand_optimizer::types::GridState;
///
/// async fn run<G: Gateway>(gateway: Arc<G>, device: Device) {
///     let settings = Arc::new(SettingsStore::in_memory());
///     let strategy = Thermostat::new(gateway, device.address.clone(), &settings);
///     let mut optimizer = ThermostatOptimizer::new(
///         device,
///         settings,
///         OptimizerConfig::default(),
///         EventBus::new(),
///         strategy,
///     );
///     optimizer.optimize(GridState::High).await;
/// }
/// ```
#[derive(Debug)]
pub struct Optimizer<S> {
    device: Device,
    settings: Arc<SettingsStore>,
    config: OptimizerConfig,
    events: EventBus,
    calibration: Calibration,
    last_grid_state: GridState,
    opt_out_until: Option<DateTime<Local>>,
    next_override_check: DateTime<Local>,
    strategy: S,
}

impl<S: Strategy> Optimizer<S> {
    /// Binds `strategy` to `device` and calibrates.
    #[must_use]
    pub fn new(
        device: Device,
        settings: Arc<SettingsStore>,
        config: OptimizerConfig,
        events: EventBus,
        strategy: S,
    ) -> Self {
        let calibration = strategy.calibrate(&settings);
        let next_override_check = config.now() + to_time_delta(config.override_check_interval);
        tracing::debug!(
            address = %device.address,
            offsets = ?calibration.offsets(),
            "Optimizer created"
        );

        let mut optimizer = Self {
            device,
            settings,
            config,
            events,
            calibration,
            last_grid_state: GridState::Normal,
            opt_out_until: None,
            next_override_check,
            strategy,
        };
        optimizer.reset_opt_out();
        optimizer
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Device address.
    #[must_use]
    pub fn address(&self) -> &DeviceAddress {
        &self.device.address
    }

    /// Device description.
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Current offsets.
    #[must_use]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Offset applied for `state`.
    #[must_use]
    pub fn offset_for_state(&self, state: GridState) -> f64 {
        self.calibration.offset(state)
    }

    /// Grid state handled by the last `optimize` that reached the strategy.
    #[must_use]
    pub fn last_grid_state(&self) -> GridState {
        self.last_grid_state
    }

    /// End of the current opt-out, if any.
    #[must_use]
    pub fn opt_out_until(&self) -> Option<DateTime<Local>> {
        self.opt_out_until
    }

    /// Returns `true` while an unexpired opt-out is in effect.
    #[must_use]
    pub fn is_opted_out(&self) -> bool {
        self.opt_out_until
            .is_some_and(|until| self.config.now() < until)
    }

    /// Device-specific state.
    #[must_use]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Handles a grid state signal.
    pub async fn optimize(&mut self, grid_state: GridState) {
        if grid_state == self.last_grid_state {
            tracing::debug!(address = %self.device.address, %grid_state, "Grid state unchanged, skipping");
            return;
        }

        if self.check_opt_out_status() {
            tracing::info!(
                address = %self.device.address,
                until = ?self.opt_out_until,
                "Opted out, skipping"
            );
            return;
        }

        if let Some(divergence) = self.check_user_override(grid_state) {
            tracing::info!(
                address = %self.device.address,
                property = divergence.property,
                requested = divergence.requested,
                observed = divergence.observed,
                "User override detected"
            );
            self.events.publish(OptimizerEvent::UserOverride {
                address: self.device.address.clone(),
                property: divergence.property.to_string(),
                requested: divergence.requested,
                observed: divergence.observed,
            });
            self.opt_out().await;
            return;
        }

        let (ctx, strategy) = self.split();
        strategy.optimize_for(&ctx, grid_state).await;
        self.last_grid_state = grid_state;
    }

    /// Returns `true` while opted out. Clears an expired opt-out, exactly
    /// once, and reports `false` for it.
    pub fn check_opt_out_status(&mut self) -> bool {
        let Some(until) = self.opt_out_until else {
            return false;
        };
        if self.config.now() < until {
            return true;
        }

        tracing::info!(address = %self.device.address, "Opt-out expired");
        self.reset_opt_out();
        self.events.publish(OptimizerEvent::OptOutExpired {
            address: self.device.address.clone(),
        });
        false
    }

    /// Suspends automation until the configured expiry.
    pub async fn opt_out(&mut self) {
        let until = self.config.opt_out.expiry(self.config.now());
        self.opt_out_until = Some(until);

        let (ctx, strategy) = self.split();
        strategy.on_opt_out(&ctx).await;

        tracing::info!(address = %self.device.address, %until, "Opted out");
        self.events.publish(OptimizerEvent::OptedOut {
            address: self.device.address.clone(),
            until,
        });
    }

    /// Checks for a user override, at most once per cooldown interval.
    pub fn check_user_override(&mut self, grid_state: GridState) -> Option<Divergence> {
        let now = self.config.now();
        if now < self.next_override_check {
            return None;
        }
        self.next_override_check = now + to_time_delta(self.config.override_check_interval);
        self.strategy.check_user_override(grid_state)
    }

    /// Rebuilds the offset table from the current settings.
    pub fn calibrate(&mut self) {
        self.calibration = self.strategy.calibrate(&self.settings);
        tracing::debug!(
            address = %self.device.address,
            offsets = ?self.calibration.offsets(),
            "Calibrated"
        );
    }

    /// Re-reads settings and recalibrates.
    pub fn update_settings(&mut self) {
        self.strategy.update_settings(&self.settings);
        self.calibrate();
    }

    /// Forwards a telemetry message to the strategy.
    ///
    /// Messages without a control or an action are dropped with a warning.
    pub fn update_internal_state(&mut self, message: &GatewayMessage) {
        let (Some(control), Some(action)) = (message.control.as_deref(), message.action.as_ref()) else {
            tracing::warn!(address = %self.device.address, ?message, "Malformed telemetry, dropping");
            return;
        };
        self.strategy.update_internal_state(control, action);
    }

    /// Restores the device before the optimizer is discarded.
    pub async fn release(&mut self) {
        let (ctx, strategy) = self.split();
        strategy.revert_to_initial_settings(&ctx).await;
    }

    fn reset_opt_out(&mut self) {
        self.opt_out_until = None;
        self.strategy.reset_opt_out();
    }

    fn split(&mut self) -> (Context<'_>, &mut S) {
        let ctx = Context {
            address: &self.device.address,
            calibration: &self.calibration,
            last_grid_state: self.last_grid_state,
            events: &self.events,
            settings: &self.settings,
        };
        (ctx, &mut self.strategy)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::capabilities::Capabilities;
    use crate::clock::{Clock, ManualClock};

    /// Strategy that records calls and reports a scripted divergence.
    #[derive(Debug, Default)]
    struct Recorder {
        optimized: Vec<GridState>,
        divergence: Option<Divergence>,
        resets: usize,
        opt_outs: usize,
        reverts: usize,
        telemetry: Vec<(String, String)>,
    }

    impl Strategy for Recorder {
        fn min_offset(&self, _settings: &SettingsStore) -> f64 {
            1.0
        }

        fn max_offset(&self, _settings: &SettingsStore) -> f64 {
            4.0
        }

        fn update_settings(&mut self, _settings: &SettingsStore) {}

        fn reset_opt_out(&mut self) {
            self.resets += 1;
        }

        fn check_user_override(&self, _grid_state: GridState) -> Option<Divergence> {
            self.divergence.clone()
        }

        async fn optimize_for(&mut self, _ctx: &Context<'_>, grid_state: GridState) {
            self.optimized.push(grid_state);
        }

        fn update_internal_state(&mut self, property: &str, action: &Action) {
            self.telemetry.push((property.to_string(), action.value.clone()));
        }

        async fn revert_to_initial_settings(&mut self, _ctx: &Context<'_>) {
            self.reverts += 1;
        }

        async fn on_opt_out(&mut self, _ctx: &Context<'_>) {
            self.opt_outs += 1;
        }
    }

    fn divergence() -> Divergence {
        Divergence {
            property: "CLISPC",
            requested: 76.0,
            observed: 72.0,
        }
    }

    fn optimizer(clock: &Arc<ManualClock>) -> (Optimizer<Recorder>, EventBus) {
        let events = EventBus::new();
        let config = OptimizerConfig::default()
            .with_opt_out(OptOutPolicy::Fixed(Duration::from_secs(600)))
            .with_override_check_interval(Duration::from_secs(30))
            .with_clock(clock.clone());
        let device = Device::new("n1", "probe", Capabilities::default());
        let optimizer = Optimizer::new(
            device,
            Arc::new(SettingsStore::in_memory()),
            config,
            events.clone(),
            Recorder::default(),
        );
        (optimizer, events)
    }

    #[test]
    fn new_calibrates_and_resets() {
        let clock = Arc::new(ManualClock::new());
        let (opt, _) = optimizer(&clock);

        assert_eq!(opt.calibration().offsets(), [0.0, 1.0, 2.0, 4.0]);
        assert_eq!(opt.offset_for_state(GridState::Emergency), 4.0);
        assert_eq!(opt.last_grid_state(), GridState::Normal);
        assert_eq!(opt.strategy().resets, 1);
        assert!(!opt.is_opted_out());
    }

    #[tokio::test]
    async fn repeated_state_is_ignored() {
        let clock = Arc::new(ManualClock::new());
        let (mut opt, _) = optimizer(&clock);

        opt.optimize(GridState::Normal).await;
        opt.optimize(GridState::High).await;
        opt.optimize(GridState::High).await;

        assert_eq!(opt.strategy().optimized, vec![GridState::High]);
        assert_eq!(opt.last_grid_state(), GridState::High);
    }

    #[tokio::test]
    async fn last_grid_state_recorded_after_strategy() {
        let clock = Arc::new(ManualClock::new());
        let (mut opt, _) = optimizer(&clock);

        opt.optimize(GridState::Moderate).await;
        opt.optimize(GridState::Normal).await;

        assert_eq!(
            opt.strategy().optimized,
            vec![GridState::Moderate, GridState::Normal]
        );
        assert_eq!(opt.last_grid_state(), GridState::Normal);
    }

    #[tokio::test]
    async fn override_check_is_rate_limited() {
        let clock = Arc::new(ManualClock::new());
        let (mut opt, _) = optimizer(&clock);
        opt.strategy.divergence = Some(divergence());

        // Cooldown not yet elapsed since construction.
        opt.optimize(GridState::Moderate).await;
        assert!(!opt.is_opted_out());
        assert_eq!(opt.strategy().optimized, vec![GridState::Moderate]);

        clock.advance(Duration::from_secs(30));
        opt.optimize(GridState::High).await;
        assert!(opt.is_opted_out());
        assert_eq!(opt.strategy().opt_outs, 1);
        assert_eq!(opt.strategy().optimized, vec![GridState::Moderate]);
        assert_eq!(opt.last_grid_state(), GridState::Moderate);
    }

    #[tokio::test]
    async fn override_publishes_events() {
        let clock = Arc::new(ManualClock::new());
        let (mut opt, events) = optimizer(&clock);
        let mut rx = events.subscribe();
        opt.strategy.divergence = Some(divergence());

        clock.advance(Duration::from_secs(31));
        opt.optimize(GridState::Emergency).await;

        assert!(matches!(
            rx.try_recv().unwrap(),
            OptimizerEvent::UserOverride { requested, observed, .. } if requested == 76.0 && observed == 72.0
        ));
        let OptimizerEvent::OptedOut { until, .. } = rx.try_recv().unwrap() else {
            panic!("expected opted out");
        };
        assert_eq!((until - clock.now()).num_seconds(), 600);
    }

    #[tokio::test]
    async fn opt_out_blocks_until_expiry_then_clears_once() {
        let clock = Arc::new(ManualClock::new());
        let (mut opt, events) = optimizer(&clock);
        let mut rx = events.subscribe();

        opt.opt_out().await;
        let until = opt.opt_out_until().unwrap();
        assert!(until > clock.now());
        assert!(opt.check_opt_out_status());

        opt.optimize(GridState::High).await;
        assert!(opt.strategy().optimized.is_empty());

        clock.advance(Duration::from_secs(600));
        assert!(!opt.check_opt_out_status());
        assert!(opt.opt_out_until().is_none());
        assert!(!opt.check_opt_out_status());
        assert_eq!(opt.strategy().resets, 2);

        let expired: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, OptimizerEvent::OptOutExpired { .. }))
            .collect();
        assert_eq!(expired.len(), 1);

        opt.optimize(GridState::High).await;
        assert_eq!(opt.strategy().optimized, vec![GridState::High]);
    }

    #[test]
    fn malformed_telemetry_is_dropped() {
        let clock = Arc::new(ManualClock::new());
        let (mut opt, _) = optimizer(&clock);

        opt.update_internal_state(&GatewayMessage {
            node: Some("n1".into()),
            control: Some("ST".into()),
            action: None,
            event_info: None,
        });
        opt.update_internal_state(&GatewayMessage::telemetry("n1", "ST", Action::new("72")));

        assert_eq!(
            opt.strategy().telemetry,
            vec![("ST".to_string(), "72".to_string())]
        );
    }

    #[tokio::test]
    async fn release_reverts() {
        let clock = Arc::new(ManualClock::new());
        let (mut opt, _) = optimizer(&clock);
        opt.release().await;
        assert_eq!(opt.strategy().reverts, 1);
    }

    #[test]
    fn update_settings_recalibrates() {
        let clock = Arc::new(ManualClock::new());
        let (mut opt, _) = optimizer(&clock);

        opt.settings.set_comfort_level(crate::types::ComfortLevel::MaxSavings);
        opt.update_settings();
        assert_eq!(opt.calibration().offsets(), [0.0, 3.0, 4.0, 6.0]);
    }
}
