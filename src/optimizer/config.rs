// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Timing configuration shared by every optimizer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Local};

use crate::clock::{Clock, SystemClock, to_time_delta};

/// How long automation stays suspended after a user override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptOutPolicy {
    /// Until the next local midnight.
    UntilMidnight,
    /// For a fixed duration.
    Fixed(Duration),
}

impl OptOutPolicy {
    /// Returns when an opt-out starting at `now` ends.
    #[must_use]
    pub fn expiry(self, now: DateTime<Local>) -> DateTime<Local> {
        match self {
            Self::UntilMidnight => next_midnight(now),
            Self::Fixed(duration) => now + to_time_delta(duration),
        }
    }
}

/// First instant of the day after `now`.
///
/// Falls back to 24 hours later when midnight does not exist locally.
fn next_midnight(now: DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .unwrap_or_else(|| now + chrono::TimeDelta::hours(24))
}

/// Opt-out, override-check and duty-cycle timing, plus the clock used for
/// wall-clock decisions.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use demand_optimizer::optimizer::{OptOutPolicy, OptimizerConfig};
///
/// let config = OptimizerConfig::default()
///     .with_override_check_interval(Duration::from_secs(60))
///     .with_duty_cycle_period(Duration::from_secs(600));
///
/// assert_eq!(config.opt_out, OptOutPolicy::UntilMidnight);
/// assert_eq!(config.duty_cycle_period, Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Opt-out duration after an override.
    pub opt_out: OptOutPolicy,
    /// Minimum time between two user-override checks.
    pub override_check_interval: Duration,
    /// Full ON+OFF period of the switch duty cycle.
    pub duty_cycle_period: Duration,
    /// Wall-clock source.
    pub clock: Arc<dyn Clock>,
}

impl OptimizerConfig {
    /// Short timings for bench testing: 10 minute opt-out, 30 second
    /// override checks, 5 minute duty-cycle period.
    #[must_use]
    pub fn testing() -> Self {
        let opt_out = Duration::from_secs(10 * 60);
        Self {
            opt_out: OptOutPolicy::Fixed(opt_out),
            override_check_interval: Duration::from_secs(30),
            duty_cycle_period: opt_out / 2,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the opt-out policy.
    #[must_use]
    pub fn with_opt_out(mut self, policy: OptOutPolicy) -> Self {
        self.opt_out = policy;
        self
    }

    /// Sets the override-check cooldown.
    #[must_use]
    pub fn with_override_check_interval(mut self, interval: Duration) -> Self {
        self.override_check_interval = interval;
        self
    }

    /// Sets the duty-cycle period.
    #[must_use]
    pub fn with_duty_cycle_period(mut self, period: Duration) -> Self {
        self.duty_cycle_period = period;
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current local time according to the configured clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            opt_out: OptOutPolicy::UntilMidnight,
            override_check_interval: Duration::from_secs(5 * 60),
            duty_cycle_period: Duration::from_secs(60 * 60),
            clock: Arc::new(SystemClock),
        }
    }
}
