// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cancellable ON/OFF duty-cycle worker for a switched load.
//!
//! At most one worker task exists per controller. Replacing or stopping a
//! cycle signals the running worker and awaits its termination before any
//! further command is sent, so a stale iteration can never re-assert the
//! old cycle after a restore.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::gateway::{DeviceCommand, Gateway, send_and_check};
use crate::types::{DeviceAddress, SwitchState};

/// Shortest accepted ON+OFF period.
const MIN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Worker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Duty-cycle controller for one switch.
///
/// The last state the controller or its worker successfully applied is
/// published through a watch channel; only one of them writes at a time.
#[derive(Debug)]
pub struct DutyCycle<G> {
    gateway: Arc<G>,
    address: DeviceAddress,
    period: Duration,
    applied: Arc<watch::Sender<Option<SwitchState>>>,
    percent: Option<u8>,
    worker: Option<Worker>,
}

impl<G: Gateway> DutyCycle<G> {
    /// Creates an idle controller.
    ///
    /// Periods shorter than one second are raised to one second.
    #[must_use]
    pub fn new(gateway: Arc<G>, address: DeviceAddress, period: Duration) -> Self {
        if period < MIN_PERIOD {
            tracing::warn!(%address, ?period, "Duty cycle period too short, using minimum");
        }
        let period = period.max(MIN_PERIOD);
        let (applied, _) = watch::channel(None);
        Self {
            gateway,
            address,
            period,
            applied: Arc::new(applied),
            percent: None,
            worker: None,
        }
    }

    /// Duty cycle currently in effect, if any.
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        self.percent
    }

    /// Returns `true` while a worker task is alive.
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.worker.is_some()
    }

    /// Last state successfully applied.
    #[must_use]
    pub fn last_applied(&self) -> Option<SwitchState> {
        *self.applied.borrow()
    }

    /// Forgets the last applied state.
    ///
    /// Only meaningful while no worker runs.
    pub fn clear_applied(&self) {
        if self.worker.is_none() {
            self.applied.send_replace(None);
        }
    }

    /// Switches to `percent`, replacing any running cycle.
    ///
    /// 100 or more turns the load on and 0 turns it off, without a worker.
    pub async fn start(&mut self, percent: u8) {
        self.cancel().await;
        self.percent = Some(percent);

        match percent {
            100.. => {
                self.apply(SwitchState::On).await;
            }
            0 => {
                self.apply(SwitchState::Off).await;
            }
            _ => {
                let on = self.period.mul_f64(f64::from(percent) / 100.0);
                let off = self.period.saturating_sub(on);
                tracing::info!(
                    address = %self.address,
                    percent,
                    on_secs = on.as_secs_f64(),
                    off_secs = off.as_secs_f64(),
                    "Starting duty cycle"
                );

                let (stop, stop_rx) = oneshot::channel();
                let handle = tokio::spawn(run(
                    Arc::clone(&self.gateway),
                    self.address.clone(),
                    Arc::clone(&self.applied),
                    [(SwitchState::Off, off), (SwitchState::On, on)],
                    stop_rx,
                ));
                self.worker = Some(Worker { stop, handle });
            }
        }
    }

    /// Ends the cycle. With `restore`, drives the load to that state once
    /// the worker has terminated.
    pub async fn stop(&mut self, restore: Option<SwitchState>) {
        self.cancel().await;
        self.percent = None;
        if let Some(state) = restore {
            self.apply(state).await;
        }
    }

    /// Signals the worker and waits for it to exit.
    async fn cancel(&mut self) {
        let Some(Worker { stop, handle }) = self.worker.take() else {
            return;
        };
        // The worker may already have exited; the join below covers both.
        let _ = stop.send(());
        if let Err(e) = handle.await {
            tracing::warn!(address = %self.address, error = %e, "Duty cycle worker did not exit cleanly");
        }
        tracing::debug!(address = %self.address, "Duty cycle worker stopped");
    }

    async fn apply(&self, state: SwitchState) -> bool {
        apply(&*self.gateway, &self.address, &self.applied, state).await
    }
}

impl<G> Drop for DutyCycle<G> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.handle.abort();
        }
    }
}

async fn apply<G: Gateway>(
    gateway: &G,
    address: &DeviceAddress,
    applied: &watch::Sender<Option<SwitchState>>,
    state: SwitchState,
) -> bool {
    let command = DeviceCommand::new(address.clone(), state.command_id());
    let ok = send_and_check(gateway, vec![command])
        .await
        .first()
        .copied()
        .unwrap_or(false);

    if ok {
        applied.send_replace(Some(state));
    } else {
        tracing::warn!(%address, %state, "Switch command not applied");
    }
    ok
}

async fn run<G: Gateway>(
    gateway: Arc<G>,
    address: DeviceAddress,
    applied: Arc<watch::Sender<Option<SwitchState>>>,
    phases: [(SwitchState, Duration); 2],
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        for (state, span) in phases {
            if span.is_zero() {
                continue;
            }
            if stop.try_recv().is_ok() {
                return;
            }

            apply(&*gateway, &address, &applied, state).await;

            tokio::select! {
                biased;
                _ = &mut stop => return,
                () = tokio::time::sleep(span) => {}
            }
        }
    }
}
