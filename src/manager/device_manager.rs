// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device manager owning one optimizer per classified device.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::error::{Error, Result};
use crate::event::{EventBus, OptimizerEvent};
use crate::gateway::{Action, Gateway, GatewayMessage, StreamEvent, control, enabled_flag};
use crate::optimizer::OptimizerConfig;
use crate::settings::SettingsStore;
use crate::types::{DeviceAddress, GridState};

use super::kind::{DeviceKind, DeviceOptimizer};
use super::reconnection::ResubscribePolicy;

/// Classifies gateway devices and dispatches the event stream to their
/// optimizers.
///
/// All dispatch runs through `&mut self`, so two optimizers are never
/// driven concurrently. The only work running beside the dispatch loop is
/// the duty-cycle worker of each switch.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use demand_optimizer::gateway::Gateway;
/// use demand_optimizer::manager::DeviceManager;
/// use demand_optimizer::settings::SettingsStore;
///
/// async fn serve<G: Gateway>(gateway: Arc<G>) -> demand_optimizer::Result<()> {
///     let settings = Arc::new(SettingsStore::open("/var/lib/optimizer/settings.json"));
///     let mut manager = DeviceManager::new(gateway, settings);
///
///     let mut events = manager.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             tracing::info!(?event, "optimizer event");
///         }
///     });
///
///     manager.update_profiles().await?;
///     manager.run().await
/// }
/// ```
#[derive(Debug)]
pub struct DeviceManager<G> {
    gateway: Arc<G>,
    settings: Arc<SettingsStore>,
    config: OptimizerConfig,
    events: EventBus,
    optimizers: BTreeMap<DeviceAddress, DeviceOptimizer<G>>,
    ven: Option<DeviceAddress>,
    subscribed: bool,
    optimization_disabled: Arc<AtomicBool>,
    resubscribe: ResubscribePolicy,
}

impl<G: Gateway> DeviceManager<G> {
    /// Creates a manager with production timing.
    #[must_use]
    pub fn new(gateway: Arc<G>, settings: Arc<SettingsStore>) -> Self {
        Self {
            gateway,
            settings,
            config: OptimizerConfig::default(),
            events: EventBus::new(),
            optimizers: BTreeMap::new(),
            ven: None,
            subscribed: false,
            optimization_disabled: Arc::new(AtomicBool::new(false)),
            resubscribe: ResubscribePolicy::default(),
        }
    }

    /// Sets the configuration handed to optimizers created from now on.
    #[must_use]
    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the event-stream backoff.
    #[must_use]
    pub fn with_resubscribe_policy(mut self, policy: ResubscribePolicy) -> Self {
        self.resubscribe = policy;
        self
    }

    /// Replaces the event bus with one of the given capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventBus::with_capacity(capacity);
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Subscribes to optimizer events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OptimizerEvent> {
        self.events.subscribe()
    }

    /// The event bus shared with every optimizer.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Settings consulted by every optimizer.
    #[must_use]
    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// Address of the VEN, once discovered.
    #[must_use]
    pub fn ven(&self) -> Option<&DeviceAddress> {
        self.ven.as_ref()
    }

    /// Returns `true` while the event stream is live.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Optimizer owning `address`.
    #[must_use]
    pub fn optimizer(&self, address: &DeviceAddress) -> Option<&DeviceOptimizer<G>> {
        self.optimizers.get(address)
    }

    /// Addresses of every optimized device of `kind`.
    #[must_use]
    pub fn addresses(&self, kind: DeviceKind) -> Vec<DeviceAddress> {
        self.optimizers
            .iter()
            .filter(|(_, o)| o.kind() == kind)
            .map(|(address, _)| address.clone())
            .collect()
    }

    /// Number of optimized devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.optimizers.len()
    }

    /// Returns `true` if no device is optimized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.optimizers.is_empty()
    }

    // =========================================================================
    // Kill switch
    // =========================================================================

    /// Enables or disables the grid-state fan-out.
    pub fn set_optimization_disabled(&self, disabled: bool) {
        self.optimization_disabled.store(disabled, Ordering::Relaxed);
        tracing::info!(disabled, "Optimization kill switch set");
    }

    /// Returns `true` if the fan-out is disabled.
    #[must_use]
    pub fn is_optimization_disabled(&self) -> bool {
        self.optimization_disabled.load(Ordering::Relaxed)
    }

    /// Shared flag for flipping the kill switch while [`run`](Self::run)
    /// holds the manager.
    #[must_use]
    pub fn disable_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.optimization_disabled)
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Fetches the device list and creates an optimizer for every enabled,
    /// not yet classified device. Returns the number created.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway cannot list devices.
    pub async fn update_profiles(&mut self) -> Result<usize> {
        let devices = self.gateway.discover_devices().await?;
        let mut created = 0;

        for device in devices {
            if !device.enabled || self.optimizers.contains_key(&device.address) {
                continue;
            }
            if device.address.has_suffix(control::VEN_SUFFIX) {
                if self.ven.is_none() {
                    tracing::info!(address = %device.address, "VEN found");
                    self.ven = Some(device.address);
                }
                continue;
            }

            let Some(kind) = DeviceKind::classify(&device.capabilities) else {
                tracing::debug!(address = %device.address, name = %device.name, "Device not optimizable");
                continue;
            };

            let address = device.address.clone();
            tracing::info!(%address, name = %device.name, %kind, "Device classified");
            let optimizer = DeviceOptimizer::build(
                kind,
                device,
                &self.gateway,
                &self.settings,
                &self.config,
                &self.events,
            );
            self.optimizers.insert(address.clone(), optimizer);
            self.events
                .publish(OptimizerEvent::DeviceClassified { address, kind });
            created += 1;
        }

        Ok(created)
    }

    /// Releases and drops the optimizer for `address`.
    ///
    /// Returns `false` if the address was not optimized.
    pub async fn evict(&mut self, address: &DeviceAddress) -> bool {
        let Some(mut optimizer) = self.optimizers.remove(address) else {
            return false;
        };
        optimizer.release().await;
        let kind = optimizer.kind();
        tracing::info!(%address, %kind, "Device evicted");
        self.events.publish(OptimizerEvent::DeviceEvicted {
            address: address.clone(),
            kind,
        });
        true
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Mirrors `grid_state` into settings and drives every optimizer,
    /// thermostats first, then dimmers, then switches.
    pub async fn optimize(&mut self, grid_state: GridState) {
        self.settings.set_current_grid_status(grid_state);
        self.events
            .publish(OptimizerEvent::GridStateChanged { state: grid_state });

        if self.is_optimization_disabled() {
            tracing::info!(%grid_state, "Optimization disabled, skipping fan-out");
            return;
        }

        tracing::info!(%grid_state, devices = self.optimizers.len(), "Optimizing");
        for kind in DeviceKind::ALL {
            for optimizer in self.optimizers.values_mut().filter(|o| o.kind() == kind) {
                optimizer.optimize(grid_state).await;
            }
        }
    }

    /// Routes one event-stream message.
    ///
    /// Node updates add or evict optimizers, busy and progress notices are
    /// logged, VEN messages carry the grid state and settings, and anything
    /// else is telemetry for the owning optimizer.
    pub async fn on_message(&mut self, message: GatewayMessage) {
        let Some(control_code) = message.control.as_deref() else {
            tracing::warn!(?message, "Message without control, dropping");
            return;
        };

        match control_code {
            control::NODE_UPDATED => self.on_node_update(&message).await,
            control::SYSTEM_BUSY => tracing::debug!(action = ?message.action, "System busy notice"),
            control::PROGRESS => tracing::debug!(action = ?message.action, "Progress notice"),
            code if control::is_system(code) => {
                tracing::trace!(code, "Ignoring system message");
            }
            code => {
                let Some(node) = message.node.as_ref() else {
                    tracing::warn!(code, "Telemetry without node, dropping");
                    return;
                };
                if let Some(optimizer) = self.optimizers.get_mut(node) {
                    optimizer.update_internal_state(&message);
                } else if self.is_ven(node) {
                    let Some(action) = message.action.as_ref() else {
                        tracing::warn!(code, "VEN message without action, dropping");
                        return;
                    };
                    self.on_ven_message(code, action).await;
                } else {
                    tracing::trace!(%node, code, "Message for unmanaged node");
                }
            }
        }
    }

    fn is_ven(&self, address: &DeviceAddress) -> bool {
        match &self.ven {
            Some(ven) => ven == address,
            None => address.has_suffix(control::VEN_SUFFIX),
        }
    }

    async fn on_node_update(&mut self, message: &GatewayMessage) {
        let (Some(node), Some(action)) = (message.node.as_ref(), message.action.as_ref()) else {
            tracing::warn!(?message, "Node update without node or action, dropping");
            return;
        };

        match action.value.as_str() {
            control::NODE_REMOVED => {
                self.evict(node).await;
            }
            control::NODE_ADDED => self.refresh_profiles().await,
            control::NODE_ENABLED => {
                match message.event_info.as_deref().map(enabled_flag) {
                    None => {
                        tracing::warn!(%node, "Enable notice without event info");
                    }
                    Some(Some(false)) => {
                        self.evict(node).await;
                    }
                    Some(_) => self.refresh_profiles().await,
                }
            }
            other => tracing::debug!(%node, change = other, "Ignoring node update"),
        }
    }

    async fn refresh_profiles(&mut self) {
        if let Err(e) = self.update_profiles().await {
            tracing::error!(error = %e, "Failed to update profiles");
        }
    }

    async fn on_ven_message(&mut self, code: &str, action: &Action) {
        match code {
            control::GRID_STATUS => match action.value.parse::<GridState>() {
                Ok(grid_state) => self.optimize(grid_state).await,
                Err(e) => tracing::warn!(error = %e, "Unreadable grid status"),
            },
            control::STATUS | control::GREENHOUSE_GAS => match action.numeric() {
                Ok(value) => {
                    self.settings.set(code, value);
                }
                Err(e) => tracing::warn!(code, error = %e, "Unreadable VEN telemetry"),
            },
            _ => match action.numeric() {
                Ok(value) => self.update_ven_setting(code, value),
                Err(e) => tracing::warn!(code, error = %e, "Unreadable VEN setting"),
            },
        }
    }

    /// Persists a changed VEN setting and recalibrates every optimizer.
    fn update_ven_setting(&mut self, key: &str, value: f64) {
        let value = Value::from(value);
        if !self.settings.is_changed(key, &value) {
            tracing::trace!(key, "VEN setting unchanged");
            return;
        }
        self.settings.set(key, value);
        tracing::info!(key, "VEN setting changed, recalibrating");
        for optimizer in self.optimizers.values_mut() {
            optimizer.update_settings();
        }
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Consumes the gateway event stream, resubscribing with backoff.
    ///
    /// Only returns once the policy gives up on consecutive failures.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResubscribeExhausted`] when retries run out.
    pub async fn run(&mut self) -> Result<()> {
        let mut failures: u32 = 0;

        loop {
            match self.gateway.subscribe().await {
                Ok(stream) => {
                    if self.consume(stream).await {
                        failures = 0;
                    } else {
                        failures += 1;
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(error = %e, failures, "Event subscription failed");
                }
            }

            if !self.resubscribe.should_retry(failures) {
                tracing::error!(failures, "Giving up on event subscription");
                return Err(Error::ResubscribeExhausted { attempts: failures });
            }

            let delay = self
                .resubscribe
                .delay_for_attempt(failures.saturating_sub(1));
            tracing::debug!(?delay, failures, "Resubscribing");
            tokio::time::sleep(delay).await;
        }
    }

    /// Dispatches one stream until it ends. Returns `true` if it connected.
    async fn consume(&mut self, mut stream: mpsc::Receiver<StreamEvent>) -> bool {
        let mut connected = false;

        while let Some(event) = stream.recv().await {
            match event {
                StreamEvent::Connected => {
                    connected = true;
                    self.set_subscribed(true);
                }
                StreamEvent::Disconnected => break,
                StreamEvent::Message(message) => self.on_message(message).await,
            }
        }

        self.set_subscribed(false);
        connected
    }

    fn set_subscribed(&mut self, subscribed: bool) {
        if self.subscribed == subscribed {
            return;
        }
        self.subscribed = subscribed;
        tracing::info!(subscribed, "Event stream state changed");
        self.events
            .publish(OptimizerEvent::SubscriptionChanged { connected: subscribed });
    }
}
