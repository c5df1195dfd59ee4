// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scriptable in-memory gateway shared by integration tests.

#![allow(dead_code)]

use std::time::Duration;

use demand_optimizer::gateway::{
    Action, CommandStatus, Device, DeviceCommand, Gateway, GatewayMessage, StreamEvent,
};
use demand_optimizer::{Capabilities, GatewayError, OptimizerEvent};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

pub const VEN: &str = "n001_oadr3ven";
pub const THERMOSTAT: &str = "ZY001_1";
pub const DIMMER: &str = "ZW002_1";
pub const SWITCH: &str = "ZW003_1";

/// Gateway with a fixed device list and one live event stream at a time.
#[derive(Debug, Default)]
pub struct FakeGateway {
    devices: Mutex<Vec<Device>>,
    sent: Mutex<Vec<DeviceCommand>>,
    stream: Mutex<Option<mpsc::Sender<StreamEvent>>>,
}

impl FakeGateway {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices: Mutex::new(devices),
            ..Self::default()
        }
    }

    /// A VEN plus one device of each optimizable kind.
    pub fn building() -> Self {
        Self::new(vec![
            Device::new(VEN, "OpenADR VEN", Capabilities::default()),
            Device::new(THERMOSTAT, "Hall", Capabilities::thermostat()),
            Device::new(DIMMER, "Kitchen", Capabilities::dimmer()),
            Device::new(SWITCH, "Water heater", Capabilities::on_off()),
        ])
    }

    pub fn sent(&self) -> Vec<DeviceCommand> {
        self.sent.lock().clone()
    }

    /// Commands sent to one device, as `(command_id, value)`.
    pub fn sent_to(&self, address: &str) -> Vec<(String, Option<f64>)> {
        self.sent
            .lock()
            .iter()
            .filter(|c| c.device_id.as_str() == address)
            .map(|c| (c.command_id.clone(), c.value()))
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }

    /// Pushes an event into the open stream.
    ///
    /// # Panics
    ///
    /// Panics if nobody subscribed yet.
    pub async fn emit(&self, event: StreamEvent) {
        let tx = self.stream.lock().clone().expect("no subscriber");
        tx.send(event).await.expect("stream closed");
    }

    pub async fn telemetry(&self, node: &str, control: &str, value: &str) {
        self.emit(StreamEvent::Message(GatewayMessage::telemetry(
            node,
            control,
            Action::new(value),
        )))
        .await;
    }

    pub async fn grid_status(&self, state: u8) {
        self.telemetry(VEN, "CGS", &state.to_string()).await;
    }

    /// Drops the live stream, as a network loss would.
    pub fn hang_up(&self) {
        self.stream.lock().take();
    }
}

impl Gateway for FakeGateway {
    async fn discover_devices(&self) -> Result<Vec<Device>, GatewayError> {
        Ok(self.devices.lock().clone())
    }

    async fn send_commands(
        &self,
        commands: Vec<DeviceCommand>,
    ) -> Result<Vec<CommandStatus>, GatewayError> {
        let statuses = vec![CommandStatus::OK; commands.len()];
        self.sent.lock().extend(commands);
        Ok(statuses)
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<StreamEvent>, GatewayError> {
        let (tx, rx) = mpsc::channel(64);
        *self.stream.lock() = Some(tx);
        Ok(rx)
    }
}

/// Lets spawned tasks drain their queues.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Collects every event currently buffered.
pub fn drain(rx: &mut broadcast::Receiver<OptimizerEvent>) -> Vec<OptimizerEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}
