// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Narrow interface to the automation gateway.
//!
//! The engine never talks to devices directly. It discovers devices, sends
//! batched commands and consumes the event stream through the [`Gateway`]
//! trait; transport and topology parsing live in the implementation.
//!
//! # Command results
//!
//! [`Gateway::send_commands`] answers with one [`CommandStatus`] per command,
//! in order. Optimizers treat a missing entry or a non-200 status as "not
//! applied" for that command only. See [`send_and_check`].

pub mod control;
mod message;

pub use message::{Action, GatewayMessage, StreamEvent, enabled_flag};

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::capabilities::Capabilities;
use crate::error::GatewayError;
use crate::types::DeviceAddress;

/// A device known to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable address.
    pub address: DeviceAddress,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Whether the device is enabled on the gateway.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Reported and accepted control codes.
    #[serde(default)]
    pub capabilities: Capabilities,
}

fn enabled_default() -> bool {
    true
}

impl Device {
    /// Creates an enabled device.
    #[must_use]
    pub fn new(address: impl Into<DeviceAddress>, name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            enabled: true,
            capabilities,
        }
    }

    /// Marks the device disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One parameter of a [`DeviceCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandParam {
    /// Parameter identifier, empty for the primary value.
    #[serde(default)]
    pub id: String,
    /// Decoded value. The gateway applies `prec` when encoding.
    pub value: f64,
    /// Unit of measure, echoed from telemetry when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uom: Option<String>,
    /// Precision, echoed from telemetry when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prec: Option<u8>,
}

impl CommandParam {
    /// Creates a primary-value parameter.
    #[must_use]
    pub fn value(value: f64, uom: Option<String>, prec: Option<u8>) -> Self {
        Self {
            id: String::new(),
            value,
            uom,
            prec,
        }
    }
}

/// A command addressed to one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    /// Target device.
    pub device_id: DeviceAddress,
    /// Command identifier, such as `DON` or `CLISPC`.
    pub command_id: String,
    /// Parameters, possibly empty.
    #[serde(default)]
    pub params: Vec<CommandParam>,
}

impl DeviceCommand {
    /// Creates a command without parameters.
    #[must_use]
    pub fn new(device_id: DeviceAddress, command_id: impl Into<String>) -> Self {
        Self {
            device_id,
            command_id: command_id.into(),
            params: Vec::new(),
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn with_param(mut self, param: CommandParam) -> Self {
        self.params.push(param);
        self
    }

    /// Returns the primary parameter value, if any.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.params.first().map(|p| p.value)
    }
}

/// Per-command result from the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    /// HTTP-style status code.
    pub status_code: u16,
}

impl CommandStatus {
    /// Successful status.
    pub const OK: Self = Self { status_code: 200 };

    /// Returns `true` for status 200.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.status_code == 200
    }
}

/// Device topology, command and event-stream access.
///
/// Implementations are shared behind an `Arc` by the device manager, every
/// optimizer and every duty-cycle worker, so methods take `&self` and
/// returned futures must be `Send`.
pub trait Gateway: Send + Sync + 'static {
    /// Lists every device the gateway knows about.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the topology cannot be fetched.
    fn discover_devices(&self) -> impl Future<Output = Result<Vec<Device>, GatewayError>> + Send;

    /// Sends a batch of commands.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the batch could not be delivered at all.
    fn send_commands(
        &self,
        commands: Vec<DeviceCommand>,
    ) -> impl Future<Output = Result<Vec<CommandStatus>, GatewayError>> + Send;

    /// Opens the event stream.
    ///
    /// The receiver yields [`StreamEvent::Connected`] once live and ends after
    /// [`StreamEvent::Disconnected`] or when the sender is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the stream cannot be opened.
    fn subscribe(&self) -> impl Future<Output = Result<mpsc::Receiver<StreamEvent>, GatewayError>> + Send;
}

/// Sends `commands` and reports success per command.
///
/// A transport error, an empty answer or a missing entry all count as
/// failure for the affected commands. Failures are logged, never returned.
pub async fn send_and_check<G: Gateway>(gateway: &G, commands: Vec<DeviceCommand>) -> Vec<bool> {
    let count = commands.len();
    if count == 0 {
        return Vec::new();
    }

    match gateway.send_commands(commands).await {
        Ok(statuses) => (0..count)
            .map(|i| statuses.get(i).is_some_and(|s| s.is_success()))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, count, "Failed to send device commands");
            vec![false; count]
        }
    }
}
