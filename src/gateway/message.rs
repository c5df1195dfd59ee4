// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Messages received on the gateway event stream.

use serde::{Deserialize, Serialize};

use crate::error::ValueError;
use crate::types::DeviceAddress;

/// A reported value with its unit and decimal precision.
///
/// The raw value is an integer scaled by `10^prec`.
///
/// # Examples
///
/// ```
/// use demand_optimizer::gateway::Action;
///
/// let action = Action::new("725").with_uom("17").with_prec(1);
/// assert_eq!(action.numeric().unwrap(), 72.5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Action {
    /// Raw value text.
    pub value: String,
    /// Unit of measure identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uom: Option<String>,
    /// Number of implied decimal places.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prec: Option<u8>,
}

impl Action {
    /// Creates an action with no unit or precision.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            uom: None,
            prec: None,
        }
    }

    /// Sets the unit of measure.
    #[must_use]
    pub fn with_uom(mut self, uom: impl Into<String>) -> Self {
        self.uom = Some(uom.into());
        self
    }

    /// Sets the precision.
    #[must_use]
    pub fn with_prec(mut self, prec: u8) -> Self {
        self.prec = Some(prec);
        self
    }

    /// Decodes the value, applying the precision.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidNumber`] if the text is not numeric.
    pub fn numeric(&self) -> Result<f64, ValueError> {
        let raw: f64 = self
            .value
            .trim()
            .parse()
            .map_err(|_| ValueError::InvalidNumber(self.value.clone()))?;
        if !raw.is_finite() {
            return Err(ValueError::InvalidNumber(self.value.clone()));
        }
        Ok(match self.prec {
            Some(prec) if prec > 0 => raw / 10f64.powi(i32::from(prec)),
            _ => raw,
        })
    }
}

/// One message from the gateway event stream.
///
/// Fields are optional because the stream carries heartbeats and system
/// notifications alongside device telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Originating node address.
    #[serde(default)]
    pub node: Option<DeviceAddress>,
    /// Control code.
    #[serde(default)]
    pub control: Option<String>,
    /// Reported value.
    #[serde(default)]
    pub action: Option<Action>,
    /// Free-form detail, XML for node updates.
    #[serde(default, rename = "eventInfo")]
    pub event_info: Option<String>,
}

impl GatewayMessage {
    /// Creates a telemetry message.
    #[must_use]
    pub fn telemetry(node: impl Into<DeviceAddress>, control: &str, action: Action) -> Self {
        Self {
            node: Some(node.into()),
            control: Some(control.to_string()),
            action: Some(action),
            event_info: None,
        }
    }

    /// Creates a node-updated system message.
    #[must_use]
    pub fn node_update(node: impl Into<DeviceAddress>, change: &str, event_info: Option<&str>) -> Self {
        Self {
            node: Some(node.into()),
            control: Some(super::control::NODE_UPDATED.to_string()),
            action: Some(Action::new(change)),
            event_info: event_info.map(str::to_string),
        }
    }
}

/// Item delivered by [`Gateway::subscribe`](super::Gateway::subscribe).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The stream is live.
    Connected,
    /// The connection dropped; the stream ends after this.
    Disconnected,
    /// A message.
    Message(GatewayMessage),
}

/// Extracts the `<enabled>` flag from a node-updated event info payload.
///
/// Returns `None` when the tag is absent or holds something other than
/// `true`/`false`.
#[must_use]
pub fn enabled_flag(event_info: &str) -> Option<bool> {
    let start = event_info.find("<enabled>")? + "<enabled>".len();
    let end = start + event_info[start..].find("</enabled>")?;
    match event_info[start..end].trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
