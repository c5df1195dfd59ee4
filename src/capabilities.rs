// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device capabilities as reported by the gateway topology.
//!
//! A device advertises two sets of control codes: the properties it reports
//! (telemetry such as `ST` or `CLISPC`) and the commands it accepts (such as
//! `DON`). The device manager classifies devices by looking at these sets.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Control codes a device reports and accepts.
///
/// # Examples
///
/// ```
/// use demand_optimizer::Capabilities;
///
/// let dimmer = Capabilities::builder()
///     .property("ST")
///     .property("OL")
///     .accepts("DON")
///     .accepts("DOF")
///     .build();
///
/// assert!(dimmer.has_property("OL"));
/// assert!(dimmer.accepts("DON"));
/// assert!(!dimmer.accepts("CLISPC"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Property control codes the device reports.
    #[serde(default)]
    pub properties: BTreeSet<String>,

    /// Command identifiers the device accepts.
    #[serde(default)]
    pub accepts: BTreeSet<String>,
}

impl Capabilities {
    /// Creates an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a builder for custom capabilities.
    #[must_use]
    pub fn builder() -> CapabilitiesBuilder {
        CapabilitiesBuilder::new()
    }

    /// Capabilities of a typical thermostat.
    #[must_use]
    pub fn thermostat() -> Self {
        Self::builder()
            .property("ST")
            .property("CLISPC")
            .property("CLISPH")
            .property("CLIMD")
            .accepts("CLISPC")
            .accepts("CLISPH")
            .accepts("CLIMD")
            .build()
    }

    /// Capabilities of a typical dimmable light.
    #[must_use]
    pub fn dimmer() -> Self {
        Self::builder()
            .property("ST")
            .property("OL")
            .property("RR")
            .accepts("DON")
            .accepts("DOF")
            .accepts("DFON")
            .build()
    }

    /// Capabilities of a plain on/off load.
    #[must_use]
    pub fn on_off() -> Self {
        Self::builder()
            .property("ST")
            .accepts("DON")
            .accepts("DOF")
            .build()
    }

    /// Returns whether the device reports `control`.
    #[must_use]
    pub fn has_property(&self, control: &str) -> bool {
        self.properties.contains(control)
    }

    /// Returns whether the device accepts the `command` identifier.
    #[must_use]
    pub fn accepts(&self, command: &str) -> bool {
        self.accepts.contains(command)
    }

    /// Returns whether the device reports or accepts any of `codes`.
    #[must_use]
    pub fn mentions_any(&self, codes: &[&str]) -> bool {
        codes
            .iter()
            .any(|code| self.has_property(code) || self.accepts(code))
    }

    /// Returns `true` if the device neither reports nor accepts anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.accepts.is_empty()
    }
}

/// Builder for [`Capabilities`].
#[derive(Debug, Default)]
pub struct CapabilitiesBuilder {
    inner: Capabilities,
}

impl CapabilitiesBuilder {
    /// Creates a builder with no capabilities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reported property.
    #[must_use]
    pub fn property(mut self, control: impl Into<String>) -> Self {
        self.inner.properties.insert(control.into());
        self
    }

    /// Adds an accepted command.
    #[must_use]
    pub fn accepts(mut self, command: impl Into<String>) -> Self {
        self.inner.accepts.insert(command.into());
        self
    }

    /// Builds the capabilities.
    #[must_use]
    pub fn build(self) -> Capabilities {
        self.inner
    }
}
