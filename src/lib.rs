// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Demand-response optimization engine for automation gateways.
//!
//! The engine receives a grid state (normal, moderate, high, emergency)
//! and relaxes thermostat setpoints, dims lights and duty-cycles switched
//! loads accordingly, while backing off when a person overrides what
//! automation applied.
//!
//! # Overview
//!
//! - [`settings::SettingsStore`]: persisted comfort level, baselines and
//!   per-state offset tables
//! - [`optimizer::Optimizer`]: per-device state machine with calibration,
//!   opt-out timing and override detection, specialized by a
//!   [`optimizer::Strategy`]
//! - [`manager::DeviceManager`]: classifies devices, owns their optimizers
//!   and dispatches the gateway event stream
//! - [`gateway::Gateway`]: the narrow interface the host implements to
//!   discover devices, send commands and stream events
//!
//! Decisions are published as [`event::OptimizerEvent`] values on a
//! broadcast bus. Logging goes through `tracing`; no subscriber is
//! installed here.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use demand_optimizer::gateway::Gateway;
//! use demand_optimizer::manager::DeviceManager;
//! use demand_optimizer::settings::SettingsStore;
//!
//! async fn serve<G: Gateway>(gateway: G) -> demand_optimizer::Result<()> {
//!     let settings = Arc::new(SettingsStore::try_open("settings.json")?);
//!     let mut manager = DeviceManager::new(Arc::new(gateway), settings);
//!
//!     manager.update_profiles().await?;
//!     manager.run().await
//! }
//! ```
//!
//! ## Driving a Single Optimizer
//!
//! ```no_run
//! use std::sync::Arc;
//! use demand_optimizer::Capabilities;
//! use demand_optimizer::event::EventBus;
//! use demand_optimizer::gateway::{Device, Gateway};
//! use demand_optimizer::optimizer::{Dimmer, DimmerOptimizer, OptimizerConfig};
//! use demand_optimizer::settings::SettingsStore;
//! use demand_optimizer::types::GridState;
//!
//! async fn dim<G: Gateway>(gateway: Arc<G>) {
//!     let settings = Arc::new(SettingsStore::in_memory());
//!     let device = Device::new("ZW012_1", "Kitchen", Capabilities::dimmer());
//!     let strategy = Dimmer::new(gateway, device.address.clone(), &settings);
//!     let mut optimizer = DimmerOptimizer::new(
//!         device,
//!         settings,
//!         OptimizerConfig::default(),
//!         EventBus::new(),
//!         strategy,
//!     );
//!
//!     optimizer.optimize(GridState::High).await;
//! }
//! ```

mod capabilities;
pub mod clock;
pub mod error;
pub mod event;
pub mod gateway;
pub mod manager;
pub mod optimizer;
pub mod settings;
pub mod types;

#[cfg(test)]
mod test_support;

pub use capabilities::{Capabilities, CapabilitiesBuilder};
pub use error::{Error, GatewayError, Result, SettingsError, ValueError};
pub use event::{EventBus, OptimizerEvent};
pub use gateway::{Device, Gateway, GatewayMessage};
pub use manager::{DeviceKind, DeviceManager, ResubscribePolicy};
pub use optimizer::{Optimizer, OptimizerConfig, Strategy};
pub use settings::SettingsStore;
pub use types::{ComfortLevel, DeviceAddress, GridState, SwitchState};
