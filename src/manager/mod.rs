// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device classification and event dispatch.
//!
//! The [`DeviceManager`] is the single entry point between the gateway and
//! the optimizers:
//!
//! - **Classification**: every enabled device is mapped to a
//!   [`DeviceKind`] from its declared capabilities, and one
//!   [`DeviceOptimizer`] is created per address
//! - **Routing**: telemetry goes to the owning optimizer, grid status from
//!   the VEN fans out to all of them, and node updates add or evict
//!   optimizers
//! - **Resubscription**: [`DeviceManager::run`] keeps the event stream open
//!   according to a [`ResubscribePolicy`]
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::Ordering;
//! use demand_optimizer::gateway::Gateway;
//! use demand_optimizer::manager::{DeviceManager, ResubscribePolicy};
//! use demand_optimizer::optimizer::OptimizerConfig;
//! use demand_optimizer::settings::SettingsStore;
//!
//! async fn start<G: Gateway>(gateway: Arc<G>) -> demand_optimizer::Result<()> {
//!     let settings = Arc::new(SettingsStore::in_memory());
//!     let mut manager = DeviceManager::new(gateway, settings)
//!         .with_config(OptimizerConfig::testing())
//!         .with_resubscribe_policy(ResubscribePolicy::forever());
//!
//!     // Manual kill switch, usable while `run` holds the manager.
//!     let kill_switch = manager.disable_handle();
//!     kill_switch.store(false, Ordering::Relaxed);
//!
//!     manager.update_profiles().await?;
//!     manager.run().await
//! }
//! ```

mod device_manager;
mod kind;
mod reconnection;

pub use device_manager::DeviceManager;
pub use kind::{DeviceKind, DeviceOptimizer};
pub use reconnection::ResubscribePolicy;
