// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Optimization history and lifecycle events.
//!
//! The device manager owns one [`EventBus`] and hands clones to every
//! optimizer. Subscribers receive an [`OptimizerEvent`] for each decision an
//! optimizer takes, plus device registration and subscription changes.
//!
//! # Examples
//!
//! ```
//! use demand_optimizer::event::{EventBus, OptimizerEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(OptimizerEvent::SubscriptionChanged { connected: true });
//! assert!(matches!(
//!     rx.try_recv(),
//!     Ok(OptimizerEvent::SubscriptionChanged { connected: true })
//! ));
//! ```

mod event_bus;
mod optimizer_event;

pub use event_bus::EventBus;
pub use optimizer_event::{AppliedSetting, OptimizerEvent};
